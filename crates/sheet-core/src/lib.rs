//! sheet-core: Core library for mapping spreadsheet tabs to structured records
//!
//! This library provides functionality to:
//! - Flatten nested records into dot-path keyed values and back
//! - Bind header rows to dot-paths and read data rows as records
//! - Write records back into their rows without touching other cells
//! - Reconcile an edited record list with its tab (deletes, updates, appends)
//! - Load and save whole tabs as CSV

pub mod config;
pub mod connector;
pub mod error;
pub mod header;
pub mod parser;
pub mod reader;
pub mod reconcile;
pub mod record;
pub mod region;
pub mod value;
pub mod writer;

pub use config::{ConnectorConfig, TabConfig};
pub use connector::{read_config, Connector, Tab};
pub use error::{Error, Result};
pub use header::{parse_header, parse_header_with_labels, Binding, HeaderBinding};
pub use parser::{parse_csv, parse_csv_str, write_csv, write_csv_string};
pub use reader::{read_records, RecordSet, TaggedRecord};
pub use reconcile::{reconcile, write_records, WritePlan, WriteSummary};
pub use record::{flatten, unflatten, FlatRecord, Node, Record};
pub use region::{MemoryGrid, TabularRegion};
pub use value::CellValue;
pub use writer::{merge_row, replace_row, write_field, WriteMode};
