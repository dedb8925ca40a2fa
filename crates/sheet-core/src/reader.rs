//! Reading tab rows into records

use crate::config::TabConfig;
use crate::error::Result;
use crate::header::{parse_header_with_labels, HeaderBinding};
use crate::record::{unflatten, FlatRecord, Record};
use crate::region::TabularRegion;
use crate::value::CellValue;
use serde::{Deserialize, Serialize};

/// A record paired with the data row it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedRecord {
    /// The record contents
    pub record: Record,
    /// 0-based offset from the first data row; None for records not yet in the sheet
    pub origin: Option<usize>,
}

impl TaggedRecord {
    /// A record read from data row `origin`
    pub fn read(record: Record, origin: usize) -> Self {
        Self {
            record,
            origin: Some(origin),
        }
    }

    /// A record that should be appended
    pub fn new(record: Record) -> Self {
        Self {
            record,
            origin: None,
        }
    }
}

/// Records read from one tab, with what is needed to write them back
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// Bindings of the header at read time
    pub binding: HeaderBinding,
    /// Row holding the header (1-based)
    pub header_row: usize,
    /// Row the origin tags count from (1-based)
    pub data_start_row: usize,
    /// Records in row order; callers add, remove and edit these freely
    pub records: Vec<TaggedRecord>,
    baseline: Vec<TaggedRecord>,
}

impl RecordSet {
    pub(crate) fn new(
        binding: HeaderBinding,
        header_row: usize,
        data_start_row: usize,
        records: Vec<TaggedRecord>,
    ) -> Self {
        Self {
            binding,
            header_row,
            data_start_row,
            baseline: records.clone(),
            records,
        }
    }

    /// Records as they were when last read or written
    pub fn baseline(&self) -> &[TaggedRecord] {
        &self.baseline
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the set holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Absolute sheet row for an origin tag
    pub fn row_of(&self, origin: usize) -> usize {
        self.data_start_row + origin
    }

    /// Take the records, dropping the write-back context
    pub fn into_records(self) -> Vec<Record> {
        self.records.into_iter().map(|t| t.record).collect()
    }

    pub(crate) fn commit(&mut self, records: Vec<TaggedRecord>) {
        self.baseline = records.clone();
        self.records = records;
    }
}

/// Read the header binding of a tab
pub fn read_header<R: TabularRegion + ?Sized>(
    region: &R,
    tab: &TabConfig,
) -> Result<HeaderBinding> {
    let width = region.last_column();
    if width == 0 || region.max_rows() < tab.header_row {
        return Ok(HeaderBinding::default());
    }

    let header = region.get_row(tab.header_row)?;
    let labels = match tab.label_row {
        Some(row) => Some(region.get_row(row)?),
        None => None,
    };
    Ok(parse_header_with_labels(&header, labels.as_deref()))
}

/// Read the data rows of a tab as records.
///
/// With a `filter` path, rows whose value at that path is falsy (or missing)
/// are dropped. Origin tags always count every data row.
pub fn read_records<R: TabularRegion + ?Sized>(
    region: &R,
    tab: &TabConfig,
    filter: Option<&str>,
) -> Result<RecordSet> {
    tab.validate()?;
    let binding = read_header(region, tab)?;

    let last = region.last_data_row();
    let mut records = Vec::new();

    if !binding.is_empty() && last >= tab.data_start_row {
        let num_rows = last - tab.data_start_row + 1;
        let rows = region.get_values(tab.data_start_row, 1, num_rows, binding.width())?;

        for (origin, cells) in rows.iter().enumerate() {
            let flat = bind_row(&binding, cells);
            if flat.is_empty() {
                log::debug!("{}: data row {} is blank, skipping", tab.name, origin);
                continue;
            }
            if let Some(path) = filter {
                if !flat.get(path).is_some_and(|v| v.is_truthy()) {
                    continue;
                }
            }
            records.push(TaggedRecord::read(unflatten(&flat)?, origin));
        }
    }

    log::debug!("{}: read {} records", tab.name, records.len());
    Ok(RecordSet::new(
        binding,
        tab.header_row,
        tab.data_start_row,
        records,
    ))
}

/// Map the non-empty bound cells of a row to their paths
pub fn bind_row(binding: &HeaderBinding, cells: &[CellValue]) -> FlatRecord {
    let mut flat = FlatRecord::new();
    for b in binding {
        if let Some(cell) = cells.get(b.column).filter(|c| !c.is_empty()) {
            flat.insert(b.path.clone(), cell.clone());
        }
    }
    flat
}
