//! Sheet connector CLI
//!
//! Command-line tool for reading and editing sheet tabs exported as CSV.

use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, Log, Metadata, Record as LogRecord};
use sheet_core::{
    parse_csv, read_config, read_records, unflatten, write_csv, write_field, write_records,
    CellValue, ConnectorConfig, TabConfig, TaggedRecord,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheet-cli")]
#[command(about = "Spreadsheet tab to record mapper", long_about = None)]
#[command(version)]
struct Cli {
    /// Log what the connector does to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Row layout of a list tab
#[derive(Args)]
struct Layout {
    /// Row holding the dot-path header (1-based)
    #[arg(long, default_value_t = 2)]
    header_row: usize,

    /// Row holding display labels [default: the row after the header, when
    /// it comes before the first data row]
    #[arg(long)]
    label_row: Option<usize>,

    /// The tab has no label row
    #[arg(long, conflicts_with = "label_row")]
    no_label_row: bool,

    /// First data row (1-based)
    #[arg(long, default_value_t = 4)]
    data_start_row: usize,

    /// Column path used by --selected
    #[arg(long, default_value = "selected")]
    selected_column: String,
}

impl Layout {
    fn tab(&self, file: &PathBuf) -> TabConfig {
        TabConfig {
            name: file.display().to_string(),
            header_row: self.header_row,
            label_row: self.effective_label_row(),
            data_start_row: self.data_start_row,
            selected_column: Some(self.selected_column.clone()),
        }
    }

    fn effective_label_row(&self) -> Option<usize> {
        if self.no_label_row {
            return None;
        }
        let below_header = self.header_row + 1;
        self.label_row
            .or((below_header < self.data_start_row).then_some(below_header))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the records of a list tab as JSON
    Show {
        /// Path to the CSV export of the tab
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        layout: Layout,

        /// Only rows whose selected column is truthy
        #[arg(short, long)]
        selected: bool,
    },

    /// Print a key/value tab as nested JSON
    Config {
        /// Path to the CSV export of the tab
        #[arg(short, long)]
        file: PathBuf,

        /// Print flat dot-path keys instead of nesting them
        #[arg(long)]
        flat: bool,
    },

    /// Sync a JSON list of tagged records into a tab
    Apply {
        /// Path to the CSV export of the tab
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        layout: Layout,

        /// JSON array of {"record": {...}, "origin": n | null}
        #[arg(short, long)]
        records: PathBuf,

        /// The records were taken from a --selected read
        #[arg(short, long)]
        selected: bool,

        /// Output CSV path (defaults to overwriting --file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a single field of one data row
    Set {
        /// Path to the CSV export of the tab
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        layout: Layout,

        /// Origin tag of the row (0-based from the first data row)
        #[arg(long)]
        row: usize,

        /// Dot-path of the column
        #[arg(long)]
        path: String,

        /// New value; typed like a CSV cell
        #[arg(long)]
        value: String,
    },

    /// Create a connector config with the default tab layouts
    InitConfig {
        /// Output path for the config file
        #[arg(short, long)]
        output: PathBuf,
    },
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &LogRecord) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    let cli = Cli::parse();

    if cli.verbose && log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> sheet_core::Result<()> {
    match command {
        Commands::Show {
            file,
            layout,
            selected,
        } => cmd_show(&file, &layout, selected),
        Commands::Config { file, flat } => cmd_config(&file, flat),
        Commands::Apply {
            file,
            layout,
            records,
            selected,
            output,
        } => cmd_apply(&file, &layout, &records, selected, output.as_ref()),
        Commands::Set {
            file,
            layout,
            row,
            path,
            value,
        } => cmd_set(&file, &layout, row, &path, &value),
        Commands::InitConfig { output } => cmd_init_config(&output),
    }
}

fn cmd_show(file: &PathBuf, layout: &Layout, selected: bool) -> sheet_core::Result<()> {
    let grid = parse_csv(file)?;
    let tab = layout.tab(file);
    let filter = selected.then_some(layout.selected_column.as_str());
    let set = read_records(&grid, &tab, filter)?;

    eprintln!("File: {}", file.display());
    eprintln!("Columns: {}", set.binding.len());
    eprintln!("Records: {}", set.len());

    println!("{}", serde_json::to_string_pretty(&set.records)?);
    Ok(())
}

fn cmd_config(file: &PathBuf, flat: bool) -> sheet_core::Result<()> {
    let grid = parse_csv(file)?;
    let settings = read_config(&grid, &TabConfig::key_value(file.display().to_string()))?;

    let json = if flat {
        serde_json::to_string_pretty(&settings)?
    } else {
        serde_json::to_string_pretty(&unflatten(&settings)?)?
    };
    println!("{}", json);
    Ok(())
}

fn cmd_apply(
    file: &PathBuf,
    layout: &Layout,
    records_path: &PathBuf,
    selected: bool,
    output: Option<&PathBuf>,
) -> sheet_core::Result<()> {
    let mut grid = parse_csv(file)?;
    let tab = layout.tab(file);
    let filter = selected.then_some(layout.selected_column.as_str());
    let mut set = read_records(&grid, &tab, filter)?;

    let content = fs::read_to_string(records_path).map_err(|e| sheet_core::Error::FileRead {
        path: records_path.clone(),
        source: e,
    })?;
    set.records = serde_json::from_str::<Vec<TaggedRecord>>(&content)?;

    let summary = write_records(&mut grid, &mut set)?;
    let output = output.unwrap_or(file);
    write_csv(&grid, output)?;

    println!("Wrote {}", output.display());
    println!("  {} rows deleted", summary.deleted);
    println!("  {} rows updated", summary.updated);
    println!("  {} rows appended", summary.appended);
    println!("  {} cells written", summary.cells_written);
    Ok(())
}

fn cmd_set(
    file: &PathBuf,
    layout: &Layout,
    row: usize,
    path: &str,
    value: &str,
) -> sheet_core::Result<()> {
    let mut grid = parse_csv(file)?;
    let tab = layout.tab(file);
    let set = read_records(&grid, &tab, None)?;

    let value = CellValue::parse(value);
    write_field(&mut grid, &set.binding, set.row_of(row), path, value.clone())?;
    write_csv(&grid, file)?;

    println!("Set {} = {} in data row {}", path, value, row);
    Ok(())
}

fn cmd_init_config(output: &PathBuf) -> sheet_core::Result<()> {
    let config = ConnectorConfig::default();
    config.save(output)?;

    println!("Created connector config: {}", output.display());
    println!("Tabs: {}, {}, {}", config.config_tab.name, config.tests_tab.name, config.results_tab.name);
    Ok(())
}
