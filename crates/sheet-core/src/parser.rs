//! CSV import/export of whole sheet tabs
//!
//! A tab exported as CSV keeps every row, including title and label rows
//! above the header, so the file is read without treating row 1 as a header.

use crate::error::{Error, Result};
use crate::region::MemoryGrid;
use crate::value::CellValue;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Parse a CSV file into a MemoryGrid
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<MemoryGrid> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    read_grid(BufReader::new(file), path.to_path_buf())
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<MemoryGrid> {
    read_grid(content.as_bytes(), PathBuf::from(source_name))
}

fn read_grid<R: Read>(reader: R, path: PathBuf) -> Result<MemoryGrid> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            path: path.clone(),
            source: e,
        })?;
        rows.push(record.iter().map(parse_cell).collect());
    }

    log::debug!("read {} rows from {}", rows.len(), path.display());
    Ok(MemoryGrid::from_rows(rows))
}

/// Type a CSV field, keeping the raw text when typing would change how the
/// field is written back (`007`, `1.50`, padded text)
fn parse_cell(raw: &str) -> CellValue {
    match CellValue::parse(raw) {
        value @ (CellValue::Integer(_) | CellValue::Float(_) | CellValue::String(_))
            if value.to_string_value() != raw =>
        {
            CellValue::String(raw.to_string())
        }
        value => value,
    }
}

/// Write a grid to a CSV file
pub fn write_csv<P: AsRef<Path>>(grid: &MemoryGrid, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_grid(grid, BufWriter::new(file), path.to_path_buf())
}

/// Render a grid as CSV text
pub fn write_csv_string(grid: &MemoryGrid) -> Result<String> {
    let mut buffer = Vec::new();
    write_grid(grid, &mut buffer, PathBuf::from("<memory>"))?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn write_grid<W: Write>(grid: &MemoryGrid, writer: W, path: PathBuf) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);

    for row in grid.rows() {
        // An empty record would be dropped entirely; keep blank rows as one empty field
        let fields: Vec<String> = if row.is_empty() {
            vec![String::new()]
        } else {
            row.iter().map(CellValue::to_string_value).collect()
        };
        csv_writer.write_record(&fields).map_err(|e| Error::Csv {
            path: path.clone(),
            source: e,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
