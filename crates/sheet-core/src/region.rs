//! Access to a rectangular block of cells
//!
//! [`TabularRegion`] is everything the mapping engine needs from a sheet
//! backend. All coordinates are 1-based, like spreadsheet rows and columns.

use crate::error::{Error, Result};
use crate::value::CellValue;
use serde::{Deserialize, Serialize};

/// A sheet tab the connector can read from and write to
pub trait TabularRegion {
    /// Read a `num_rows` x `num_cols` block; cells past the data read as Empty
    fn get_values(
        &self,
        top_row: usize,
        left_col: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<Vec<Vec<CellValue>>>;

    /// Write `values` into `row` starting at column 1; later cells are kept
    fn set_row(&mut self, row: usize, values: &[CellValue]) -> Result<()>;

    /// Write a single cell
    fn set_cell(&mut self, row: usize, col: usize, value: CellValue) -> Result<()>;

    /// Add `count` blank rows after the last row
    fn append_rows(&mut self, count: usize) -> Result<()>;

    /// Remove `count` rows starting at `start_row`; rows below move up
    fn delete_rows(&mut self, start_row: usize, count: usize) -> Result<()>;

    /// Last row holding any non-empty cell, 0 when the region is blank
    fn last_data_row(&self) -> usize;

    /// Number of rows physically present
    fn max_rows(&self) -> usize;

    /// Widest row, in columns
    fn last_column(&self) -> usize;

    /// Read one full row
    fn get_row(&self, row: usize) -> Result<Vec<CellValue>> {
        let width = self.last_column();
        let mut rows = self.get_values(row, 1, 1, width)?;
        Ok(rows.pop().unwrap_or_default())
    }
}

/// An in-memory grid of cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryGrid {
    rows: Vec<Vec<CellValue>>,
}

impl MemoryGrid {
    /// Create a new empty grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a grid from rows; rows may differ in length
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Borrow the raw rows
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Consume the grid, returning the raw rows
    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }

    /// Get a single cell (1-based); None if outside the stored data
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        if row == 0 || col == 0 {
            return None;
        }
        self.rows.get(row - 1).and_then(|r| r.get(col - 1))
    }

    fn ensure_rows(&mut self, row: usize) {
        if self.rows.len() < row {
            self.rows.resize_with(row, Vec::new);
        }
    }
}

fn check_origin(row: usize, col: usize) -> Result<()> {
    if row == 0 || col == 0 {
        return Err(Error::OutOfBounds { row, column: col });
    }
    Ok(())
}

impl TabularRegion for MemoryGrid {
    fn get_values(
        &self,
        top_row: usize,
        left_col: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<Vec<Vec<CellValue>>> {
        check_origin(top_row, left_col)?;

        let block = (top_row..top_row + num_rows)
            .map(|row| {
                (left_col..left_col + num_cols)
                    .map(|col| self.cell(row, col).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Ok(block)
    }

    fn set_row(&mut self, row: usize, values: &[CellValue]) -> Result<()> {
        check_origin(row, 1)?;
        self.ensure_rows(row);

        let cells = &mut self.rows[row - 1];
        if cells.len() < values.len() {
            cells.resize(values.len(), CellValue::Empty);
        }
        cells[..values.len()].clone_from_slice(values);
        Ok(())
    }

    fn set_cell(&mut self, row: usize, col: usize, value: CellValue) -> Result<()> {
        check_origin(row, col)?;
        self.ensure_rows(row);

        let cells = &mut self.rows[row - 1];
        if cells.len() < col {
            cells.resize(col, CellValue::Empty);
        }
        cells[col - 1] = value;
        Ok(())
    }

    fn append_rows(&mut self, count: usize) -> Result<()> {
        let target = self.rows.len() + count;
        self.rows.resize_with(target, Vec::new);
        Ok(())
    }

    fn delete_rows(&mut self, start_row: usize, count: usize) -> Result<()> {
        check_origin(start_row, 1)?;
        let end = start_row - 1 + count;
        if end > self.rows.len() {
            return Err(Error::OutOfBounds {
                row: end,
                column: 1,
            });
        }
        self.rows.drain(start_row - 1..end);
        Ok(())
    }

    fn last_data_row(&self) -> usize {
        self.rows
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_empty()))
            .map_or(0, |i| i + 1)
    }

    fn max_rows(&self) -> usize {
        self.rows.len()
    }

    fn last_column(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}
