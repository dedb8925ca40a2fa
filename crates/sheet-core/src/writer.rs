//! Writing records back into a single row
//!
//! Only header-bound columns are ever touched. Two modes exist because callers
//! need both: [`merge_row`] leaves cells alone when the record lacks their
//! path, [`replace_row`] blanks them.

use crate::error::{Error, Result};
use crate::header::HeaderBinding;
use crate::record::{FlatRecord, Record};
use crate::region::TabularRegion;
use crate::value::CellValue;

/// How bound paths missing from the record are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Keep the current cell value
    Merge,
    /// Clear the cell
    Replace,
}

/// Write the record's bound paths into `row`, keeping cells for absent paths.
///
/// Returns the number of cells whose value changed.
pub fn merge_row<R: TabularRegion + ?Sized>(
    region: &mut R,
    binding: &HeaderBinding,
    row: usize,
    record: &Record,
) -> Result<usize> {
    write_flat(region, binding, row, &record.flatten(), WriteMode::Merge)
}

/// Write the record into `row`, clearing bound cells the record has no value for.
///
/// Returns the number of cells whose value changed.
pub fn replace_row<R: TabularRegion + ?Sized>(
    region: &mut R,
    binding: &HeaderBinding,
    row: usize,
    record: &Record,
) -> Result<usize> {
    write_flat(region, binding, row, &record.flatten(), WriteMode::Replace)
}

/// Write flat `path -> value` pairs into `row`.
///
/// Paths without a column are ignored. Columns without a binding and all other
/// rows are never modified, and cells right of the last changed one are not
/// rewritten, so short rows stay short.
pub fn write_flat<R: TabularRegion + ?Sized>(
    region: &mut R,
    binding: &HeaderBinding,
    row: usize,
    values: &FlatRecord,
    mode: WriteMode,
) -> Result<usize> {
    let mut cells = region
        .get_values(row, 1, 1, binding.width())?
        .pop()
        .unwrap_or_default();

    let mut changed = 0;
    let mut end = 0;
    for b in binding {
        let next = match (values.get(&b.path), mode) {
            (Some(value), _) => value.clone(),
            (None, WriteMode::Replace) => CellValue::Empty,
            (None, WriteMode::Merge) => continue,
        };
        let cell = &mut cells[b.column];
        if *cell != next && !(cell.is_empty() && next.is_empty()) {
            *cell = next;
            changed += 1;
            end = end.max(b.column + 1);
        }
    }

    if changed > 0 {
        region.set_row(row, &cells[..end])?;
        log::debug!("row {row}: {changed} cells written");
    }
    Ok(changed)
}

/// Write one path of a row, failing if no column is bound to it
pub fn write_field<R: TabularRegion + ?Sized>(
    region: &mut R,
    binding: &HeaderBinding,
    row: usize,
    path: &str,
    value: CellValue,
) -> Result<()> {
    let b = binding.find(path).ok_or_else(|| Error::HeaderMismatch {
        path: path.to_string(),
    })?;
    region.set_cell(row, b.column + 1, value)
}
