//! Header row parsing
//!
//! The header row of a tab names a dot-path per column. Blank header cells
//! produce no binding, and column indices stay absolute.

use crate::value::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single column bound to a dot-path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Column index (0-based, absolute within the row)
    pub column: usize,
    /// Dot-path the column maps to
    pub path: String,
    /// Human-readable title, if the tab has a label row
    pub label: Option<String>,
}

/// Ordered column bindings derived from a header row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderBinding {
    bindings: Vec<Binding>,
}

impl HeaderBinding {
    /// Get the number of bound columns
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no column is bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate over bindings in column order
    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.bindings.iter()
    }

    /// Find the last column bound to a path
    pub fn find(&self, path: &str) -> Option<&Binding> {
        self.bindings.iter().rev().find(|b| b.path == path)
    }

    /// Check whether a path has a column
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Compare column/path pairs, ignoring labels
    pub fn same_columns(&self, other: &HeaderBinding) -> bool {
        self.bindings.len() == other.bindings.len()
            && self
                .bindings
                .iter()
                .zip(&other.bindings)
                .all(|(a, b)| a.column == b.column && a.path == b.path)
    }

    /// Distinct bound paths, in column order
    pub fn paths(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.bindings
            .iter()
            .map(|b| b.path.as_str())
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Number of cells a row must span to cover every bound column
    pub fn width(&self) -> usize {
        self.bindings.last().map_or(0, |b| b.column + 1)
    }
}

impl<'a> IntoIterator for &'a HeaderBinding {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

/// Parse a header row into column bindings
pub fn parse_header(header_row: &[CellValue]) -> HeaderBinding {
    parse_header_with_labels(header_row, None)
}

/// Parse a header row, taking display labels from a second row
pub fn parse_header_with_labels(
    header_row: &[CellValue],
    label_row: Option<&[CellValue]>,
) -> HeaderBinding {
    let mut bindings = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for (column, cell) in header_row.iter().enumerate() {
        let path = match cell {
            CellValue::String(s) if !s.trim().is_empty() => s.trim(),
            CellValue::Empty | CellValue::String(_) => continue,
            other => {
                log::debug!("skipping non-text header cell {other:?} in column {column}");
                continue;
            }
        };

        if !seen.insert(path) {
            log::warn!("header path '{path}' is bound more than once; column {column} wins on read");
        }

        let label = label_row
            .and_then(|row| row.get(column))
            .filter(|cell| !cell.is_empty())
            .map(CellValue::to_string_value);

        bindings.push(Binding {
            column,
            path: path.to_string(),
            label,
        });
    }

    HeaderBinding { bindings }
}
