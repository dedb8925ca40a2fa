//! Syncing an edited record list back into its tab
//!
//! The reconciler compares the records a caller holds against what was read
//! and turns the difference into row deletes, cell updates and appends.
//! Deletes run first, bottom-up, so the rows still to be deleted keep their
//! position; updates then land on the shifted rows; appends go last.

use crate::error::{Error, Result};
use crate::header::{parse_header, HeaderBinding};
use crate::reader::{RecordSet, TaggedRecord};
use crate::record::{FlatRecord, Record};
use crate::region::TabularRegion;
use crate::value::CellValue;
use crate::writer::{write_flat, WriteMode};
use std::collections::{BTreeMap, BTreeSet};

/// What happens to one record of the current list
#[derive(Debug, Clone, PartialEq)]
pub enum RowAction {
    /// No bound cell differs from the sheet
    Keep,
    /// Write these bound cells; removed paths carry `Empty`
    Update(FlatRecord),
    /// Write the record below the last data row
    Append,
}

/// A record of the current list with its scheduled action
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRecord {
    pub record: Record,
    /// Origin tag after the deletes of this plan have shifted rows up
    pub origin: Option<usize>,
    pub action: RowAction,
}

/// Row operations that bring a tab in line with a record list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WritePlan {
    /// Origin tags to delete, highest first
    pub deletes: Vec<usize>,
    /// Current records, in caller order
    pub records: Vec<PlannedRecord>,
}

/// Counts of what a plan did to the sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub deleted: usize,
    pub updated: usize,
    pub appended: usize,
    pub cells_written: usize,
}

impl WritePlan {
    /// Number of rows that will be updated
    pub fn update_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.action, RowAction::Update(_)))
            .count()
    }

    /// Number of rows that will be appended
    pub fn append_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.action == RowAction::Append)
            .count()
    }

    /// Check if the plan changes nothing
    pub fn is_noop(&self) -> bool {
        self.deletes.is_empty() && self.records.iter().all(|r| r.action == RowAction::Keep)
    }

    /// Execute the plan: deletes, then updates, then appends.
    ///
    /// Returns the current records re-tagged with their new rows.
    pub fn apply<R: TabularRegion + ?Sized>(
        self,
        region: &mut R,
        binding: &HeaderBinding,
        data_start_row: usize,
    ) -> Result<(Vec<TaggedRecord>, WriteSummary)> {
        let mut summary = WriteSummary::default();

        for (start, count) in delete_runs(&self.deletes) {
            region.delete_rows(data_start_row + start, count)?;
            summary.deleted += count;
        }

        // Fixed before updates run: an update may blank the last data row,
        // which still belongs to its record
        let retained_end = self
            .records
            .iter()
            .filter_map(|r| r.origin)
            .max()
            .map_or(data_start_row, |origin| data_start_row + origin + 1);
        let mut next_row = (region.last_data_row() + 1).max(retained_end);

        for planned in &self.records {
            if let (RowAction::Update(changes), Some(origin)) = (&planned.action, planned.origin) {
                summary.cells_written +=
                    write_flat(region, binding, data_start_row + origin, changes, WriteMode::Merge)?;
                summary.updated += 1;
            }
        }

        let mut records = Vec::with_capacity(self.records.len());

        for planned in self.records {
            let origin = match planned.action {
                RowAction::Append => {
                    let max_rows = region.max_rows();
                    if next_row > max_rows {
                        region.append_rows(next_row - max_rows)?;
                    }
                    let written = write_flat(
                        region,
                        binding,
                        next_row,
                        &planned.record.flatten(),
                        WriteMode::Replace,
                    )?;
                    if written == 0 {
                        log::warn!("appended record has no header-bound values; row {next_row} stays blank");
                    }
                    summary.cells_written += written;
                    summary.appended += 1;

                    let origin = next_row - data_start_row;
                    next_row += 1;
                    Some(origin)
                }
                RowAction::Keep | RowAction::Update(_) => planned.origin,
            };
            records.push(TaggedRecord {
                record: planned.record,
                origin,
            });
        }

        log::debug!(
            "applied plan: {} deleted, {} updated, {} appended",
            summary.deleted,
            summary.updated,
            summary.appended
        );
        Ok((records, summary))
    }
}

/// Split descending tags into `(lowest tag, length)` runs of adjacent rows
fn delete_runs(descending: &[usize]) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &tag in descending {
        match runs.last_mut() {
            Some((start, count)) if *start == tag + 1 => {
                *start = tag;
                *count += 1;
            }
            _ => runs.push((tag, 1)),
        }
    }
    runs
}

/// Plan the row operations that turn `baseline` into `current`.
///
/// Records are matched by origin tag. Untagged records are appended, baseline
/// tags missing from `current` are deleted, and matched records whose bound
/// cells differ are updated.
pub fn reconcile(
    binding: &HeaderBinding,
    baseline: &[TaggedRecord],
    current: &[TaggedRecord],
) -> Result<WritePlan> {
    let mut previous: BTreeMap<usize, FlatRecord> = BTreeMap::new();
    for tagged in baseline {
        let origin = tagged
            .origin
            .ok_or(Error::UnboundOriginTag { origin: None })?;
        previous.insert(origin, tagged.record.flatten());
    }

    let mut kept = BTreeSet::new();
    for tagged in current {
        if let Some(origin) = tagged.origin {
            if !previous.contains_key(&origin) {
                return Err(Error::UnboundOriginTag {
                    origin: Some(origin),
                });
            }
            if !kept.insert(origin) {
                return Err(Error::DuplicateOriginTag(origin));
            }
        }
    }

    let mut deletes: Vec<usize> = previous
        .keys()
        .copied()
        .filter(|origin| !kept.contains(origin))
        .collect();
    let ascending = deletes.clone();
    deletes.reverse();

    let paths = binding.paths();
    let mut records = Vec::with_capacity(current.len());
    for tagged in current {
        let planned = match tagged.origin {
            Some(origin) => {
                let shifted = origin - ascending.partition_point(|&d| d < origin);
                let changes = diff_bound(&paths, &previous[&origin], &tagged.record.flatten());
                PlannedRecord {
                    record: tagged.record.clone(),
                    origin: Some(shifted),
                    action: if changes.is_empty() {
                        RowAction::Keep
                    } else {
                        RowAction::Update(changes)
                    },
                }
            }
            None => PlannedRecord {
                record: tagged.record.clone(),
                origin: None,
                action: RowAction::Append,
            },
        };
        records.push(planned);
    }

    let plan = WritePlan { deletes, records };
    log::debug!(
        "planned {} deletes, {} updates, {} appends",
        plan.deletes.len(),
        plan.update_count(),
        plan.append_count()
    );
    Ok(plan)
}

/// Bound paths whose value differs; paths dropped from `after` map to Empty
fn diff_bound(paths: &[&str], before: &FlatRecord, after: &FlatRecord) -> FlatRecord {
    let mut changes = FlatRecord::new();
    for &path in paths {
        let old = before.get(path).filter(|v| !v.is_empty());
        let new = after.get(path).filter(|v| !v.is_empty());
        if old != new {
            changes.insert(path.to_string(), new.cloned().unwrap_or(CellValue::Empty));
        }
    }
    changes
}

/// Reconcile a record set with its tab and apply the result.
///
/// Fails with `HeaderChanged` if the header row no longer matches the binding
/// the records were read with. On success the set's records carry their new
/// origin tags and become the baseline for the next write.
pub fn write_records<R: TabularRegion + ?Sized>(
    region: &mut R,
    set: &mut RecordSet,
) -> Result<WriteSummary> {
    let header = region.get_row(set.header_row)?;
    if !parse_header(&header).same_columns(&set.binding) {
        return Err(Error::HeaderChanged {
            row: set.header_row,
        });
    }

    let plan = reconcile(&set.binding, set.baseline(), &set.records)?;
    if plan.is_noop() {
        return Ok(WriteSummary::default());
    }

    let (records, summary) = plan.apply(region, &set.binding, set.data_start_row)?;
    set.commit(records);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells;
    use crate::config::TabConfig;
    use crate::reader::read_records;
    use crate::region::MemoryGrid;
    use pretty_assertions::assert_eq;

    fn results_tab() -> TabConfig {
        TabConfig {
            name: "Results".to_string(),
            header_row: 1,
            label_row: None,
            data_start_row: 2,
            selected_column: Some("selected".to_string()),
        }
    }

    fn results_grid() -> MemoryGrid {
        MemoryGrid::from_rows(vec![
            cells!["selected", "id", "status", "", "webpagetest.metrics.SpeedIndex"],
            cells![true, "id-1", "Retrieved", "note a", 500],
            cells![true, "id-2", "Submitted", "note b", CellValue::Empty],
            cells![false, "id-3", "Retrieved", "note c", 800],
        ])
    }

    fn record(id: &str, status: &str) -> Record {
        let mut record = Record::new();
        record.set_path("selected", true).unwrap();
        record.set_path("id", id).unwrap();
        record.set_path("status", status).unwrap();
        record
    }

    #[test]
    fn test_delete_runs() {
        assert_eq!(delete_runs(&[7, 5, 4, 3, 0]), vec![(7, 1), (3, 3), (0, 1)]);
        assert!(delete_runs(&[]).is_empty());
    }

    #[test]
    fn test_unchanged_set_is_noop() {
        let mut grid = results_grid();
        let before = grid.clone();
        let mut set = read_records(&grid, &results_tab(), None).unwrap();

        let plan = reconcile(&set.binding, set.baseline(), &set.records).unwrap();
        assert!(plan.is_noop());

        let summary = write_records(&mut grid, &mut set).unwrap();
        assert_eq!(summary, WriteSummary::default());
        assert_eq!(grid, before);
    }

    #[test]
    fn test_delete_shifts_later_rows() {
        let mut grid = results_grid();
        let mut set = read_records(&grid, &results_tab(), None).unwrap();
        let third = set.records[2].clone();

        set.records.remove(1);
        let summary = write_records(&mut grid, &mut set).unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.updated, 0);
        assert_eq!(grid.max_rows(), 3);
        assert_eq!(grid.rows()[2], cells![false, "id-3", "Retrieved", "note c", 800]);
        assert_eq!(set.records[1].origin, Some(1));
        assert_eq!(set.records[1].record, third.record);
    }

    #[test]
    fn test_update_touches_only_changed_cells() {
        let mut grid = results_grid();
        let mut set = read_records(&grid, &results_tab(), None).unwrap();

        set.records[1]
            .record
            .set_path("webpagetest.metrics.SpeedIndex", 640)
            .unwrap();
        set.records[1].record.set_path("status", "Retrieved").unwrap();
        let summary = write_records(&mut grid, &mut set).unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.cells_written, 2);
        assert_eq!(grid.rows()[2], cells![true, "id-2", "Retrieved", "note b", 640]);
    }

    #[test]
    fn test_removed_path_blanks_cell() {
        let mut grid = results_grid();
        let mut set = read_records(&grid, &results_tab(), None).unwrap();

        set.records[0].record.remove("webpagetest");
        write_records(&mut grid, &mut set).unwrap();

        assert_eq!(grid.cell(2, 5), Some(&CellValue::Empty));
        assert_eq!(grid.cell(2, 4), Some(&CellValue::from("note a")));
    }

    #[test]
    fn test_append_after_last_data_row() {
        let mut grid = results_grid();
        grid.append_rows(2).unwrap();
        let mut set = read_records(&grid, &results_tab(), None).unwrap();

        set.records.push(TaggedRecord::new(record("id-4", "Submitted")));
        let summary = write_records(&mut grid, &mut set).unwrap();

        assert_eq!(summary.appended, 1);
        assert_eq!(set.records[3].origin, Some(3));
        assert_eq!(grid.max_rows(), 6);
        assert_eq!(grid.rows()[4], cells![true, "id-4", "Submitted"]);
    }

    #[test]
    fn test_append_grows_region() {
        let mut grid = MemoryGrid::from_rows(vec![cells!["selected", "id", "status"]]);
        let mut set = read_records(&grid, &results_tab(), None).unwrap();
        assert!(set.is_empty());

        set.records.push(TaggedRecord::new(record("id-1", "Submitted")));
        set.records.push(TaggedRecord::new(record("id-2", "Submitted")));
        write_records(&mut grid, &mut set).unwrap();

        assert_eq!(grid.max_rows(), 3);
        let origins: Vec<Option<usize>> = set.records.iter().map(|t| t.origin).collect();
        assert_eq!(origins, vec![Some(0), Some(1)]);

        // A second write from the refreshed baseline changes nothing
        let plan = reconcile(&set.binding, set.baseline(), &set.records).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_append_below_blanked_last_row() {
        let mut grid = MemoryGrid::from_rows(vec![cells!["id"], cells!["a"], cells!["b"]]);
        let mut set = read_records(&grid, &TabConfig::key_value("Ids"), None).unwrap();

        set.records[1].record.remove("id");
        let mut fresh = Record::new();
        fresh.set_path("id", "c").unwrap();
        set.records.push(TaggedRecord::new(fresh));

        let summary = write_records(&mut grid, &mut set).unwrap();
        assert_eq!((summary.updated, summary.appended), (1, 1));

        let origins: Vec<Option<usize>> = set.records.iter().map(|t| t.origin).collect();
        assert_eq!(origins, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(
            grid.rows(),
            &[cells!["id"], cells!["a"], cells![CellValue::Empty], cells!["c"]]
        );

        // The committed tags stay distinct, so the set can be written again
        assert_eq!(write_records(&mut grid, &mut set).unwrap(), WriteSummary::default());
    }

    #[test]
    fn test_mixed_batch_order() {
        let mut grid = results_grid();
        let mut set = read_records(&grid, &results_tab(), None).unwrap();

        set.records.remove(0);
        set.records[1].record.set_path("status", "Archived").unwrap();
        set.records.push(TaggedRecord::new(record("id-9", "Submitted")));

        let plan = reconcile(&set.binding, set.baseline(), &set.records).unwrap();
        assert_eq!(plan.deletes, vec![0]);
        assert_eq!(plan.records[1].origin, Some(1));

        write_records(&mut grid, &mut set).unwrap();

        let ids: Vec<String> = grid.rows()[1..]
            .iter()
            .map(|row| row[1].to_string_value())
            .collect();
        assert_eq!(ids, vec!["id-2", "id-3", "id-9"]);
        assert_eq!(grid.cell(3, 3), Some(&CellValue::from("Archived")));
        assert_eq!(grid.cell(3, 4), Some(&CellValue::from("note c")));
    }

    #[test]
    fn test_filtered_set_leaves_unselected_rows() {
        let mut grid = results_grid();
        let mut set = read_records(&grid, &results_tab(), Some("selected")).unwrap();
        assert_eq!(set.len(), 2);

        set.records.remove(0);
        write_records(&mut grid, &mut set).unwrap();

        assert_eq!(grid.max_rows(), 3);
        assert_eq!(grid.rows()[2][1], CellValue::from("id-3"));
        assert_eq!(set.records[0].origin, Some(0));
    }

    #[test]
    fn test_unknown_and_duplicate_tags() {
        let set = read_records(&results_grid(), &results_tab(), None).unwrap();

        let mut current = set.records.clone();
        current[0].origin = Some(42);
        assert!(matches!(
            reconcile(&set.binding, set.baseline(), &current),
            Err(Error::UnboundOriginTag { origin: Some(42) })
        ));

        let mut current = set.records.clone();
        current[1].origin = Some(0);
        assert!(matches!(
            reconcile(&set.binding, set.baseline(), &current),
            Err(Error::DuplicateOriginTag(0))
        ));
    }

    #[test]
    fn test_header_change_is_rejected() {
        let mut grid = results_grid();
        let mut set = read_records(&grid, &results_tab(), None).unwrap();

        grid.set_cell(1, 3, "state".into()).unwrap();
        set.records.pop();
        assert!(matches!(
            write_records(&mut grid, &mut set),
            Err(Error::HeaderChanged { row: 1 })
        ));
        assert_eq!(grid.max_rows(), 4);
    }
}
