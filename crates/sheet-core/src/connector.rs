//! Connector over the config, system, tests and results tabs
//!
//! Key/value tabs hold one setting per row in a `key` column (a dot-path) and
//! a `value` column. List tabs hold one record per row.

use crate::config::{ConnectorConfig, TabConfig};
use crate::error::{Error, Result};
use crate::reader::{read_records, RecordSet, TaggedRecord};
use crate::reconcile::{write_records, WriteSummary};
use crate::record::{unflatten, FlatRecord, Record};
use crate::region::TabularRegion;
use crate::value::CellValue;

/// Header path of the key column in key/value tabs
pub const KEY_PATH: &str = "key";
/// Header path of the value column in key/value tabs
pub const VALUE_PATH: &str = "value";

/// A tab layout together with the cells behind it
#[derive(Debug, Clone)]
pub struct Tab<R> {
    pub layout: TabConfig,
    pub region: R,
}

impl<R: TabularRegion> Tab<R> {
    fn read(&self, selected_only: bool) -> Result<RecordSet> {
        let filter = if selected_only {
            let column = self.layout.selected_column.as_deref();
            if column.is_none() {
                log::warn!(
                    "{}: no selected column configured, reading every row",
                    self.layout.name
                );
            }
            column
        } else {
            None
        };
        read_records(&self.region, &self.layout, filter)
    }
}

/// Read a key/value tab as flat `path -> value` settings.
///
/// Rows without a key are ignored; a key without a value maps to Empty.
pub fn read_config<R: TabularRegion + ?Sized>(region: &R, tab: &TabConfig) -> Result<FlatRecord> {
    let set = read_records(region, tab, None)?;
    let mut settings = FlatRecord::new();

    for tagged in &set.records {
        let key = match tagged.record.get_value(KEY_PATH) {
            Some(CellValue::String(key)) if !key.trim().is_empty() => key.trim(),
            _ => continue,
        };
        let value = tagged
            .record
            .get_value(VALUE_PATH)
            .cloned()
            .unwrap_or_default();
        if settings.insert(key.to_string(), value).is_some() {
            log::warn!("{}: key '{}' appears more than once; last row wins", tab.name, key);
        }
    }

    Ok(settings)
}

/// Data-mapping connector for one spreadsheet
#[derive(Debug, Clone)]
pub struct Connector<R> {
    config: Tab<R>,
    system: Option<Tab<R>>,
    tests: Tab<R>,
    results: Tab<R>,
}

impl<R: TabularRegion> Connector<R> {
    /// Build a connector, opening each configured tab with `open`
    pub fn new<F>(config: &ConnectorConfig, mut open: F) -> Result<Self>
    where
        F: FnMut(&TabConfig) -> Result<R>,
    {
        config.validate()?;
        let mut tab = |layout: &TabConfig| -> Result<Tab<R>> {
            Ok(Tab {
                layout: layout.clone(),
                region: open(layout)?,
            })
        };

        Ok(Self {
            config: tab(&config.config_tab)?,
            system: config.system_tab.as_ref().map(&mut tab).transpose()?,
            tests: tab(&config.tests_tab)?,
            results: tab(&config.results_tab)?,
        })
    }

    /// The config tab
    pub fn config_tab(&self) -> &Tab<R> {
        &self.config
    }

    /// The system tab, if configured
    pub fn system_tab(&self) -> Option<&Tab<R>> {
        self.system.as_ref()
    }

    /// The tests tab
    pub fn tests_tab(&self) -> &Tab<R> {
        &self.tests
    }

    /// The results tab
    pub fn results_tab(&self) -> &Tab<R> {
        &self.results
    }

    /// Settings of the config tab as a nested record
    pub fn get_config(&self) -> Result<Record> {
        let settings = read_config(&self.config.region, &self.config.layout)?;
        unflatten(&settings)
    }

    /// Look up a system variable; blank values read as None
    pub fn get_system_var(&self, key: &str) -> Result<Option<CellValue>> {
        let system = self.system()?;
        let mut settings = read_config(&system.region, &system.layout)?;
        Ok(settings.remove(key).filter(|v| !v.is_empty()))
    }

    /// Set a system variable, adding a row for keys not present yet
    pub fn set_system_var(&mut self, key: &str, value: impl Into<CellValue>) -> Result<()> {
        let system = self.system_mut()?;
        let mut set = read_records(&system.region, &system.layout, None)?;

        let existing = set.records.iter_mut().rev().find(|t| {
            t.record
                .get_value(KEY_PATH)
                .and_then(CellValue::as_str)
                .is_some_and(|k| k.trim() == key)
        });
        match existing {
            Some(tagged) => tagged.record.set_path(VALUE_PATH, value)?,
            None => {
                let mut record = Record::new();
                record.set_path(KEY_PATH, key)?;
                record.set_path(VALUE_PATH, value)?;
                set.records.push(TaggedRecord::new(record));
            }
        }

        write_records(&mut system.region, &mut set)?;
        Ok(())
    }

    /// Test definitions, optionally only the selected ones
    pub fn get_test_list(&self, selected_only: bool) -> Result<RecordSet> {
        self.tests.read(selected_only)
    }

    /// Write an edited test list back
    pub fn update_test_list(&mut self, tests: &mut RecordSet) -> Result<WriteSummary> {
        write_records(&mut self.tests.region, tests)
    }

    /// Result records, optionally only the selected ones
    pub fn get_result_list(&self, selected_only: bool) -> Result<RecordSet> {
        self.results.read(selected_only)
    }

    /// Write an edited result list back
    pub fn update_results(&mut self, results: &mut RecordSet) -> Result<WriteSummary> {
        write_records(&mut self.results.region, results)
    }

    /// Add new result records below the existing ones
    pub fn append_results(&mut self, records: Vec<Record>) -> Result<WriteSummary> {
        let mut set = self.results.read(false)?;
        set.records
            .extend(records.into_iter().map(TaggedRecord::new));
        write_records(&mut self.results.region, &mut set)
    }

    /// Take the tabs back, e.g. to persist them
    pub fn into_tabs(self) -> (Tab<R>, Option<Tab<R>>, Tab<R>, Tab<R>) {
        (self.config, self.system, self.tests, self.results)
    }

    fn system(&self) -> Result<&Tab<R>> {
        self.system.as_ref().ok_or_else(missing_system_tab)
    }

    fn system_mut(&mut self) -> Result<&mut Tab<R>> {
        self.system.as_mut().ok_or_else(missing_system_tab)
    }
}

fn missing_system_tab() -> Error {
    Error::InvalidTabConfig {
        name: "system".to_string(),
        message: "no system tab configured".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells;
    use crate::region::MemoryGrid;
    use pretty_assertions::assert_eq;

    fn connector() -> Connector<MemoryGrid> {
        Connector::new(&ConnectorConfig::default(), |tab| {
            let rows = match tab.name.as_str() {
                "Config" => vec![
                    cells!["Name", "key", "value", ""],
                    cells!["WPT API Key", "apiKeys.webpagetest", "TEST_APIKEY"],
                    cells!["PSI API Key", "apiKeys.psi", "PSI_KEY"],
                ],
                "System" => vec![
                    cells!["Name", "key", "value"],
                    cells!["Retrieve Trigger ID", "RETRIEVE_TRIGGER_ID", ""],
                    cells!["onEdit trigger ID", "ONEDIT_TRIGGER_ID", "trigger-1"],
                ],
                _ => vec![
                    cells!["", "", ""],
                    cells!["selected", "id", "status"],
                    cells!["", "ID", "Status"],
                    cells![true, "id-1234", "Retrieved"],
                    cells![false, "id-5678", "Retrieved"],
                ],
            };
            Ok(MemoryGrid::from_rows(rows))
        })
        .unwrap()
    }

    #[test]
    fn test_get_config_nests_keys() {
        let config = connector().get_config().unwrap();

        let mut expected = Record::new();
        expected.set_path("apiKeys.webpagetest", "TEST_APIKEY").unwrap();
        expected.set_path("apiKeys.psi", "PSI_KEY").unwrap();
        assert_eq!(config, expected);
    }

    #[test]
    fn test_read_config_flat() {
        let connector = connector();
        let tab = connector.config_tab();
        let settings = read_config(&tab.region, &tab.layout).unwrap();

        assert_eq!(settings.len(), 2);
        assert_eq!(settings["apiKeys.psi"], CellValue::from("PSI_KEY"));
    }

    #[test]
    fn test_system_vars() {
        let mut connector = connector();
        assert_eq!(connector.get_system_var("RETRIEVE_TRIGGER_ID").unwrap(), None);
        assert_eq!(
            connector.get_system_var("ONEDIT_TRIGGER_ID").unwrap(),
            Some(CellValue::from("trigger-1"))
        );

        connector
            .set_system_var("RETRIEVE_TRIGGER_ID", "timeBased-retrieve")
            .unwrap();
        connector
            .set_system_var("LAST_INIT_TIMESTAMP", 1_600_000_000_i64)
            .unwrap();

        assert_eq!(
            connector.get_system_var("RETRIEVE_TRIGGER_ID").unwrap(),
            Some(CellValue::from("timeBased-retrieve"))
        );
        let system = &connector.system_tab().unwrap().region;
        assert_eq!(system.max_rows(), 4);
        assert_eq!(system.cell(2, 1), Some(&CellValue::from("Retrieve Trigger ID")));
        assert_eq!(system.cell(4, 3), Some(&CellValue::Integer(1_600_000_000)));
    }

    #[test]
    fn test_missing_system_tab() {
        let mut config = ConnectorConfig::default();
        config.system_tab = None;
        let connector =
            Connector::new(&config, |_| Ok(MemoryGrid::from_rows(vec![cells!["key", "value"]])))
                .unwrap();

        assert!(matches!(
            connector.get_system_var("X"),
            Err(Error::InvalidTabConfig { .. })
        ));
    }

    #[test]
    fn test_append_results() {
        let mut connector = connector();

        let mut record = Record::new();
        record.set_path("selected", true).unwrap();
        record.set_path("id", "id-9999").unwrap();
        record.set_path("status", "Submitted").unwrap();
        let summary = connector.append_results(vec![record]).unwrap();

        assert_eq!(summary.appended, 1);
        let results = connector.get_result_list(true).unwrap();
        let origins: Vec<Option<usize>> = results.records.iter().map(|t| t.origin).collect();
        assert_eq!(origins, vec![Some(0), Some(2)]);
    }
}
