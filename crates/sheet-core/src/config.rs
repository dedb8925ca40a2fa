//! Tab layout configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Where the logical table sits inside a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabConfig {
    /// Tab name, used in messages
    pub name: String,
    /// Row holding the dot-path header (1-based)
    pub header_row: usize,
    /// Optional row with human-readable column titles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_row: Option<usize>,
    /// First data row (1-based); origin tags count from here
    pub data_start_row: usize,
    /// Boolean column used by "selected only" reads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_column: Option<String>,
}

impl TabConfig {
    /// Layout of a key/value tab: header in row 1, data from row 2
    pub fn key_value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header_row: 1,
            label_row: None,
            data_start_row: 2,
            selected_column: None,
        }
    }

    /// Layout of a list tab: blank row, property row, label row, then data
    pub fn list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header_row: 2,
            label_row: Some(3),
            data_start_row: 4,
            selected_column: Some("selected".to_string()),
        }
    }

    /// Check the row layout
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Error::InvalidTabConfig {
            name: self.name.clone(),
            message,
        };

        if self.header_row == 0 {
            return Err(invalid("header_row is 1-based and must not be 0".to_string()));
        }
        if self.data_start_row <= self.header_row {
            return Err(invalid(format!(
                "data_start_row {} must come after header_row {}",
                self.data_start_row, self.header_row
            )));
        }
        if let Some(label_row) = self.label_row {
            if label_row <= self.header_row || label_row >= self.data_start_row {
                return Err(invalid(format!(
                    "label_row {} must sit between header_row {} and data_start_row {}",
                    label_row, self.header_row, self.data_start_row
                )));
            }
        }
        Ok(())
    }
}

/// Tabs the connector works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Key/value settings (API keys and the like)
    pub config_tab: TabConfig,
    /// Key/value bookkeeping owned by the tool itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_tab: Option<TabConfig>,
    /// Test definitions
    pub tests_tab: TabConfig,
    /// Result records
    pub results_tab: TabConfig,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            config_tab: TabConfig::key_value("Config"),
            system_tab: Some(TabConfig::key_value("System")),
            tests_tab: TabConfig::list("Tests"),
            results_tab: TabConfig::list("Results"),
        }
    }
}

impl ConnectorConfig {
    /// Check every tab layout
    pub fn validate(&self) -> Result<()> {
        self.config_tab.validate()?;
        if let Some(system_tab) = &self.system_tab {
            system_tab.validate()?;
        }
        self.tests_tab.validate()?;
        self.results_tab.validate()
    }

    /// Load a connector config from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the connector config to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
