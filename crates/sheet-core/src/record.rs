//! Nested records and dot-path flattening
//!
//! A header like `webpagetest.settings.connection` addresses a leaf three
//! levels deep. This module converts between nested [`Record`]s and the flat
//! `path -> value` form a row of cells naturally has.

use crate::error::{Error, Result};
use crate::value::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator between dot-path segments
pub const PATH_SEPARATOR: char = '.';

/// Flat mapping of dot-paths to scalar values
pub type FlatRecord = BTreeMap<String, CellValue>;

/// A node in a record tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// Leaf value
    Scalar(CellValue),
    /// Nested structure
    Object(Record),
}

/// A nested key-value record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Node>,
}

impl Record {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Get a top-level field
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.fields.get(key)
    }

    /// Insert a top-level field, returning the previous node
    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> Option<Node> {
        self.fields.insert(key.into(), node)
    }

    /// Remove a top-level field
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.fields.remove(key)
    }

    /// Iterate over top-level fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.fields.iter()
    }

    /// Look up the node at a dot-path
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        let mut segments = path.split(PATH_SEPARATOR);
        let first = segments.next()?;
        let mut node = self.fields.get(first)?;
        for segment in segments {
            match node {
                Node::Object(inner) => node = inner.fields.get(segment)?,
                Node::Scalar(_) => return None,
            }
        }
        Some(node)
    }

    /// Look up the scalar at a dot-path
    pub fn get_value(&self, path: &str) -> Option<&CellValue> {
        match self.get_path(path)? {
            Node::Scalar(value) => Some(value),
            Node::Object(_) => None,
        }
    }

    /// Set a single dot-path in place, keeping every other field.
    ///
    /// Intermediate objects are created as needed. Fails if a segment on the
    /// way is a scalar, or if the target currently holds a nested object.
    pub fn set_path(&mut self, path: &str, value: impl Into<CellValue>) -> Result<()> {
        let (parent, leaf) = leaf_parent(self, path)?;
        if let Some(Node::Object(_)) = parent.fields.get(leaf) {
            return Err(Error::conflict(path, leaf));
        }
        parent
            .fields
            .insert(leaf.to_string(), Node::Scalar(value.into()));
        Ok(())
    }

    /// Flatten into `path -> value` pairs
    pub fn flatten(&self) -> FlatRecord {
        flatten(self)
    }
}

/// Recursively walk a record, emitting one entry per leaf.
///
/// Empty nested objects contribute nothing.
pub fn flatten(record: &Record) -> FlatRecord {
    let mut flat = FlatRecord::new();
    flatten_into(record, "", &mut flat);
    flat
}

fn flatten_into(record: &Record, prefix: &str, flat: &mut FlatRecord) {
    for (key, node) in &record.fields {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{PATH_SEPARATOR}{key}")
        };
        match node {
            Node::Scalar(value) => {
                flat.insert(path, value.clone());
            }
            Node::Object(inner) => flatten_into(inner, &path, flat),
        }
    }
}

/// Rebuild a nested record from `path -> value` pairs
pub fn unflatten<'a, I>(entries: I) -> Result<Record>
where
    I: IntoIterator<Item = (&'a String, &'a CellValue)>,
{
    let mut record = Record::new();
    for (path, value) in entries {
        insert_leaf(&mut record, path, value.clone())?;
    }
    Ok(record)
}

/// Like [`Record::set_path`], but a repeated leaf is a conflict too: two
/// entries of one flat mapping may never address the same node.
fn insert_leaf(record: &mut Record, path: &str, value: CellValue) -> Result<()> {
    let (parent, leaf) = leaf_parent(record, path)?;
    if parent.fields.contains_key(leaf) {
        return Err(Error::conflict(path, leaf));
    }
    parent.fields.insert(leaf.to_string(), Node::Scalar(value));
    Ok(())
}

/// Walk to the object holding the last segment of `path`, creating missing
/// intermediate objects.
fn leaf_parent<'r, 'p>(record: &'r mut Record, path: &'p str) -> Result<(&'r mut Record, &'p str)> {
    let (parents, leaf) = match path.rsplit_once(PATH_SEPARATOR) {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut current = record;
    for segment in parents.into_iter().flat_map(|p| p.split(PATH_SEPARATOR)) {
        let node = current
            .fields
            .entry(segment.to_string())
            .or_insert_with(|| Node::Object(Record::new()));
        current = match node {
            Node::Object(inner) => inner,
            Node::Scalar(_) => return Err(Error::conflict(path, segment)),
        };
    }
    Ok((current, leaf))
}

impl FromIterator<(String, Node)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Node)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sample() -> Record {
        let mut record = Record::new();
        record.set_path("url", "web.dev").unwrap();
        record.set_path("recurring.frequency", "daily").unwrap();
        record
            .set_path("webpagetest.settings.connection", "3G")
            .unwrap();
        record
    }

    #[test]
    fn test_flatten_nested() {
        let flat = sample().flatten();

        let paths: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec!["recurring.frequency", "url", "webpagetest.settings.connection"]
        );
        assert_eq!(flat["url"], CellValue::from("web.dev"));
    }

    #[test]
    fn test_flatten_skips_empty_objects() {
        let mut record = sample();
        record.insert("psi", Node::Object(Record::new()));

        assert!(!record.flatten().keys().any(|p| p.starts_with("psi")));
    }

    #[test]
    fn test_unflatten_builds_nesting() {
        let mut flat = FlatRecord::new();
        flat.insert("recurring.frequency".into(), "daily".into());
        flat.insert("url".into(), "web.dev".into());
        flat.insert("webpagetest.settings.connection".into(), "3G".into());

        assert_eq!(unflatten(&flat).unwrap(), sample());
    }

    #[test]
    fn test_unflatten_conflict() {
        let mut flat = FlatRecord::new();
        flat.insert("recurring".into(), "daily".into());
        flat.insert("recurring.frequency".into(), "daily".into());

        let err = unflatten(&flat).unwrap_err();
        assert!(matches!(err, Error::StructuralConflict { ref segment, .. } if segment == "recurring"));
    }

    #[test]
    fn test_set_path_keeps_siblings() {
        let mut record = sample();
        record
            .set_path("webpagetest.metadata.lastTestId", "testid123")
            .unwrap();

        assert_eq!(
            record.get_value("webpagetest.settings.connection"),
            Some(&CellValue::from("3G"))
        );
        assert_eq!(
            record.get_value("webpagetest.metadata.lastTestId"),
            Some(&CellValue::from("testid123"))
        );
    }

    #[test]
    fn test_set_path_overwrites_scalar() {
        let mut record = sample();
        record.set_path("recurring.frequency", "weekly").unwrap();
        assert_eq!(
            record.get_value("recurring.frequency"),
            Some(&CellValue::from("weekly"))
        );
    }

    #[test]
    fn test_set_path_conflicts() {
        let mut record = sample();
        assert!(matches!(
            record.set_path("url.host", "x"),
            Err(Error::StructuralConflict { .. })
        ));
        assert!(matches!(
            record.set_path("webpagetest.settings", "x"),
            Err(Error::StructuralConflict { .. })
        ));
        // Failed writes leave the record alone
        assert_eq!(record, sample());
    }

    #[test]
    fn test_get_path_through_scalar() {
        assert!(sample().get_path("url.host").is_none());
        assert!(matches!(
            sample().get_path("webpagetest.settings"),
            Some(Node::Object(_))
        ));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "url": "web.dev",
                "recurring": { "frequency": "daily" },
                "webpagetest": { "settings": { "connection": "3G" } }
            })
        );
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    fn leaf() -> impl Strategy<Value = CellValue> {
        prop_oneof![
            any::<bool>().prop_map(CellValue::Boolean),
            any::<i64>().prop_map(CellValue::Integer),
            "[a-zA-Z0-9 ]{0,8}".prop_map(CellValue::String),
            Just(CellValue::Empty),
        ]
    }

    fn record_tree() -> impl Strategy<Value = Record> {
        let key = "[a-z]{1,6}";
        let leaf_record = proptest::collection::btree_map(key, leaf().prop_map(Node::Scalar), 1..4)
            .prop_map(|fields| fields.into_iter().collect::<Record>());
        leaf_record.prop_recursive(3, 32, 4, move |inner| {
            proptest::collection::btree_map(
                key,
                prop_oneof![leaf().prop_map(Node::Scalar), inner.prop_map(Node::Object)],
                1..4,
            )
            .prop_map(|fields| fields.into_iter().collect::<Record>())
        })
    }

    proptest! {
        #[test]
        fn flatten_then_unflatten_is_identity(record in record_tree()) {
            let flat = flatten(&record);
            prop_assert_eq!(unflatten(&flat).unwrap(), record);
        }
    }
}
