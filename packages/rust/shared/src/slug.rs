//! Read-only source-key → destination slug table.
//!
//! Loaded once per run and passed by reference to every stage that needs it.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// One row of `slug_map.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugMapEntry {
    /// Path segment of the source URL (e.g. `cpp/language/comments`).
    #[serde(rename = "cppref")]
    pub source: String,
    /// Destination path in the corpus, or `null` when intentionally unmapped.
    #[serde(rename = "cppdoc")]
    pub destination: Option<String>,
}

/// Outcome of a slug lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugLookup<'a> {
    /// Key is mapped to this destination.
    Mapped(&'a str),
    /// Key is known but intentionally has no destination yet.
    Unmapped,
    /// Key is absent from the table.
    Unknown,
}

/// Immutable slug table. Lookups preserve file order for reporting.
#[derive(Debug, Clone, Default)]
pub struct SlugTable {
    entries: Vec<SlugMapEntry>,
    index: HashMap<String, usize>,
}

impl SlugTable {
    pub fn from_entries(entries: Vec<SlugMapEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            // First occurrence wins.
            index.entry(entry.source.clone()).or_insert(i);
        }
        Self { entries, index }
    }

    /// Parse the JSON array form of the table.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<SlugMapEntry> = serde_json::from_str(json)
            .map_err(|e| MigrateError::config(format!("invalid slug map: {e}")))?;
        Ok(Self::from_entries(entries))
    }

    /// Load the table from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))?;
        let table = Self::from_json(&content)?;
        tracing::info!(?path, entries = table.len(), "slug table loaded");
        Ok(table)
    }

    pub fn resolve(&self, key: &str) -> SlugLookup<'_> {
        match self.index.get(key).map(|&i| &self.entries[i]) {
            Some(SlugMapEntry {
                destination: Some(dest),
                ..
            }) => SlugLookup::Mapped(dest),
            Some(_) => SlugLookup::Unmapped,
            None => SlugLookup::Unknown,
        }
    }

    /// Destination for a job's own output. Anything but a mapping is fatal to the job.
    pub fn output_destination(&self, key: &str) -> Result<&str> {
        match self.resolve(key) {
            SlugLookup::Mapped(dest) => Ok(dest),
            SlugLookup::Unmapped | SlugLookup::Unknown => Err(MigrateError::SlugResolution {
                key: key.to_string(),
            }),
        }
    }

    pub fn entries(&self) -> &[SlugMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SlugTable {
        SlugTable::from_json(
            r#"[
                {"cppref": "cpp/comments", "cppdoc": "cpp/comments"},
                {"cppref": "cpp/language/array", "cppdoc": "cpp/language/types/array"},
                {"cppref": "cpp/experimental", "cppdoc": null}
            ]"#,
        )
        .expect("parse table")
    }

    #[test]
    fn resolves_all_three_outcomes() {
        let t = table();
        assert_eq!(t.resolve("cpp/comments"), SlugLookup::Mapped("cpp/comments"));
        assert_eq!(
            t.resolve("cpp/language/array"),
            SlugLookup::Mapped("cpp/language/types/array")
        );
        assert_eq!(t.resolve("cpp/experimental"), SlugLookup::Unmapped);
        assert_eq!(t.resolve("cpp/nowhere"), SlugLookup::Unknown);
    }

    #[test]
    fn output_destination_requires_mapping() {
        let t = table();
        assert_eq!(t.output_destination("cpp/comments").unwrap(), "cpp/comments");
        assert!(matches!(
            t.output_destination("cpp/experimental"),
            Err(MigrateError::SlugResolution { .. })
        ));
        assert!(matches!(
            t.output_destination("cpp/nowhere"),
            Err(MigrateError::SlugResolution { key }) if key == "cpp/nowhere"
        ));
    }

    #[test]
    fn first_duplicate_wins() {
        let t = SlugTable::from_entries(vec![
            SlugMapEntry {
                source: "a".into(),
                destination: Some("first".into()),
            },
            SlugMapEntry {
                source: "a".into(),
                destination: Some("second".into()),
            },
        ]);
        assert_eq!(t.resolve("a"), SlugLookup::Mapped("first"));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = SlugTable::from_json("{not json").unwrap_err();
        assert!(matches!(err, MigrateError::Config { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slug_map.json");
        std::fs::write(&path, r#"[{"cppref": "c/io", "cppdoc": "c/io"}]"#).unwrap();
        let t = SlugTable::load(&path).unwrap();
        assert_eq!(t.resolve("c/io"), SlugLookup::Mapped("c/io"));
        assert!(SlugTable::load(&dir.path().join("missing.json")).is_err());
    }
}
