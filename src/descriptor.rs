//! The immutable configuration record for one (paths, filters, extractor,
//! index) bundle, as specified in spec.md §3.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    Sqlite,
    SqliteNfs,
}

/// One (paths, filters, extractor, index config) bundle within a data
/// source. Constructed once at configuration load and immutable for the
/// lifetime of the process.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    /// Source name this descriptor belongs to.
    #[serde(default)]
    pub name: String,

    /// Ordered list of directory glob patterns.
    pub paths: Vec<String>,

    /// Optional filename glob patterns; a file must match at least one.
    #[serde(default)]
    pub include: Vec<String>,

    /// Optional filename glob patterns; a file must match none.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// If true, the timestamp extracted from a file's path denotes the end
    /// of its data interval; otherwise the beginning.
    #[serde(default = "default_true")]
    pub file_time_is_end_time: bool,

    /// Name of a custom extractor; absent means the default heuristic.
    #[serde(default)]
    pub extractor: Option<String>,

    /// Which `IndexStore` variant backs this descriptor.
    #[serde(default)]
    pub index_type: Option<IndexType>,

    /// Filesystem path to the backing store.
    #[serde(default)]
    pub index_path: Option<PathBuf>,

    /// Path to the external indexer program.
    #[serde(default)]
    pub indexer: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Descriptor {
    /// Validate the descriptor: an unknown extractor name, or an index
    /// config present/absent inconsistently, is a configuration error
    /// (spec.md §7).
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(Error::Configuration(format!(
                "descriptor '{}' has no paths",
                self.name
            )));
        }

        if let Some(name) = &self.extractor {
            if !crate::time::is_known_extractor(name) {
                return Err(Error::Configuration(format!(
                    "unknown extractor '{name}' in descriptor '{}'",
                    self.name
                )));
            }
        }

        Ok(())
    }

    /// Validate that this descriptor is usable for indexed resolution:
    /// missing `index_type`/`index_path` is a configuration error (spec.md
    /// §4.5 "Errors").
    pub fn require_index(&self) -> Result<(IndexType, &PathBuf)> {
        let index_type = self.index_type.ok_or_else(|| {
            Error::Configuration(format!(
                "descriptor '{}' has no index_type configured",
                self.name
            ))
        })?;
        let index_path = self.index_path.as_ref().ok_or_else(|| {
            Error::Configuration(format!(
                "descriptor '{}' has no index_path configured",
                self.name
            ))
        })?;
        Ok((index_type, index_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_descriptor() -> Descriptor {
        Descriptor {
            name: "squid".into(),
            paths: vec!["/data/*".into()],
            include: vec![],
            exclude: vec![],
            file_time_is_end_time: true,
            extractor: None,
            index_type: Some(IndexType::Sqlite),
            index_path: Some(PathBuf::from("/tmp/idx.db")),
            indexer: Some(PathBuf::from("/usr/bin/squid-indexer")),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(base_descriptor().validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_extractor() {
        let mut d = base_descriptor();
        d.extractor = Some("not-a-real-format".into());
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_validate_empty_paths() {
        let mut d = base_descriptor();
        d.paths.clear();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_require_index_missing() {
        let mut d = base_descriptor();
        d.index_type = None;
        assert!(d.require_index().is_err());
    }
}
