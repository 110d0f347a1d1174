//! A named data source (one or more descriptors) and the TOML
//! configuration file that declares every source (spec.md §3, §4.7, §6).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::builder::{self, BuildOptions};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::fuzzy::{self, FileInterval};
use crate::indexed;
use crate::store::IndexStore;
use crate::time::Timestamp;

/// One or more descriptors grouped under a single name. A query against a
/// source fans out across all of its descriptors and merges the results
/// (spec.md §4.7 "DataSource aggregation").
#[derive(Debug, Clone)]
pub struct DataSource {
    pub name: String,
    pub descriptors: Vec<Descriptor>,
}

impl DataSource {
    /// Resolve files overlapping `[begin, end]` using the fuzzy heuristic,
    /// across every descriptor in this source.
    pub fn resolve_fuzzy(
        &self,
        begin: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<FileInterval>> {
        let mut results = Vec::new();
        for descriptor in &self.descriptors {
            results.extend(fuzzy::resolve(descriptor, begin, end)?);
        }
        Ok(results)
    }

    /// Resolve files overlapping `[begin, end]` using each descriptor's
    /// persisted index. Descriptors that share an `index_path` are queried
    /// only once (spec.md §4.7 "two descriptors pointing at the same index
    /// are queried once, not once per descriptor").
    pub fn resolve_indexed(
        &self,
        begin: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<FileInterval>> {
        let mut results = Vec::new();
        let mut seen_index_paths: HashSet<&PathBuf> = HashSet::new();

        for descriptor in &self.descriptors {
            let (_, index_path) = descriptor.require_index()?;
            if !seen_index_paths.insert(index_path) {
                continue;
            }
            results.extend(indexed::resolve(descriptor, begin, end)?);
        }
        Ok(results)
    }

    /// Build or extend every descriptor's index. Unlike querying, indexing
    /// dispatches per descriptor with no deduplication: each descriptor may
    /// walk a distinct set of paths into a shared index.
    pub fn index(
        &self,
        begin: Option<Timestamp>,
        end: Option<Timestamp>,
        options: &BuildOptions,
    ) -> Result<usize> {
        let mut total = 0;
        for descriptor in &self.descriptors {
            total += builder::build(descriptor, begin, end, options)?;
        }
        Ok(total)
    }

    /// Run `IndexStore::clean()` once per unique index path across this
    /// source's descriptors.
    pub fn clean(&self) -> Result<()> {
        let mut seen_index_paths: HashSet<&PathBuf> = HashSet::new();
        for descriptor in &self.descriptors {
            let (_, index_path) = descriptor.require_index()?;
            if !seen_index_paths.insert(index_path) {
                continue;
            }
            let store = indexed::open_store(descriptor)?;
            store.clean()?;
        }
        Ok(())
    }
}

/// Raw TOML shape: `[sources.<name>]` maps to a list of descriptor tables.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    sources: HashMap<String, RawSource>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSource {
    Single(Descriptor),
    Many(Vec<Descriptor>),
}

/// The full set of data sources loaded from a TOML configuration file.
#[derive(Debug, Clone)]
pub struct Config {
    pub sources: Vec<DataSource>,
}

impl Config {
    /// Parse and validate a configuration file. Each descriptor is
    /// validated individually, and no two descriptors across the whole
    /// file may share an `index_path` (spec.md §4.7 "Invariant: an
    /// `index_path` uniquely identifies one descriptor's index").
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: RawConfig = toml::from_str(&text)?;

        let mut sources = Vec::new();
        let mut seen_index_paths: HashMap<PathBuf, String> = HashMap::new();

        let mut names: Vec<&String> = raw.sources.keys().collect();
        names.sort();

        for name in names {
            let raw_source = &raw.sources[name];
            let mut descriptors = match raw_source {
                RawSource::Single(d) => vec![d.clone()],
                RawSource::Many(ds) => ds.clone(),
            };

            for descriptor in &mut descriptors {
                descriptor.name = name.clone();
                descriptor.validate()?;

                if let Some(index_path) = &descriptor.index_path {
                    if let Some(owner) = seen_index_paths.get(index_path) {
                        if owner != name {
                            return Err(Error::Configuration(format!(
                                "index_path {} is shared between sources '{owner}' and '{name}'",
                                index_path.display()
                            )));
                        }
                    } else {
                        seen_index_paths.insert(index_path.clone(), name.clone());
                    }
                }
            }

            sources.push(DataSource {
                name: name.clone(),
                descriptors,
            });
        }

        Ok(Self { sources })
    }

    pub fn source(&self, name: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_single_descriptor_source() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            [sources.squid]
            paths = ["/var/log/squid"]
            "#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.names(), vec!["squid"]);
        assert_eq!(config.source("squid").unwrap().descriptors.len(), 1);
    }

    #[test]
    fn test_load_multi_descriptor_source() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            [[sources.bluecoat]]
            paths = ["/var/log/bluecoat/one"]
            extractor = "bluecoat"

            [[sources.bluecoat]]
            paths = ["/var/log/bluecoat/two"]
            extractor = "bluecoat"
            "#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.source("bluecoat").unwrap().descriptors.len(), 2);
    }

    #[test]
    fn test_unknown_extractor_is_fatal() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            [sources.squid]
            paths = ["/var/log/squid"]
            extractor = "not-a-real-format"
            "#,
        )
        .unwrap();

        assert!(Config::load(&config_path).is_err());
    }

    #[test]
    fn test_shared_index_path_across_sources_is_fatal() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            [sources.a]
            paths = ["/var/log/a"]
            index_type = "sqlite"
            index_path = "/var/lib/idx.db"

            [sources.b]
            paths = ["/var/log/b"]
            index_type = "sqlite"
            index_path = "/var/lib/idx.db"
            "#,
        )
        .unwrap();

        assert!(Config::load(&config_path).is_err());
    }

    #[test]
    fn test_resolve_indexed_dedupes_shared_index_path() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("idx.db");
        let store = crate::sqlite_store::SqliteStore::open(&index_path).unwrap();
        store.add(std::path::Path::new("/a.log"), 1.0, 2.0).unwrap();
        drop(store);

        let descriptor = Descriptor {
            name: "multi".into(),
            paths: vec!["/var/log/a".into()],
            include: vec![],
            exclude: vec![],
            file_time_is_end_time: true,
            extractor: None,
            index_type: Some(crate::descriptor::IndexType::Sqlite),
            index_path: Some(index_path.clone()),
            indexer: Some(PathBuf::from("/usr/bin/indexer")),
        };

        let source = DataSource {
            name: "multi".into(),
            descriptors: vec![descriptor.clone(), descriptor],
        };

        let results = source.resolve_indexed(None, None).unwrap();
        assert_eq!(results.len(), 1);
    }
}
