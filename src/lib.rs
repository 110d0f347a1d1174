//! Resolves which files in a log archive overlap a given time interval.
//!
//! Every data source is a named bundle of descriptors, each pointing at a
//! set of path globs. Two resolution strategies are available: a fuzzy
//! heuristic that infers per-file intervals from neighboring files in the
//! same path series, and an indexed lookup against a persisted store
//! populated ahead of time by an external per-format indexer.
//!
//! # Example
//!
//! ```no_run
//! use logtime::{Config, Timestamp};
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("sources.toml")).unwrap();
//! let source = config.source("squid").unwrap();
//! let files = source.resolve_fuzzy(None, None).unwrap();
//! for interval in files {
//!     println!("{}", interval.path.display());
//! }
//! ```

mod builder;
mod datasource;
mod descriptor;
mod error;
mod file_lock;
mod fuzzy;
mod indexed;
mod nfs_store;
mod sqlite_store;
mod store;
mod time;
mod walker;

pub use builder::BuildOptions;
pub use datasource::{Config, DataSource};
pub use descriptor::{Descriptor, IndexType};
pub use error::{Error, Result};
pub use fuzzy::FileInterval;
pub use store::{IndexRow, IndexStore};
pub use time::{extractors, time_bound, to_epoch, Timestamp};
