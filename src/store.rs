//! `IndexStore`: a persisted map from file path to `(min_time, max_time)`
//! epoch-second interval, with mutual exclusion suitable for local or
//! network-shared storage (spec.md §4.4).
//!
//! Abstracted as a capability set (`add`/`remove`/`indexed`/`query`/
//! `clean`/`close`) so the local and NFS-safe variants can be swapped
//! without the resolvers caring which one they're talking to (spec.md §9
//! "Polymorphism across index variants").

use std::path::{Path, PathBuf};

/// One row of the index: a file path and the epoch-second interval the
/// external indexer reported for its contents.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub path: PathBuf,
    pub min_time: f64,
    pub max_time: f64,
}

/// Capability set implemented by every backing store variant.
pub trait IndexStore: Send + Sync {
    /// Insert a row. Duplicates are a caller error.
    fn add(&self, path: &Path, min_time: f64, max_time: f64) -> crate::error::Result<()>;

    /// Delete by path; a no-op if absent.
    fn remove(&self, path: &Path) -> crate::error::Result<()>;

    /// Existence query.
    fn indexed(&self, path: &Path) -> crate::error::Result<bool>;

    /// Rows overlapping `[begin, end]` (either bound may be absent), per
    /// the predicate `(begin.is_none() || begin <= max_time) &&
    /// (end.is_none() || min_time <= end)`.
    fn query(&self, begin: Option<f64>, end: Option<f64>) -> crate::error::Result<Vec<IndexRow>>;

    /// Delete every row whose path no longer exists on disk.
    fn clean(&self) -> crate::error::Result<()>;

    /// Release resources held by this store.
    fn close(&self) -> crate::error::Result<()>;

    /// Last-modified time of the backing store file, for the staleness
    /// advisory in `IndexedResolver` (spec.md §4.5).
    fn modified_at(&self) -> crate::error::Result<std::time::SystemTime>;
}

/// Whether a row overlaps the query window, per spec.md §4.4.
pub fn overlaps(row: &IndexRow, begin: Option<f64>, end: Option<f64>) -> bool {
    begin.map_or(true, |b| b <= row.max_time) && end.map_or(true, |e| row.min_time <= e)
}
