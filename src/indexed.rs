//! Forwards a query to an `IndexStore` and translates its epoch-valued
//! rows back into local timestamps (spec.md §4.5).

use std::sync::Arc;

use crate::descriptor::{Descriptor, IndexType};
use crate::error::{Error, Result};
use crate::fuzzy::FileInterval;
use crate::nfs_store::SqliteNfsStore;
use crate::sqlite_store::SqliteStore;
use crate::store::IndexStore;
use crate::time::{self, Timestamp};

/// Open the `IndexStore` variant named by a descriptor's `index_type`.
pub fn open_store(descriptor: &Descriptor) -> Result<Arc<dyn IndexStore>> {
    let (index_type, index_path) = descriptor.require_index()?;

    if !index_path.exists() {
        return Err(Error::IndexIo {
            path: index_path.clone(),
            reason: "index file does not exist".into(),
        });
    }

    Ok(match index_type {
        IndexType::Sqlite => Arc::new(SqliteStore::open(index_path)?),
        IndexType::SqliteNfs => Arc::new(SqliteNfsStore::open(index_path)?),
    })
}

/// Query a descriptor's index for files overlapping `[begin, end]`,
/// emitting a diagnostic warning if the index looks stale relative to
/// `end` (spec.md §4.5 "Staleness warning").
pub fn resolve(
    descriptor: &Descriptor,
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
) -> Result<Vec<FileInterval>> {
    let store = open_store(descriptor)?;
    resolve_with_store(store.as_ref(), begin, end)
}

pub fn resolve_with_store(
    store: &dyn IndexStore,
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
) -> Result<Vec<FileInterval>> {
    let begin_epoch = begin.map(time::to_epoch);
    let end_epoch = end.map(time::to_epoch);

    if let Some(end_epoch) = end_epoch {
        if let Ok(modified) = store.modified_at() {
            let modified_epoch = modified
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            if modified_epoch < end_epoch {
                log::warn!(
                    "index modified at {modified_epoch} predates query end {end_epoch}; results may be stale"
                );
            }
        }
    }

    let rows = store.query(begin_epoch, end_epoch)?;

    Ok(rows
        .into_iter()
        .map(|row| FileInterval {
            path: row.path,
            begin: time::from_epoch(row.min_time),
            end: time::from_epoch(row.max_time),
        })
        .collect())
}
