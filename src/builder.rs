//! Worker pool that walks candidate files, skips those already indexed,
//! invokes the external indexer per file, and commits results to the
//! `IndexStore` (spec.md §4.6).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::descriptor::{Descriptor, IndexType};
use crate::error::{Error, Result};
use crate::fuzzy;
use crate::nfs_store::SqliteNfsStore;
use crate::sqlite_store::SqliteStore;
use crate::store::IndexStore;
use crate::time::Timestamp;
use crate::walker;

/// Options controlling one indexing run.
pub struct BuildOptions {
    /// Worker pool size; defaults to host CPU count.
    pub workers: usize,
    /// Run `IndexStore::clean()` before indexing.
    pub clean: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            clean: false,
        }
    }
}

/// Materialize or extend a descriptor's index. If a window is supplied,
/// candidate paths come from `FuzzyResolver` (windowed mode); otherwise
/// every path `FileWalker` enumerates is indexed (full mode).
pub fn build(
    descriptor: &Descriptor,
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
    options: &BuildOptions,
) -> Result<usize> {
    let (index_type, index_path) = descriptor.require_index()?;
    let indexer = descriptor.indexer.as_ref().ok_or_else(|| {
        Error::Configuration(format!("descriptor '{}' has no indexer configured", descriptor.name))
    })?;

    let store: Arc<dyn IndexStore> = match index_type {
        IndexType::Sqlite => Arc::new(SqliteStore::open(index_path)?),
        IndexType::SqliteNfs => Arc::new(SqliteNfsStore::open(index_path)?),
    };

    if options.clean {
        store.clean()?;
    }

    let candidates: Vec<PathBuf> = if begin.is_some() || end.is_some() {
        fuzzy::resolve_paths(descriptor, begin, end)?
    } else {
        walker::walk(descriptor)?.collect()
    };

    let pending: Vec<PathBuf> = {
        let mut pending = Vec::new();
        for path in candidates {
            if !store.indexed(&path)? {
                pending.push(path);
            }
        }
        pending
    };

    if pending.is_empty() {
        return Ok(0);
    }

    let pool = build_pool(options.workers)?;
    let results = run_indexer_pool(&pool, &pending, indexer)?;

    let committed = results.len();
    for (path, min_time, max_time) in results {
        store.add(&path, min_time, max_time)?;
    }

    Ok(committed)
}

fn build_pool(workers: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| Error::Configuration(e.to_string()))
}

/// Run one indexer subprocess per path, in parallel across `pool`.
/// A failed task aborts the whole run by propagating its error; anything
/// already committed to the store before that point stays durable because
/// `IndexStore::add` commits immediately (spec.md §4.6 "Commit").
fn run_indexer_pool(
    pool: &ThreadPool,
    paths: &[PathBuf],
    indexer: &Path,
) -> Result<Vec<(PathBuf, f64, f64)>> {
    pool.install(|| {
        use rayon::prelude::*;
        paths
            .par_iter()
            .map(|path| run_one(indexer, path))
            .collect::<Result<Vec<_>>>()
    })
}

fn run_one(indexer: &Path, path: &Path) -> Result<(PathBuf, f64, f64)> {
    let output = Command::new(indexer)
        .arg(path)
        .output()
        .map_err(|e| Error::Indexer {
            indexer: indexer.display().to_string(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::Indexer {
            indexer: indexer.display().to_string(),
            path: path.to_path_buf(),
            reason: format!("exit status {}", output.status),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().ok_or_else(|| Error::Indexer {
        indexer: indexer.display().to_string(),
        path: path.to_path_buf(),
        reason: "no output".into(),
    })?;

    let mut parts = first_line.split_whitespace();
    let min_time: f64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| unparseable(indexer, path, first_line))?;
    let max_time: f64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| unparseable(indexer, path, first_line))?;

    Ok((path.to_path_buf(), min_time, max_time))
}

fn unparseable(indexer: &Path, path: &Path, line: &str) -> Error {
    Error::Indexer {
        indexer: indexer.display().to_string(),
        path: path.to_path_buf(),
        reason: format!("unparseable output line: {line:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn mock_indexer(dir: &Path, min: &str, max: &str) -> PathBuf {
        let script = dir.join("mock-indexer.sh");
        let mut file = fs::File::create(&script).unwrap();
        writeln!(file, "#!/bin/sh\necho \"{min} {max}\"").unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();
        script
    }

    fn descriptor_with_index(root: &Path, index_path: &Path, indexer: &Path) -> Descriptor {
        Descriptor {
            name: "squid".into(),
            paths: vec![root.to_string_lossy().into_owned()],
            include: vec![],
            exclude: vec![],
            file_time_is_end_time: true,
            extractor: None,
            index_type: Some(IndexType::Sqlite),
            index_path: Some(index_path.to_path_buf()),
            indexer: Some(indexer.to_path_buf()),
        }
    }

    #[test]
    fn test_parallel_indexing_populates_store() {
        let dir = tempdir().unwrap();
        for i in 0..20 {
            fs::write(dir.path().join(format!("f{i}.log")), "x").unwrap();
        }
        let index_path = dir.path().join("idx.db");
        let indexer = mock_indexer(dir.path(), "10.0", "20.0");
        let descriptor = descriptor_with_index(dir.path(), &index_path, &indexer);

        let options = BuildOptions {
            workers: 4,
            clean: false,
        };
        let committed = build(&descriptor, None, None, &options).unwrap();
        assert_eq!(committed, 20);

        let store = SqliteStore::open(&index_path).unwrap();
        let rows = store.query(None, None).unwrap();
        assert_eq!(rows.len(), 20);
        assert!(rows.iter().all(|r| r.min_time == 10.0 && r.max_time == 20.0));
    }

    #[test]
    fn test_rerun_is_idempotent_no_duplicates() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f0.log"), "x").unwrap();
        let index_path = dir.path().join("idx.db");
        let indexer = mock_indexer(dir.path(), "1.0", "2.0");
        let descriptor = descriptor_with_index(dir.path(), &index_path, &indexer);

        let options = BuildOptions::default();
        build(&descriptor, None, None, &options).unwrap();
        let second_run = build(&descriptor, None, None, &options).unwrap();
        assert_eq!(second_run, 0);

        let store = SqliteStore::open(&index_path).unwrap();
        assert_eq!(store.query(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_indexer_failure_aborts_run() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f0.log"), "x").unwrap();
        let index_path = dir.path().join("idx.db");

        let script = dir.path().join("fail.sh");
        let mut file = fs::File::create(&script).unwrap();
        writeln!(file, "#!/bin/sh\nexit 1").unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();

        let descriptor = descriptor_with_index(dir.path(), &index_path, &script);
        let options = BuildOptions::default();
        assert!(build(&descriptor, None, None, &options).is_err());
    }
}
