//! Infers per-file time intervals from path tokens and neighboring files
//! in the same time series (spec.md §4.3).

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Duration;
use rustc_hash::FxHashMap;

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::time::{self, Timestamp};
use crate::walker;

/// One `(path, begin, end)` triple with inclusive endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInterval {
    pub path: PathBuf,
    pub begin: Timestamp,
    pub end: Timestamp,
}

/// Resolve every file reachable through `descriptor`'s filesystem globs
/// into non-overlapping-per-series time intervals, then filter to those
/// overlapping `[begin, end]` (either bound may be absent).
pub fn resolve(
    descriptor: &Descriptor,
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
) -> Result<Vec<FileInterval>> {
    let now = chrono::Local::now();

    let mut partitions: FxHashMap<String, Vec<(PathBuf, Timestamp)>> = FxHashMap::default();
    for path in walker::walk(descriptor)? {
        let path_str = path.to_string_lossy().into_owned();
        let Some(ts) = time::extract(&path_str, descriptor.extractor.as_deref()) else {
            log::debug!("skipping {}: no timestamp extracted", path.display());
            continue;
        };
        let key = time::non_time_tokens(&path_str);
        partitions.entry(key).or_default().push((path, ts));
    }

    let mut results = Vec::new();
    let mut seen: HashSet<(String, u64)> = HashSet::new();

    for (_, mut files) in partitions {
        files.sort_by_key(|(_, ts)| *ts);

        let max_gap = max_gap(&files);

        for i in 0..files.len() {
            let (path, ts) = &files[i];

            let (file_begin, file_end) = if !descriptor.file_time_is_end_time {
                let file_begin = *ts;
                let file_end = if let Some((_, next_ts)) = files.get(i + 1) {
                    *next_ts
                } else if let Some(gap) = max_gap {
                    std::cmp::min(*ts + gap, now)
                } else {
                    *ts + Duration::days(2)
                };
                (file_begin, file_end)
            } else {
                let file_end = *ts;
                let file_begin = if i > 0 {
                    files[i - 1].1
                } else if let Some(gap) = max_gap {
                    std::cmp::max(*ts - gap, time::from_epoch(0.0))
                } else {
                    *ts - Duration::days(2)
                };
                (file_begin, file_end)
            };

            let in_window = end.map_or(true, |e| file_begin <= e) && begin.map_or(true, |b| b <= file_end);

            if !in_window {
                // Partition is sorted by timestamp; once file_begin exceeds
                // `end` no later file in this partition can qualify.
                if let Some(e) = end {
                    if file_begin > e {
                        break;
                    }
                }
                continue;
            }

            let Ok(metadata) = std::fs::metadata(path) else {
                continue;
            };
            let dedup_key = (
                path.file_name().unwrap_or_default().to_string_lossy().into_owned(),
                metadata.len(),
            );
            if !seen.insert(dedup_key) {
                continue;
            }

            results.push(FileInterval {
                path: path.clone(),
                begin: file_begin,
                end: file_end,
            });
        }
    }

    Ok(results)
}

/// Paths only, for driving `IndexBuilder` in windowed mode (spec.md §4.6).
pub fn resolve_paths(
    descriptor: &Descriptor,
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
) -> Result<Vec<PathBuf>> {
    Ok(resolve(descriptor, begin, end)?
        .into_iter()
        .map(|interval| interval.path)
        .collect())
}

/// Maximum absolute gap between consecutive timestamps in a sorted
/// partition; `None` if the partition has fewer than two files.
fn max_gap(sorted: &[(PathBuf, Timestamp)]) -> Option<Duration> {
    if sorted.len() < 2 {
        return None;
    }
    sorted
        .windows(2)
        .map(|w| w[1].1 - w[0].1)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn descriptor_for(root: &std::path::Path, end_time: bool) -> Descriptor {
        Descriptor {
            name: "squid".into(),
            paths: vec![root.to_string_lossy().into_owned()],
            include: vec![],
            exclude: vec![],
            file_time_is_end_time: end_time,
            extractor: None,
            index_type: None,
            index_path: None,
            indexer: None,
        }
    }

    #[test]
    fn test_fuzzy_end_time_semantics() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.20140101.gz"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("a.20140103.gz"), vec![0u8; 20]).unwrap();

        let d = descriptor_for(dir.path(), true);
        let mut intervals = resolve(&d, None, None).unwrap();
        intervals.sort_by_key(|i| i.end);

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].end.format("%Y-%m-%d %H:%M").to_string(), "2014-01-01 00:00");
        assert_eq!(intervals[1].end.format("%Y-%m-%d %H:%M").to_string(), "2014-01-03 00:00");
        assert_eq!(intervals[1].begin, intervals[0].end);
        assert_eq!(intervals[0].end - intervals[0].begin, Duration::days(2));
    }

    #[test]
    fn test_partition_split_by_path_key() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("proxy-s1")).unwrap();
        fs::create_dir(dir.path().join("proxy-s2")).unwrap();
        fs::write(dir.path().join("proxy-s1").join("squid.20140101.gz"), "x").unwrap();
        fs::write(dir.path().join("proxy-s2").join("squid.20140101.gz"), "x").unwrap();

        let d = descriptor_for(dir.path(), true);
        let intervals = resolve(&d, None, None).unwrap();
        assert_eq!(intervals.len(), 2);
    }

    #[test]
    fn test_dedup_basename_and_size() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a").join("squid.20140101.gz"), "samecontent").unwrap();
        fs::write(dir.path().join("b").join("squid.20140101.gz"), "samecontent").unwrap();

        let d = descriptor_for(dir.path(), true);
        let intervals = resolve(&d, None, None).unwrap();
        assert_eq!(intervals.len(), 1);
    }

    #[test]
    fn test_window_filters_results() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.20140101.gz"), "x").unwrap();
        fs::write(dir.path().join("a.20140105.gz"), "y").unwrap();
        fs::write(dir.path().join("a.20140110.gz"), "z").unwrap();

        let d = descriptor_for(dir.path(), true);
        let begin = time::extract("20140103", None);
        let end = time::extract("20140106", None);
        let intervals = resolve(&d, begin, end).unwrap();
        assert_eq!(intervals.len(), 1);
    }

    #[test]
    fn test_empty_window_yields_all() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.20140101.gz"), "x").unwrap();
        fs::write(dir.path().join("a.20140105.gz"), "y").unwrap();

        let d = descriptor_for(dir.path(), true);
        let intervals = resolve(&d, None, None).unwrap();
        assert_eq!(intervals.len(), 2);
    }

    #[test]
    fn test_invariant_begin_le_end() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.20140101.gz"), "x").unwrap();
        fs::write(dir.path().join("a.20140105.gz"), "y").unwrap();
        fs::write(dir.path().join("a.20140110.gz"), "z").unwrap();

        let d = descriptor_for(dir.path(), false);
        for interval in resolve(&d, None, None).unwrap() {
            assert!(interval.begin <= interval.end);
        }
    }
}
