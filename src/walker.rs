//! Enumerates files under a descriptor's path-globs, applying
//! include/exclude filename patterns (spec.md §4.2).

use std::path::PathBuf;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};

/// Lazily walk every file matched by a descriptor's `paths` globs, filtered
/// by `include`/`exclude`. Glob-expanded roots are processed in
/// configuration order; traversal order within a root is unspecified.
pub fn walk(descriptor: &Descriptor) -> Result<impl Iterator<Item = PathBuf> + '_> {
    let include = build_set(&descriptor.include)?;
    let exclude = build_set(&descriptor.exclude)?;

    let roots = expand_roots(&descriptor.paths)?;

    Ok(roots.into_iter().flat_map(move |root| {
        let include = include.clone();
        let exclude = exclude.clone();
        WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(move |path| passes_filters(path, &include, &exclude))
    }))
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::InvalidPattern(e.to_string()))?;
        builder.add(glob);
    }
    Ok(Some(
        builder
            .build()
            .map_err(|e| Error::InvalidPattern(e.to_string()))?,
    ))
}

fn passes_filters(path: &std::path::Path, include: &Option<GlobSet>, exclude: &Option<GlobSet>) -> bool {
    let filename = match path.file_name().and_then(|f| f.to_str()) {
        Some(f) => f,
        None => return false,
    };

    let included = match include {
        Some(set) => set.is_match(filename),
        None => true,
    };
    let excluded = match exclude {
        Some(set) => set.is_match(filename),
        None => false,
    };

    included && !excluded
}

/// Expand each glob in `paths` to matching directories and canonicalize
/// them. A pattern with no glob metacharacters that exists as-is is passed
/// through directly.
fn expand_roots(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut roots = Vec::new();
    for pattern in patterns {
        let mut matched_any = false;
        for entry in glob::glob(pattern).map_err(|e| Error::InvalidPattern(e.to_string()))? {
            if let Ok(path) = entry {
                if path.is_dir() {
                    matched_any = true;
                    roots.push(path.canonicalize().unwrap_or(path));
                }
            }
        }
        if !matched_any {
            let direct = PathBuf::from(pattern);
            if direct.is_dir() {
                roots.push(direct.canonicalize().unwrap_or(direct));
            }
        }
    }
    Ok(roots)
}
