use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::error::{PatternError, ScanError};
use crate::filter::PathFilter;

#[derive(Debug, Clone)]
pub struct ScanRequest {
    root: PathBuf,
    filter: PathFilter,
}

impl ScanRequest {
    pub fn new(root: impl Into<PathBuf>, filter: PathFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    pub fn from_patterns(
        root: impl Into<PathBuf>,
        inclusion: Option<&str>,
        exclusion: Option<&str>,
    ) -> Result<Self, PatternError> {
        Ok(Self::new(root, PathFilter::from_patterns(inclusion, exclusion)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
}

impl DiscoveredFile {
    /// Store key for this file, or `None` when the path is not valid UTF-8.
    /// Lossy conversion would let distinct paths share a key.
    pub fn key(&self) -> Option<&str> {
        self.path.to_str()
    }
}

/// Walks `request.root` depth-first in directory-entry order and returns every
/// regular file selected by the request's filter. Excluded directories are
/// pruned before descent.
pub fn scan(request: &ScanRequest) -> Result<Vec<DiscoveredFile>, ScanError> {
    let root = resolve_root(request.root())?;

    let prune = request.filter().clone();
    let walker = WalkBuilder::new(&root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !prune.prunes(entry.path(), is_dir)
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!(target: "scan", "skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if request.filter().selects_file(entry.path()) {
            files.push(DiscoveredFile {
                path: entry.into_path(),
            });
        }
    }

    log::debug!(target: "scan", "{} files selected under {}", files.len(), root.display());
    Ok(files)
}

fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
    if !root.exists() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    std::fs::canonicalize(root).map_err(|source| ScanError::Resolve {
        path: root.to_path_buf(),
        source,
    })
}
