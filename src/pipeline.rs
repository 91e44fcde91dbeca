//! Discovery → storage → class-name extraction, one file at a time.
//!
//! Per file: read contents, insert the row, and only when the insert wrote a
//! row try to recover the class name and update it. Non-UTF-8 paths, read
//! failures, insert errors and zero-row inserts each count one error and move
//! on; a failed class-name update is logged but leaves the insert's success
//! standing.

use regex::Regex;
use serde::Serialize;
use std::path::Path;

use crate::error::{Dir2DbError, ReadError};
use crate::extract::ClassNameExtractor;
use crate::logging::PhaseTimer;
use crate::scan::{DiscoveredFile, ScanRequest, scan};
use crate::store::SourceStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub total_files: usize,
    pub rows_inserted: usize,
    pub error_count: usize,
    pub class_names: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Stored { class_name: Option<String> },
    UnsupportedPath,
    ReadFailed,
    StoreFailed,
    NotWritten,
}

pub struct Pipeline<'a, S: SourceStore> {
    store: &'a S,
    extractor: ClassNameExtractor,
    extract_filter: Option<Regex>,
}

impl<'a, S: SourceStore> Pipeline<'a, S> {
    pub fn new(store: &'a S, extractor: ClassNameExtractor) -> Self {
        Self {
            store,
            extractor,
            extract_filter: None,
        }
    }

    /// Restricts class-name extraction to file names matching `filter`.
    pub fn with_extract_filter(mut self, filter: Regex) -> Self {
        self.extract_filter = Some(filter);
        self
    }

    /// Full run: discovery failures and an empty discovery are fatal and
    /// happen before any store call.
    pub fn run(&self, request: &ScanRequest) -> Result<IngestSummary, Dir2DbError> {
        let timer = PhaseTimer::start("run");

        log::info!("[+] Searching {} for matching files", request.root().display());
        let scan_timer = PhaseTimer::start("scan");
        let files = scan(request)?;
        scan_timer.finish();

        if files.is_empty() {
            return Err(Dir2DbError::NoFiles(request.root().to_path_buf()));
        }
        log::info!("[+] {} files found", files.len());

        let mut summary = self.ingest(&files);
        summary.duration_ms = timer.finish();
        Ok(summary)
    }

    pub fn ingest(&self, files: &[DiscoveredFile]) -> IngestSummary {
        let timer = PhaseTimer::start("ingest");
        log::info!("[+] Inserting files into store");

        let mut summary = IngestSummary {
            total_files: files.len(),
            ..IngestSummary::default()
        };

        for file in files {
            match self.ingest_file(file) {
                FileOutcome::Stored { class_name } => {
                    summary.rows_inserted += 1;
                    if class_name.is_some() {
                        summary.class_names += 1;
                    }
                    log::info!(
                        "[+] File inserted: {} (row count: {})",
                        file.path.display(),
                        summary.rows_inserted
                    );
                }
                FileOutcome::UnsupportedPath
                | FileOutcome::ReadFailed
                | FileOutcome::StoreFailed
                | FileOutcome::NotWritten => {
                    summary.error_count += 1;
                    log::warn!(
                        "[-] File not inserted: {} (error count: {})",
                        file.path.display(),
                        summary.error_count
                    );
                }
            }
        }

        summary.duration_ms = timer.finish();
        summary
    }

    pub fn ingest_file(&self, file: &DiscoveredFile) -> FileOutcome {
        let Some(key) = file.key() else {
            log::warn!(target: "scan", "path is not valid UTF-8: {}", file.path.display());
            return FileOutcome::UnsupportedPath;
        };

        let contents = match read_contents(&file.path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!(target: "read", "{err}");
                return FileOutcome::ReadFailed;
            }
        };

        match self.store.insert_source(key, &contents) {
            Ok(0) => {
                log::warn!(target: "store", "insert affected no rows for {key}");
                return FileOutcome::NotWritten;
            }
            Ok(_) => {}
            Err(err) => {
                log::warn!(target: "store", "{err}");
                return FileOutcome::StoreFailed;
            }
        }
        drop(contents);

        if !self.wants_class_name(&file.path) {
            return FileOutcome::Stored { class_name: None };
        }

        let Some(class_name) = self.extractor.extract_class_name(&file.path) else {
            return FileOutcome::Stored { class_name: None };
        };

        match self.store.update_class_name(key, &class_name) {
            Ok(0) => {
                log::warn!(target: "store", "class name update affected no rows for {key}");
                FileOutcome::Stored { class_name: None }
            }
            Ok(_) => {
                log::debug!("class {class_name} recorded for {key}");
                FileOutcome::Stored {
                    class_name: Some(class_name),
                }
            }
            Err(err) => {
                log::warn!(target: "store", "{err}");
                FileOutcome::Stored { class_name: None }
            }
        }
    }

    fn wants_class_name(&self, path: &Path) -> bool {
        match &self.extract_filter {
            Some(re) => path
                .file_name()
                .is_some_and(|name| re.is_match(&name.to_string_lossy())),
            None => true,
        }
    }
}

fn read_contents(path: &Path) -> Result<Vec<u8>, ReadError> {
    std::fs::read(path).map_err(|source| ReadError {
        path: path.to_path_buf(),
        source,
    })
}
