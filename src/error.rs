//! Typed errors for the ingestion run.
//!
//! Fatal conditions (`ConfigError`, `ScanError`, `PatternError`, an empty
//! discovery) abort the run. `ReadError` and `StoreError` are per-file and only
//! bump the error count.

use std::path::PathBuf;
use thiserror::Error;

/// The tokenizer's only failure: a NUL byte inside PHP code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("NUL byte in code at offset {offset}")]
    NulByte { offset: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no store path configured (use --db, DIR2DB_DB or [store] path in {config})")]
    MissingStorePath { config: PathBuf },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {role} pattern `{pattern}`: {source}")]
    Regex {
        role: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unsupported pattern flag `{flag}` in `{pattern}`")]
    Flag { flag: char, pattern: String },
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan root does not exist: {0}")]
    NotFound(PathBuf),

    #[error("scan root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to resolve scan root {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("failed to read {path}: {source}")]
pub struct ReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: heed::Error,
    },

    #[error("failed to create store directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store {op} failed for {key}: {source}")]
    Statement {
        op: &'static str,
        key: String,
        #[source]
        source: heed::Error,
    },
}

#[derive(Debug, Error)]
pub enum Dir2DbError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no files found under {0} matching the search parameters")]
    NoFiles(PathBuf),
}
