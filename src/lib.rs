//! # dir2db
//!
//! Loads the source files under a directory tree into a local store and
//! records the class each file declares.
//!
//! ## Architecture
//!
//! - **filter**: Inclusion/exclusion patterns for walk entries
//! - **scan**: Depth-first file discovery with subtree pruning
//! - **lexer**: Tagged token stream over raw source bytes
//! - **extract**: Chunked, resumable class-name recovery
//! - **store**: LMDB-backed rows keyed by file path
//! - **pipeline**: Per-file ingestion with success/error accounting
//! - **config**: TOML config file and environment overrides
//! - **logging**: Titled log lines to stderr and an optional file

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod lexer;
pub mod logging;
pub mod pipeline;
pub mod scan;
pub mod store;
