//! Persistent store for ingested source files.
//!
//! Uses LMDB (via heed). One named database maps file path to raw contents,
//! a second maps file path to the recovered class name. Every write reports
//! how many rows it touched so callers can tell "nothing written" apart from
//! a storage failure.

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvFlags, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const DEFAULT_TABLE: &str = "php_files_complete";
pub const DEFAULT_MAP_SIZE_MB: usize = 1024;

const DEFAULT_MAX_DBS: u32 = 8;
const CLASS_NAME_SUFFIX: &str = ".class_name";

/// What an insert does when a row for the same path already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnConflict {
    /// Overwrite contents and clear the stale class name.
    #[default]
    Replace,
    /// Keep the existing row; the insert affects zero rows.
    Skip,
}

/// The two statements the ingestion pipeline issues.
pub trait SourceStore {
    /// Returns the number of rows written (0 or 1).
    fn insert_source(&self, path: &str, contents: &[u8]) -> Result<usize, StoreError>;

    /// Returns 0 when no contents row exists for `path`.
    fn update_class_name(&self, path: &str, class_name: &str) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub table: String,
    pub map_size_mb: usize,
    pub on_conflict: OnConflict,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            map_size_mb: DEFAULT_MAP_SIZE_MB,
            on_conflict: OnConflict::default(),
        }
    }
}

#[derive(Debug)]
pub struct LmdbStore {
    env: Env,
    db_path: PathBuf,
    sources: Database<Str, Bytes>,
    class_names: Database<Str, Str>,
    on_conflict: OnConflict,
}

impl LmdbStore {
    pub fn open(db_path: impl Into<PathBuf>, options: &StoreOptions) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let open_err = |source: heed::Error| StoreError::Open {
            path: db_path.clone(),
            source,
        };
        let env = open_env(&db_path, options.map_size_mb).map_err(open_err)?;

        let mut wtxn = env.write_txn().map_err(open_err)?;
        let class_table = format!("{}{CLASS_NAME_SUFFIX}", options.table);
        let sources = env
            .create_database::<Str, Bytes>(&mut wtxn, Some(options.table.as_str()))
            .map_err(open_err)?;
        let class_names = env
            .create_database::<Str, Str>(&mut wtxn, Some(class_table.as_str()))
            .map_err(open_err)?;
        wtxn.commit().map_err(open_err)?;

        log::debug!(target: "store", "opened {} (table {})", db_path.display(), options.table);
        Ok(Self {
            env,
            db_path,
            sources,
            class_names,
            on_conflict: options.on_conflict,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn source(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(statement_err("read", path))?;
        let value = self
            .sources
            .get(&rtxn, path)
            .map_err(statement_err("read", path))?;
        Ok(value.map(<[u8]>::to_vec))
    }

    pub fn class_name(&self, path: &str) -> Result<Option<String>, StoreError> {
        let rtxn = self.env.read_txn().map_err(statement_err("read", path))?;
        let value = self
            .class_names
            .get(&rtxn, path)
            .map_err(statement_err("read", path))?;
        Ok(value.map(str::to_string))
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let rtxn = self.env.read_txn().map_err(statement_err("stats", "*"))?;
        let rows = self
            .sources
            .len(&rtxn)
            .map_err(statement_err("stats", "*"))?;
        let named_rows = self
            .class_names
            .len(&rtxn)
            .map_err(statement_err("stats", "*"))?;
        Ok(StoreStats {
            db_path: self.db_path.to_string_lossy().to_string(),
            rows,
            named_rows,
        })
    }
}

impl SourceStore for LmdbStore {
    fn insert_source(&self, path: &str, contents: &[u8]) -> Result<usize, StoreError> {
        let err = statement_err("insert", path);
        let mut wtxn = self.env.write_txn().map_err(err)?;

        if self.on_conflict == OnConflict::Skip
            && self.sources.get(&wtxn, path).map_err(err)?.is_some()
        {
            return Ok(0);
        }

        self.sources.put(&mut wtxn, path, contents).map_err(err)?;
        self.class_names.delete(&mut wtxn, path).map_err(err)?;
        wtxn.commit().map_err(err)?;
        Ok(1)
    }

    fn update_class_name(&self, path: &str, class_name: &str) -> Result<usize, StoreError> {
        let err = statement_err("update", path);
        let mut wtxn = self.env.write_txn().map_err(err)?;

        if self.sources.get(&wtxn, path).map_err(err)?.is_none() {
            return Ok(0);
        }

        self.class_names
            .put(&mut wtxn, path, class_name)
            .map_err(err)?;
        wtxn.commit().map_err(err)?;
        Ok(1)
    }
}

/// Logs the engine error in full, then hides it behind [`StoreError`].
fn statement_err<'a>(op: &'static str, key: &'a str) -> impl Fn(heed::Error) -> StoreError + Copy + 'a {
    move |source| {
        log::error!(target: "store", "{op} failed for {key}: {source} ({source:?})");
        StoreError::Statement {
            op,
            key: key.to_string(),
            source,
        }
    }
}

fn open_env(db_path: &Path, map_size_mb: usize) -> heed::Result<Env> {
    let mut options = EnvOpenOptions::new();
    options.map_size(map_size_mb.max(1) * 1024 * 1024);
    options.max_dbs(DEFAULT_MAX_DBS);
    // SAFETY: We do not use NO_LOCK and keep default LMDB locking guarantees.
    // NO_SUB_DIR keeps the store a single file at the configured path.
    unsafe {
        options.flags(EnvFlags::NO_SUB_DIR);
        options.open(db_path)
    }
}

#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub db_path: String,
    pub rows: u64,
    pub named_rows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_db_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "dir2db_test_{}_{}_{}.lmdb",
            std::process::id(),
            nanos,
            name
        ))
    }

    fn cleanup(db_path: &Path) {
        let _ = std::fs::remove_file(db_path);
        let mut lock = db_path.as_os_str().to_os_string();
        lock.push("-lock");
        let _ = std::fs::remove_file(PathBuf::from(lock));
    }

    #[test]
    fn insert_then_update_sets_class_name() -> anyhow::Result<()> {
        let db_path = temp_db_path("insert_update");
        let store = LmdbStore::open(&db_path, &StoreOptions::default())?;
        assert_eq!(store.db_path(), db_path.as_path());

        assert_eq!(store.insert_source("/src/a.php", b"<?php class A {}")?, 1);
        assert_eq!(store.class_name("/src/a.php")?, None);
        assert_eq!(store.update_class_name("/src/a.php", "A")?, 1);

        assert_eq!(
            store.source("/src/a.php")?.as_deref(),
            Some(&b"<?php class A {}"[..])
        );
        assert_eq!(store.class_name("/src/a.php")?.as_deref(), Some("A"));

        let stats = store.stats()?;
        assert_eq!(stats.rows, 1);
        assert_eq!(stats.named_rows, 1);

        drop(store);
        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn update_without_row_affects_nothing() -> anyhow::Result<()> {
        let db_path = temp_db_path("update_missing");
        let store = LmdbStore::open(&db_path, &StoreOptions::default())?;

        assert_eq!(store.update_class_name("/src/ghost.php", "Ghost")?, 0);
        assert_eq!(store.class_name("/src/ghost.php")?, None);

        drop(store);
        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn replace_overwrites_contents_and_clears_stale_name() -> anyhow::Result<()> {
        let db_path = temp_db_path("replace");
        let store = LmdbStore::open(&db_path, &StoreOptions::default())?;

        store.insert_source("/src/a.php", b"old")?;
        store.update_class_name("/src/a.php", "Old")?;
        assert_eq!(store.insert_source("/src/a.php", b"new")?, 1);

        assert_eq!(store.source("/src/a.php")?.as_deref(), Some(&b"new"[..]));
        assert_eq!(store.class_name("/src/a.php")?, None);
        assert_eq!(store.stats()?.rows, 1);

        drop(store);
        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn skip_keeps_existing_row_and_reports_zero() -> anyhow::Result<()> {
        let db_path = temp_db_path("skip");
        let options = StoreOptions {
            on_conflict: OnConflict::Skip,
            ..StoreOptions::default()
        };
        let store = LmdbStore::open(&db_path, &options)?;

        assert_eq!(store.insert_source("/src/a.php", b"first")?, 1);
        assert_eq!(store.insert_source("/src/a.php", b"second")?, 0);
        assert_eq!(store.source("/src/a.php")?.as_deref(), Some(&b"first"[..]));

        drop(store);
        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn rows_survive_reopen() -> anyhow::Result<()> {
        let db_path = temp_db_path("reopen");
        {
            let store = LmdbStore::open(&db_path, &StoreOptions::default())?;
            store.insert_source("/src/b.php", b"<?php")?;
            store.update_class_name("/src/b.php", "B")?;
        }
        let store = LmdbStore::open(&db_path, &StoreOptions::default())?;
        assert_eq!(store.class_name("/src/b.php")?.as_deref(), Some("B"));

        drop(store);
        cleanup(&db_path);
        Ok(())
    }
}
