use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::extract::DEFAULT_CHUNK_SIZE;
use crate::store::{DEFAULT_MAP_SIZE_MB, DEFAULT_TABLE, OnConflict, StoreOptions};

pub const CONFIG_ENV: &str = "DIR2DB_CONFIG";
pub const DB_ENV: &str = "DIR2DB_DB";

/// File names eligible for class-name extraction.
pub const DEFAULT_EXTRACT_PATTERN: &str = r"(?i)\.(php\d?|phtml|inc)$";

const CONFIG_FILE_NAME: &str = "local.toml";

pub const CONFIG_TEMPLATE: &str = r#"# dir2db configuration

[store]
# LMDB file that receives the ingested rows. Required unless --db or
# DIR2DB_DB is given.
# path = "/var/lib/dir2db/dir2db.lmdb"
table = "php_files_complete"
map_size_mb = 1024
# "replace" overwrites rows for paths seen before, "skip" keeps them and
# counts the insert as failed.
on_conflict = "replace"

[log]
# file = "/var/log/dir2db.log"
append = true

[extract]
chunk_size = 512
pattern = '(?i)\.(php\d?|phtml|inc)$'
"#;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreSection,
    pub log: LogSection,
    pub extract: ExtractSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
    pub table: String,
    pub map_size_mb: usize,
    pub on_conflict: OnConflict,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: None,
            table: DEFAULT_TABLE.to_string(),
            map_size_mb: DEFAULT_MAP_SIZE_MB,
            on_conflict: OnConflict::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub file: Option<PathBuf>,
    pub append: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            file: None,
            append: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractSection {
    pub chunk_size: usize,
    pub pattern: String,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pattern: DEFAULT_EXTRACT_PATTERN.to_string(),
        }
    }
}

impl Config {
    /// Loads `path` if it exists; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!(target: "config", "{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.table.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "store.table",
                message: "must not be empty".to_string(),
            });
        }
        if self.extract.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "extract.chunk_size",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The store file: explicit override first, then the config file.
    pub fn store_path(
        &self,
        override_path: Option<&Path>,
        config_path: &Path,
    ) -> Result<PathBuf, ConfigError> {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.store.path.clone())
            .ok_or_else(|| ConfigError::MissingStorePath {
                config: config_path.to_path_buf(),
            })
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            table: self.store.table.clone(),
            map_size_mb: self.store.map_size_mb,
            on_conflict: self.store.on_conflict,
        }
    }
}

/// `--config`, else `DIR2DB_CONFIG`, else `<config dir>/dir2db/local.toml`.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(p) = cli_path {
        return Ok(p.to_path_buf());
    }
    if let Some(p) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    Ok(dir2db_config_dir()?.join(CONFIG_FILE_NAME))
}

/// `--db`, else `DIR2DB_DB`.
pub fn resolve_db_override(cli_db: Option<&Path>) -> Option<PathBuf> {
    cli_db
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(DB_ENV).filter(|v| !v.is_empty()).map(PathBuf::from))
}

/// Writes [`CONFIG_TEMPLATE`] unless a file is already there. Returns whether
/// a file was written.
pub fn write_template(path: &Path) -> anyhow::Result<bool> {
    use anyhow::Context;

    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    std::fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config template: {}", path.display()))?;
    Ok(true)
}

fn dir2db_config_dir() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| ConfigError::Invalid {
            key: "config path",
            message: "failed to resolve a config directory".to_string(),
        })?;
    Ok(base.join("dir2db"))
}
