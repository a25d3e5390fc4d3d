//! Centralized configuration for the Zotero search library.
//!
//! This module provides configuration constants for locating a Zotero data
//! directory, tuning the SQLite connection, and naming transient search
//! structures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ZoteroError};

/// Layout of a Zotero data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const DB_FILE_NAME: &'static str = "zotero.sqlite";
    pub const STORAGE_DIR_NAME: &'static str = "storage";
    pub const DEFAULT_DATA_DIR_NAME: &'static str = "Zotero";
    /// Prefix Zotero writes in front of stored attachment paths.
    pub const STORAGE_PATH_PREFIX: &'static str = "storage:";
}

/// SQLite connection settings.
pub struct ConnectionConfig;

impl ConnectionConfig {
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
    /// Number of VM instructions between cancellation checks.
    pub const PROGRESS_HANDLER_OPS: i32 = 1_000;
}

/// Naming and tokenization of ephemeral FTS5 structures.
pub struct IndexConfig;

impl IndexConfig {
    /// Every transient structure created by this crate starts with this.
    pub const NAME_PREFIX: &'static str = "zs_";
    pub const TOKENIZER: &'static str = "unicode61 remove_diacritics 1";
}

/// Search defaults.
pub struct SearchConfig;

impl SearchConfig {
    /// Item types excluded from field search unless the caller says otherwise.
    pub const DEFAULT_IGNORED_TYPES: [&'static str; 2] = ["attachment", "note"];
}

/// Resolve the Zotero data directory.
///
/// `None` means `$HOME/Zotero`. A leading `~` is expanded to the home directory.
pub fn resolve_data_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let home = || {
        dirs::home_dir().ok_or_else(|| ZoteroError::Config {
            message: "Cannot determine the home directory".to_string(),
        })
    };

    match dir {
        None => Ok(home()?.join(PathsConfig::DEFAULT_DATA_DIR_NAME)),
        Some(path) => match path.strip_prefix("~") {
            Ok(rest) => Ok(home()?.join(rest)),
            Err(_) => Ok(path.to_path_buf()),
        },
    }
}
