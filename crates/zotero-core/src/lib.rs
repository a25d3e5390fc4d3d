//! Zotero Core - read-only search over a Zotero SQLite database.
//!
//! Zotero keeps authors, field values and attachment full texts in separate
//! tables with no cross-entity full-text index. This crate builds transient
//! FTS5 indices per search call, matches the caller's terms against them and
//! removes them again before returning, leaving the database untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use zotero_core::{SearchOptions, SearchTerms, ZoteroDatabase};
//!
//! fn main() -> zotero_core::Result<()> {
//!     let db = ZoteroDatabase::open("~/Zotero")?;
//!
//!     let terms = SearchTerms::parse("entropy production")?;
//!     let items = db.search_full_texts(&terms, &SearchOptions::default())?;
//!     println!("Found {} documents", items.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod gateway;
pub mod index;
pub mod mapping;
pub mod read;

pub use cancel::{CancelReason, CancellationToken, CancelledError};
pub use error::{ErrorKind, Result, ZoteroError};
pub use gateway::SchemaGateway;
pub use index::{ItemId, MatchMode, SearchOptions, SearchTerms};
pub use mapping::{NameIdMap, SchemaMappings};
pub use read::{CreatorName, DocAuthors, DocSummary};

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use config::{ConnectionConfig, IndexConfig, PathsConfig};
use read::DocListOptions;

/// An opened Zotero database.
///
/// The connection is read-only and serves one call at a time. Each call gets
/// its own [`SchemaGateway`] carrying the call's cancellation token.
pub struct ZoteroDatabase {
    data_dir: PathBuf,
    db_path: PathBuf,
    storage_dir: PathBuf,
    conn: Mutex<Connection>,
    mappings: SchemaMappings,
}

impl ZoteroDatabase {
    /// Open the database inside a Zotero data directory.
    ///
    /// A leading `~` in `data_dir` is expanded to the home directory.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = config::resolve_data_dir(Some(data_dir.as_ref()))?;
        let db_path = data_dir.join(PathsConfig::DB_FILE_NAME);
        let storage_dir = data_dir.join(PathsConfig::STORAGE_DIR_NAME);
        Self::open_paths(data_dir, db_path, storage_dir)
    }

    /// Open a database file directly, with an explicit attachment storage directory.
    pub fn open_file(db_path: impl Into<PathBuf>, storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let data_dir = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::open_paths(data_dir, db_path, storage_dir.into())
    }

    fn open_paths(data_dir: PathBuf, db_path: PathBuf, storage_dir: PathBuf) -> Result<Self> {
        if !db_path.is_file() {
            return Err(ZoteroError::DatabaseNotFound(db_path));
        }

        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure_connection(&conn)?;

        let mappings = {
            let gateway = SchemaGateway::new(&conn, CancellationToken::new());
            Self::check_capabilities(&gateway)?;
            index::sweep_residue(&gateway)?;
            SchemaMappings::load(&gateway)?
        };

        info!(
            db = %db_path.display(),
            item_types = mappings.item_types.len(),
            "Opened Zotero database"
        );

        Ok(Self {
            data_dir,
            db_path,
            storage_dir,
            conn: Mutex::new(conn),
            mappings,
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.busy_timeout(ConnectionConfig::BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA temp_store=MEMORY;")?;
        Ok(())
    }

    /// Searches need FTS5 and a writable temp schema.
    fn check_capabilities(gateway: &SchemaGateway<'_>) -> Result<()> {
        let scratch = format!("{}capability_check", IndexConfig::NAME_PREFIX);
        gateway
            .execute_batch(&format!(
                "CREATE VIRTUAL TABLE temp.{} USING fts5(body);",
                scratch
            ))
            .map_err(|e| ZoteroError::Capability {
                message: format!("Cannot create a temporary FTS5 table: {}", e),
            })?;
        gateway.execute_cleanup(&format!("DROP TABLE IF EXISTS temp.{};", scratch))?;
        debug!("FTS5 capability check passed");
        Ok(())
    }

    /// Run `f` with a gateway over the locked connection.
    fn with_gateway<T, F>(&self, cancel: &CancellationToken, f: F) -> Result<T>
    where
        F: FnOnce(&SchemaGateway<'_>) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| ZoteroError::lock_poisoned())?;
        let gateway = SchemaGateway::new(&conn, cancel.clone());
        f(&gateway)
    }

    /// Zotero data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to `zotero.sqlite`.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Attachment storage directory.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn mappings(&self) -> &SchemaMappings {
        &self.mappings
    }

    /// Items whose creators' names match `terms`.
    pub fn search_authors(&self, terms: &SearchTerms, options: &SearchOptions) -> Result<Vec<ItemId>> {
        self.with_gateway(&options.cancel, |gw| {
            index::search_authors(gw, terms, options.item_ids.as_deref())
        })
    }

    /// Items whose field values match `terms`, skipping `options.ignored_types`.
    pub fn search_fields(&self, terms: &SearchTerms, options: &SearchOptions) -> Result<Vec<ItemId>> {
        self.with_gateway(&options.cancel, |gw| {
            index::search_fields(
                gw,
                &self.mappings,
                terms,
                options.item_ids.as_deref(),
                options.ignored_types.as_slice(),
            )
        })
    }

    /// Parent items of attachments whose indexed full text matches `terms`.
    pub fn search_full_texts(
        &self,
        terms: &SearchTerms,
        options: &SearchOptions,
    ) -> Result<Vec<ItemId>> {
        self.with_gateway(&options.cancel, |gw| {
            index::search_full_texts(gw, terms, options.item_ids.as_deref())
        })
    }

    /// Items with a creator whose first or last name contains `key`.
    pub fn search_authors_substring(
        &self,
        key: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ItemId>> {
        self.with_gateway(&options.cancel, |gw| {
            index::search_authors_substring(gw, key, options.item_ids.as_deref())
        })
    }

    /// Items with a field value containing `key`, skipping `options.ignored_types`.
    pub fn search_fields_substring(
        &self,
        key: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ItemId>> {
        self.with_gateway(&options.cancel, |gw| {
            index::search_fields_substring(
                gw,
                &self.mappings,
                key,
                options.item_ids.as_deref(),
                options.ignored_types.as_slice(),
            )
        })
    }

    /// Parent items of attachments with an indexed word containing `key`.
    pub fn search_full_texts_substring(
        &self,
        key: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ItemId>> {
        self.with_gateway(&options.cancel, |gw| {
            index::search_full_texts_substring(gw, key, options.item_ids.as_deref())
        })
    }

    /// Brief information on every document.
    ///
    /// With `absolute_paths` attachment paths start at the storage directory,
    /// otherwise they are relative to it.
    pub fn all_docs(&self, absolute_paths: bool, simplify_authors: bool) -> Result<Vec<DocSummary>> {
        let options = DocListOptions {
            storage_dir: absolute_paths.then_some(self.storage_dir.as_path()),
            simplify_authors,
        };
        self.with_gateway(&CancellationToken::new(), |gw| {
            read::all_docs(gw, &self.mappings, options)
        })
    }

    /// Names of all creators, joined or split into first and last name.
    pub fn creator_names(&self, split: bool) -> Result<Vec<CreatorName>> {
        self.with_gateway(&CancellationToken::new(), |gw| read::creator_names(gw, split))
    }

    /// Names of all tables in the database.
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.with_gateway(&CancellationToken::new(), |gw| gw.table_names())
    }

    /// Column names of `table`.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        self.with_gateway(&CancellationToken::new(), |gw| gw.table_columns(table))
    }

    /// Number of objects in the connection's temp schema. Zero between calls.
    pub fn temp_object_count(&self) -> Result<usize> {
        self.with_gateway(&CancellationToken::new(), |gw| gw.temp_object_count())
    }
}
