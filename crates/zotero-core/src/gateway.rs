//! Per-call access to the Zotero SQLite connection.
//!
//! A `SchemaGateway` borrows an already opened connection for the duration of
//! one call and carries that call's [`CancellationToken`]. Every statement goes
//! through it, so every statement is a cancellation point.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};
use tracing::trace;

use crate::cancel::CancellationToken;
use crate::config::ConnectionConfig;
use crate::error::Result;

/// A bound statement parameter.
pub type SqlParam = Box<dyn ToSql>;

/// A temporary schema object, as listed in `sqlite_temp_master`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempObject {
    pub kind: String,
    pub name: String,
}

/// Statement executor for one call.
pub struct SchemaGateway<'c> {
    conn: &'c Connection,
    cancel: CancellationToken,
}

impl<'c> SchemaGateway<'c> {
    /// Borrow `conn` for one call.
    ///
    /// While the gateway lives, a progress handler interrupts any running
    /// statement once `cancel` fires.
    pub fn new(conn: &'c Connection, cancel: CancellationToken) -> Self {
        let gateway = Self { conn, cancel };
        gateway.install_progress_handler();
        gateway
    }

    fn install_progress_handler(&self) {
        let watcher = self.cancel.clone();
        self.conn.progress_handler(
            ConnectionConfig::PROGRESS_HANDLER_OPS,
            Some(move || watcher.is_cancelled()),
        );
    }

    /// The token governing this call.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute one statement with bound parameters.
    pub fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<usize> {
        self.cancel.check()?;
        trace!(sql, params = params.len(), "execute");
        let refs = param_refs(params);
        Ok(self.conn.execute(sql, refs.as_slice())?)
    }

    /// Execute parameterless statements.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.cancel.check()?;
        trace!(sql, "execute_batch");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Execute teardown statements, ignoring the cancellation token.
    ///
    /// Cleanup must still run after the token fired, so the progress handler
    /// is lifted for the duration of the batch.
    pub fn execute_cleanup(&self, sql: &str) -> Result<()> {
        trace!(sql, "cleanup");
        self.conn.progress_handler(0, None::<fn() -> bool>);
        let result = self.conn.execute_batch(sql);
        self.install_progress_handler();
        result?;
        Ok(())
    }

    /// Run a query and map every row.
    pub fn query_map<T, F>(&self, sql: &str, params: &[SqlParam], f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.cancel.check()?;
        trace!(sql, params = params.len(), "query");
        let refs = param_refs(params);
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(refs.as_slice(), f)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Run a query whose first column is an integer id.
    pub fn query_ids(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<i64>> {
        self.query_map(sql, params, |row| row.get(0))
    }

    /// Run a query returning at most one nullable integer.
    ///
    /// Both "no row" and a NULL value come back as `None`.
    pub fn query_optional_i64(&self, sql: &str, params: &[SqlParam]) -> Result<Option<i64>> {
        self.cancel.check()?;
        trace!(sql, params = params.len(), "query_row");
        let refs = param_refs(params);
        let mut stmt = self.conn.prepare_cached(sql)?;
        let value: Option<Option<i64>> = stmt
            .query_row(refs.as_slice(), |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    /// Temporary virtual tables and views whose name starts with `prefix`.
    ///
    /// FTS5 shadow tables are not listed; they go away with their virtual table.
    pub fn temp_objects_with_prefix(&self, prefix: &str) -> Result<Vec<TempObject>> {
        let pattern = format!("{}%", escape_like(prefix));
        self.query_map(
            "SELECT type, name FROM sqlite_temp_master
             WHERE name LIKE ?1 ESCAPE '\\'
               AND (type = 'view' OR (type = 'table' AND sql LIKE 'CREATE VIRTUAL TABLE%'))
             ORDER BY name",
            &[Box::new(pattern)],
            |row| {
                Ok(TempObject {
                    kind: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
    }

    /// Count every object in the temporary schema, shadow tables included.
    pub fn temp_object_count(&self) -> Result<usize> {
        let count: Option<i64> =
            self.query_optional_i64("SELECT COUNT(*) FROM sqlite_temp_master", &[])?;
        Ok(count.unwrap_or(0) as usize)
    }

    /// Names of all persistent tables.
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.query_map(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
            &[],
            |row| row.get(0),
        )
    }

    /// Column names of a persistent table, in declaration order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        self.query_map(
            "SELECT name FROM pragma_table_info(?1) ORDER BY cid",
            &[Box::new(table.to_string())],
            |row| row.get(0),
        )
    }
}

impl Drop for SchemaGateway<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

fn param_refs(params: &[SqlParam]) -> Vec<&dyn ToSql> {
    params.iter().map(|p| p.as_ref()).collect()
}

pub(crate) fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Box a slice of ids as bound parameters.
pub fn id_params(ids: &[i64]) -> Vec<SqlParam> {
    ids.iter().map(|id| Box::new(*id) as SqlParam).collect()
}

/// A whole id list as one JSON array parameter, for `json_each(?)`.
pub fn id_list_param(ids: &[i64]) -> Result<SqlParam> {
    Ok(Box::new(serde_json::to_string(ids)?))
}
