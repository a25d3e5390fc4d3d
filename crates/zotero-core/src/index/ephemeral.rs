//! Call-scoped FTS5 tables.
//!
//! An `EphemeralIndex` lives in the connection's `temp` schema for exactly one
//! search call. [`EphemeralIndex::scoped`] is the only way to get one: it
//! creates the table under a fresh name, hands it to the caller's closure, and
//! drops it again whatever the closure returned. Names never repeat, so the
//! drop-if-exists step before creation is [`sweep_residue`], which every search
//! runs first and which removes whatever an interrupted call left behind.
//!
//! ```text
//! Uncreated ─create─▶ Created ─populate/rebuild─▶ Populated ─query─▶ Queried
//!     └──────────────────── release (any state) ───────────────────▶ Dropped
//! ```

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::IndexConfig;
use crate::error::{Result, ZoteroError};
use crate::gateway::{SchemaGateway, SqlParam};

use super::query::{validate_identifier, MatchExpression};

/// Lifecycle of an ephemeral index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uncreated,
    Created,
    Populated,
    Queried,
    Dropped,
}

/// External content backing an index, exposed through a temp view.
#[derive(Debug, Clone)]
struct ExternalContent {
    source_select: String,
    rowid_column: &'static str,
}

/// Shape of an ephemeral index.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    role: &'static str,
    text_columns: Vec<&'static str>,
    content: Option<ExternalContent>,
}

impl IndexDefinition {
    /// Name of the unindexed identity column of item-keyed indexes.
    pub const IDENTITY_COLUMN: &'static str = "itemID";

    /// An index keyed by an unindexed `itemID` column, filled with [`EphemeralIndex::populate`].
    pub fn item_keyed(role: &'static str, text_columns: &[&'static str]) -> Self {
        Self {
            role,
            text_columns: text_columns.to_vec(),
            content: None,
        }
    }

    /// An index over rows produced by `source_select`, filled with [`EphemeralIndex::rebuild`].
    ///
    /// `source_select` must yield `rowid_column` and every text column. It may
    /// reference persistent tables but must not take parameters.
    pub fn external(
        role: &'static str,
        source_select: impl Into<String>,
        rowid_column: &'static str,
        text_columns: &[&'static str],
    ) -> Self {
        Self {
            role,
            text_columns: text_columns.to_vec(),
            content: Some(ExternalContent {
                source_select: source_select.into(),
                rowid_column,
            }),
        }
    }

    fn id_expr(&self) -> &'static str {
        match self.content {
            Some(_) => "rowid",
            None => Self::IDENTITY_COLUMN,
        }
    }
}

/// A transient FTS5 table scoped to one call.
pub struct EphemeralIndex<'g> {
    gateway: &'g SchemaGateway<'g>,
    definition: IndexDefinition,
    name: String,
    view_name: Option<String>,
    state: IndexState,
    release_attempted: bool,
}

impl<'g> EphemeralIndex<'g> {
    /// Run `body` against a freshly created index, then drop the index.
    ///
    /// The drop runs on every path. If `body` fails and the drop fails too, the
    /// body's error is returned with the drop failure attached. If only the drop
    /// fails, the body's result is kept unless the failure leaves the connection
    /// unusable.
    pub fn scoped<T, F>(
        gateway: &'g SchemaGateway<'g>,
        definition: IndexDefinition,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut EphemeralIndex<'g>) -> Result<T>,
    {
        let mut index = EphemeralIndex::new(gateway, definition)?;

        let outcome = index.create().and_then(|()| body(&mut index));
        let cleanup = index.release();

        settle(&index.name, outcome, cleanup)
    }

    fn new(gateway: &'g SchemaGateway<'g>, definition: IndexDefinition) -> Result<Self> {
        let name = format!(
            "{}{}_{}",
            IndexConfig::NAME_PREFIX,
            definition.role,
            Uuid::new_v4().simple()
        );
        validate_identifier(&name)?;
        for column in &definition.text_columns {
            validate_identifier(column)?;
        }

        let view_name = definition
            .content
            .as_ref()
            .map(|content| {
                validate_identifier(content.rowid_column)?;
                Ok::<_, ZoteroError>(format!("{}_src", name))
            })
            .transpose()?;

        Ok(Self {
            gateway,
            definition,
            name,
            view_name,
            state: IndexState::Uncreated,
            release_attempted: false,
        })
    }

    /// Name of the FTS5 table in the `temp` schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    fn ensure(&self, operation: &'static str, allowed: &[IndexState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ZoteroError::InvalidState {
                index: self.name.clone(),
                operation,
                state: self.state,
            })
        }
    }

    fn advance(&mut self, operation: &'static str, next: IndexState) {
        debug!(index = %self.name, from = ?self.state, to = ?next, "{}", operation);
        self.state = next;
    }

    fn teardown_sql(&self) -> String {
        let mut sql = format!("DROP TABLE IF EXISTS temp.{};", self.name);
        if let Some(view) = &self.view_name {
            sql.push_str(&format!(" DROP VIEW IF EXISTS temp.{};", view));
        }
        sql
    }

    fn create(&mut self) -> Result<()> {
        self.ensure("create", &[IndexState::Uncreated])?;

        let columns = self.definition.text_columns.join(", ");
        let sql = match (&self.definition.content, &self.view_name) {
            (Some(content), Some(view)) => {
                self.gateway.execute_batch(&format!(
                    "CREATE TEMP VIEW {} AS {}",
                    view, content.source_select
                ))?;
                format!(
                    "CREATE VIRTUAL TABLE temp.{} USING fts5({}, content='{}', content_rowid='{}', tokenize='{}')",
                    self.name,
                    columns,
                    view,
                    content.rowid_column,
                    IndexConfig::TOKENIZER
                )
            }
            _ => format!(
                "CREATE VIRTUAL TABLE temp.{} USING fts5({} UNINDEXED, {}, tokenize='{}')",
                self.name,
                IndexDefinition::IDENTITY_COLUMN,
                columns,
                IndexConfig::TOKENIZER
            ),
        };
        self.gateway.execute_batch(&sql)?;

        self.advance("create", IndexState::Created);
        Ok(())
    }

    /// Insert the rows of `select_sql` (identity first, then each text column).
    ///
    /// `select_sql` is expected to group by item so that each item appears once.
    pub fn populate(&mut self, select_sql: &str, params: &[SqlParam]) -> Result<usize> {
        if self.definition.content.is_some() {
            return Err(ZoteroError::InvalidState {
                index: self.name.clone(),
                operation: "populate an external-content index",
                state: self.state,
            });
        }
        self.ensure("populate", &[IndexState::Created])?;

        let sql = format!(
            "INSERT INTO temp.{} ({}, {}) {}",
            self.name,
            IndexDefinition::IDENTITY_COLUMN,
            self.definition.text_columns.join(", "),
            select_sql
        );
        let inserted = self.gateway.execute(&sql, params)?;
        self.advance("populate", IndexState::Populated);
        Ok(inserted)
    }

    /// Rebuild the full-text index of an external-content index from its source.
    ///
    /// A content-backed FTS5 table starts with an empty index, so this must run
    /// before the first match.
    pub fn rebuild(&mut self) -> Result<()> {
        if self.definition.content.is_none() {
            return Err(ZoteroError::InvalidState {
                index: self.name.clone(),
                operation: "rebuild an item-keyed index",
                state: self.state,
            });
        }
        self.ensure("rebuild", &[IndexState::Created])?;

        self.gateway.execute(
            &format!(
                "INSERT INTO temp.{name}({name}) VALUES('rebuild')",
                name = self.name
            ),
            &[],
        )?;
        self.advance("rebuild", IndexState::Populated);
        Ok(())
    }

    /// Evaluate `expr` and return the matching ids, most relevant first
    /// (ascending FTS5 `rank`), ties broken by ascending id.
    pub fn query(&mut self, expr: &MatchExpression) -> Result<Vec<i64>> {
        self.ensure("query", &[IndexState::Populated, IndexState::Queried])?;

        let sql = format!(
            "SELECT {id} FROM temp.{name} WHERE {name} MATCH ?1 ORDER BY rank, {id}",
            id = self.definition.id_expr(),
            name = self.name
        );

        let ids = self
            .gateway
            .query_ids(&sql, &[Box::new(expr.as_str().to_string())])?;
        self.advance("query", IndexState::Queried);
        Ok(ids)
    }

    /// A parenthesised subquery yielding `projection` for rows matching one bound parameter.
    ///
    /// The match is evaluated by whichever statement embeds the subquery, so
    /// the index counts as queried from here on.
    pub fn match_subquery(&mut self, projection: &str) -> Result<String> {
        self.ensure("query", &[IndexState::Populated, IndexState::Queried])?;
        self.advance("query", IndexState::Queried);
        Ok(format!(
            "(SELECT {projection} FROM temp.{name} WHERE {name} MATCH ?)",
            projection = projection,
            name = self.name
        ))
    }

    /// Drop the index from whatever state it is in.
    fn release(&mut self) -> Result<()> {
        self.release_attempted = true;
        self.gateway.execute_cleanup(&self.teardown_sql())?;
        debug!(index = %self.name, from = ?self.state, "Dropped ephemeral index");
        self.state = IndexState::Dropped;
        Ok(())
    }
}

impl Drop for EphemeralIndex<'_> {
    fn drop(&mut self) {
        // Only reachable when `scoped` unwinds out of the caller's closure.
        if !self.release_attempted {
            if let Err(e) = self.release() {
                warn!(index = %self.name, "Failed to drop ephemeral index while unwinding: {}", e);
            }
        }
    }
}

fn settle<T>(index: &str, outcome: Result<T>, cleanup: Result<()>) -> Result<T> {
    let cleanup = cleanup.map_err(|e| ZoteroError::CleanupFailed {
        index: index.to_string(),
        source: Box::new(e),
    });

    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(primary), Ok(())) => Err(primary),
        (Err(primary), Err(cleanup)) => Err(primary.with_cleanup(cleanup)),
        (Ok(value), Err(cleanup)) => {
            if cleanup.is_session_fatal() {
                Err(cleanup)
            } else {
                warn!("{}", cleanup);
                Ok(value)
            }
        }
    }
}

/// Drop every transient structure this crate may have left on the connection.
///
/// Returns how many objects were removed.
pub fn sweep_residue(gateway: &SchemaGateway<'_>) -> Result<usize> {
    let mut objects = gateway.temp_objects_with_prefix(IndexConfig::NAME_PREFIX)?;
    // Tables before the views that may back them.
    objects.sort_by_key(|o| o.kind != "table");

    let mut removed = 0;
    for object in &objects {
        if validate_identifier(&object.name).is_err() {
            warn!(name = %object.name, "Skipping temp object with unexpected name");
            continue;
        }
        let keyword = if object.kind == "view" { "VIEW" } else { "TABLE" };
        gateway.execute_cleanup(&format!("DROP {} IF EXISTS temp.{}", keyword, object.name))?;
        removed += 1;
    }

    if removed > 0 {
        warn!(removed, "Removed residue of an interrupted search");
    }
    Ok(removed)
}
