//! Full-text search over authors, field values and attachment texts.
//!
//! Each search builds its own ephemeral FTS5 table from an aggregation over
//! the Zotero schema, matches the caller's terms against it and drops it
//! before returning. Results are item ids, most relevant first, without
//! duplicates.

use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::gateway::{id_list_param, id_params, SchemaGateway, SqlParam};
use crate::mapping::SchemaMappings;

use super::ephemeral::{sweep_residue, EphemeralIndex, IndexDefinition};
use super::narrower::{narrow_vocabulary, NarrowedWords};
use super::query::{json_id_filter, placeholders, SearchTerms};

/// Zotero's integer item identifier.
pub type ItemId = i64;

/// Per-call search options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Restrict candidates to these items. `Some(vec![])` matches nothing.
    pub item_ids: Option<Vec<ItemId>>,
    /// Item type names excluded from field search.
    pub ignored_types: Vec<String>,
    /// Cancels the call between, or in the middle of, statements.
    pub cancel: CancellationToken,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            item_ids: None,
            ignored_types: SearchConfig::DEFAULT_IGNORED_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            cancel: CancellationToken::new(),
        }
    }
}

impl SearchOptions {
    pub fn with_item_ids(mut self, item_ids: impl Into<Vec<ItemId>>) -> Self {
        self.item_ids = Some(item_ids.into());
        self
    }

    pub fn with_ignored_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The three searchable sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchKind {
    Authors,
    Fields,
    FullTexts,
}

impl SearchKind {
    fn definition(self) -> IndexDefinition {
        match self {
            SearchKind::Authors => {
                IndexDefinition::item_keyed("authors", &["firstName", "lastName"])
            }
            SearchKind::Fields => IndexDefinition::item_keyed("fields", &["fieldValues"]),
            SearchKind::FullTexts => IndexDefinition::item_keyed("fulltext", &["words"]),
        }
    }
}

/// `column IN (SELECT value FROM json_each(?))` for a present filter, `1` otherwise.
pub(crate) fn item_filter(
    column: &str,
    item_ids: Option<&[ItemId]>,
) -> Result<(String, Vec<SqlParam>)> {
    Ok(match item_ids {
        Some(ids) => (json_id_filter(column), vec![id_list_param(ids)?]),
        None => ("1".to_string(), Vec::new()),
    })
}

/// `itemTypeID NOT IN (...)` over the ids of `ignored`, `1` when none are ignored.
pub(crate) fn type_filter(column: &str, ignored: &[i64]) -> (String, Vec<SqlParam>) {
    if ignored.is_empty() {
        ("1".to_string(), Vec::new())
    } else {
        (
            format!("{} NOT IN ({})", column, placeholders(ignored.len())),
            id_params(ignored),
        )
    }
}

fn unique_ids(ids: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Shared entry: an empty item filter answers the call with no results,
/// anything else clears residue of earlier calls first.
pub(crate) fn begin(gateway: &SchemaGateway<'_>, item_ids: Option<&[ItemId]>) -> Result<bool> {
    if matches!(item_ids, Some(ids) if ids.is_empty()) {
        return Ok(false);
    }
    sweep_residue(gateway)?;
    Ok(true)
}

/// Search creators' first and last names.
///
/// Each token is matched as a phrase; by default every token must match the
/// same item (possibly in different creators).
pub fn search_authors<'g>(
    gateway: &'g SchemaGateway<'g>,
    terms: &SearchTerms,
    item_ids: Option<&[ItemId]>,
) -> Result<Vec<ItemId>> {
    if !begin(gateway, item_ids)? {
        return Ok(Vec::new());
    }
    let start = Instant::now();

    let (filter, params) = item_filter("itemID", item_ids)?;
    let select = format!(
        "SELECT ic.itemID, GROUP_CONCAT(c.firstName, ' '), GROUP_CONCAT(c.lastName, ' ')
         FROM (
             SELECT itemID, creatorID, orderIndex FROM itemCreators
             WHERE {filter}
             ORDER BY itemID, orderIndex
         ) ic
         JOIN creators c ON c.creatorID = ic.creatorID
         GROUP BY ic.itemID",
        filter = filter
    );

    let ids = EphemeralIndex::scoped(gateway, SearchKind::Authors.definition(), |index| {
        index.populate(&select, &params)?;
        let hits = index.query(&terms.expression())?;
        Ok(unique_ids(&hits))
    })?;

    debug!(
        kind = ?SearchKind::Authors,
        results = ids.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Search finished"
    );
    Ok(ids)
}

/// Search every field value of items whose type is not in `ignored_types`.
pub fn search_fields<'g, S: AsRef<str>>(
    gateway: &'g SchemaGateway<'g>,
    mappings: &SchemaMappings,
    terms: &SearchTerms,
    item_ids: Option<&[ItemId]>,
    ignored_types: &[S],
) -> Result<Vec<ItemId>> {
    let ignored = mappings.item_type_ids(ignored_types)?;
    if !begin(gateway, item_ids)? {
        return Ok(Vec::new());
    }
    let start = Instant::now();

    let (type_filter, mut params) = type_filter("i.itemTypeID", &ignored);
    let (filter, item_params) = item_filter("d.itemID", item_ids)?;
    params.extend(item_params);

    let select = format!(
        "SELECT d.itemID, GROUP_CONCAT(v.value, ' ')
         FROM itemData d
         JOIN itemDataValues v ON v.valueID = d.valueID
         JOIN items i ON i.itemID = d.itemID
         WHERE {type_filter} AND {filter}
         GROUP BY d.itemID",
        type_filter = type_filter,
        filter = filter
    );

    let ids = EphemeralIndex::scoped(gateway, SearchKind::Fields.definition(), |index| {
        index.populate(&select, &params)?;
        let hits = index.query(&terms.expression())?;
        Ok(unique_ids(&hits))
    })?;

    debug!(
        kind = ?SearchKind::Fields,
        results = ids.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Search finished"
    );
    Ok(ids)
}

/// Search the indexed full texts of attachments, returning their parent items.
///
/// Zotero stores single words per attachment, so a token spanning several
/// words matches attachments containing all of them, in any order.
/// `item_ids` may name parent items, attachments, or both.
pub fn search_full_texts<'g>(
    gateway: &'g SchemaGateway<'g>,
    terms: &SearchTerms,
    item_ids: Option<&[ItemId]>,
) -> Result<Vec<ItemId>> {
    if !begin(gateway, item_ids)? {
        return Ok(Vec::new());
    }
    let start = Instant::now();

    let (source, params) = match item_ids {
        None => ("fulltextItemWords".to_string(), Vec::new()),
        Some(ids) => (
            format!(
                "(SELECT itemID, wordID FROM fulltextItemWords
                  WHERE itemID IN (
                      SELECT itemID FROM itemAttachments
                      WHERE {by_attachment} OR {by_parent}
                  ))",
                by_attachment = json_id_filter("itemID"),
                by_parent = json_id_filter("parentItemID")
            ),
            vec![id_list_param(ids)?, id_list_param(ids)?],
        ),
    };

    let ids = narrow_vocabulary(gateway, terms, |narrowed| {
        match_attachment_words(gateway, terms, &source, params, narrowed)
    })?;

    debug!(
        kind = ?SearchKind::FullTexts,
        results = ids.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Search finished"
    );
    Ok(ids)
}

/// Second stage of full-text search: index each attachment's narrowed words
/// and match the terms word by word.
///
/// `source` yields `itemID, wordID` rows and takes `params`; the narrowed
/// vocabulary's parameter is bound after them.
fn match_attachment_words<'g>(
    gateway: &'g SchemaGateway<'g>,
    terms: &SearchTerms,
    source: &str,
    mut params: Vec<SqlParam>,
    narrowed: &NarrowedWords,
) -> Result<Vec<ItemId>> {
    params.push(narrowed.param());
    let select = format!(
        "SELECT w.itemID, GROUP_CONCAT(n.word, ' ')
         FROM {source} w
         JOIN {words} n ON n.wordID = w.wordID
         GROUP BY w.itemID",
        source = source,
        words = narrowed.subquery()
    );

    EphemeralIndex::scoped(gateway, SearchKind::FullTexts.definition(), |index| {
        index.populate(&select, &params)?;
        let attachments = index.query(&terms.word_expression())?;
        attachments_to_parents(gateway, &attachments)
    })
}

/// Replace attachment ids by their parent item ids, keeping first occurrences.
///
/// Standalone attachments have no parent document and are left out.
fn attachments_to_parents(
    gateway: &SchemaGateway<'_>,
    attachments: &[ItemId],
) -> Result<Vec<ItemId>> {
    let mut seen = HashSet::new();
    let mut parents = Vec::with_capacity(attachments.len());

    for &attachment in attachments {
        let parent = gateway.query_optional_i64(
            "SELECT parentItemID FROM itemAttachments WHERE itemID = ?1",
            &id_params(&[attachment]),
        )?;
        match parent {
            Some(parent) => {
                if seen.insert(parent) {
                    parents.push(parent);
                }
            }
            None => debug!(attachment, "Skipping match on a standalone attachment"),
        }
    }

    Ok(parents)
}
