//! Substring search with `LIKE`, without any transient index.
//!
//! These searches take a single key and match it anywhere inside a name,
//! field value or indexed word. They find fragments the tokenizer would
//! never produce as a token ("entro" in "entropy"), at the price of a scan.
//! `LIKE` folds ASCII case only. Results are distinct item ids, ascending.

use std::time::Instant;
use tracing::debug;

use crate::error::{Result, ZoteroError};
use crate::gateway::{escape_like, SchemaGateway, SqlParam};
use crate::mapping::SchemaMappings;

use super::search::{begin, item_filter, type_filter, ItemId};

/// The `LIKE` pattern matching `key` anywhere, with wildcards in `key` escaped.
fn contains_pattern(key: &str) -> Result<String> {
    if key.trim().is_empty() {
        return Err(ZoteroError::validation("key", "substring key must not be blank"));
    }
    if key.contains('\0') {
        return Err(ZoteroError::validation(
            "key",
            "substring key must not contain NUL characters",
        ));
    }
    Ok(format!("%{}%", escape_like(key)))
}

fn finished(kind: &'static str, ids: &[ItemId], start: Instant) {
    debug!(
        kind,
        results = ids.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Substring search finished"
    );
}

/// Items with a creator whose first or last name contains `key`.
pub fn search_authors_substring(
    gateway: &SchemaGateway<'_>,
    key: &str,
    item_ids: Option<&[ItemId]>,
) -> Result<Vec<ItemId>> {
    let pattern = contains_pattern(key)?;
    if !begin(gateway, item_ids)? {
        return Ok(Vec::new());
    }
    let start = Instant::now();

    let (filter, mut params) = item_filter("ic.itemID", item_ids)?;
    params.insert(0, Box::new(pattern));
    let sql = format!(
        "SELECT DISTINCT ic.itemID
         FROM creators c
         JOIN itemCreators ic ON ic.creatorID = c.creatorID
         WHERE (c.firstName LIKE ?1 ESCAPE '\\' OR c.lastName LIKE ?1 ESCAPE '\\')
           AND {filter}
         ORDER BY ic.itemID",
        filter = filter
    );

    let ids = gateway.query_ids(&sql, &params)?;
    finished("authors", &ids, start);
    Ok(ids)
}

/// Items of a type not in `ignored_types` with a field value containing `key`.
pub fn search_fields_substring<S: AsRef<str>>(
    gateway: &SchemaGateway<'_>,
    mappings: &SchemaMappings,
    key: &str,
    item_ids: Option<&[ItemId]>,
    ignored_types: &[S],
) -> Result<Vec<ItemId>> {
    let pattern = contains_pattern(key)?;
    let ignored = mappings.item_type_ids(ignored_types)?;
    if !begin(gateway, item_ids)? {
        return Ok(Vec::new());
    }
    let start = Instant::now();

    let (type_filter, type_params) = type_filter("i.itemTypeID", &ignored);
    let (filter, item_params) = item_filter("d.itemID", item_ids)?;
    let mut params: Vec<SqlParam> = vec![Box::new(pattern)];
    params.extend(type_params);
    params.extend(item_params);

    let sql = format!(
        "SELECT DISTINCT d.itemID
         FROM itemDataValues v
         JOIN itemData d ON d.valueID = v.valueID
         JOIN items i ON i.itemID = d.itemID
         WHERE v.value LIKE ? ESCAPE '\\'
           AND {type_filter} AND {filter}
         ORDER BY d.itemID",
        type_filter = type_filter,
        filter = filter
    );

    let ids = gateway.query_ids(&sql, &params)?;
    finished("fields", &ids, start);
    Ok(ids)
}

/// Parent items of attachments whose indexed words include one containing `key`.
///
/// `item_ids` may name parent items, attachments, or both. Standalone
/// attachments have no parent and are left out.
pub fn search_full_texts_substring(
    gateway: &SchemaGateway<'_>,
    key: &str,
    item_ids: Option<&[ItemId]>,
) -> Result<Vec<ItemId>> {
    let pattern = contains_pattern(key)?;
    if !begin(gateway, item_ids)? {
        return Ok(Vec::new());
    }
    let start = Instant::now();

    let (by_attachment, attachment_params) = item_filter("a.itemID", item_ids)?;
    let (by_parent, parent_params) = item_filter("a.parentItemID", item_ids)?;
    let mut params: Vec<SqlParam> = vec![Box::new(pattern)];
    params.extend(attachment_params);
    params.extend(parent_params);

    let sql = format!(
        "SELECT DISTINCT a.parentItemID
         FROM fulltextWords w
         JOIN fulltextItemWords iw ON iw.wordID = w.wordID
         JOIN itemAttachments a ON a.itemID = iw.itemID
         WHERE w.word LIKE ? ESCAPE '\\'
           AND a.parentItemID IS NOT NULL
           AND ({by_attachment} OR {by_parent})
         ORDER BY a.parentItemID",
        by_attachment = by_attachment,
        by_parent = by_parent
    );

    let ids = gateway.query_ids(&sql, &params)?;
    finished("full texts", &ids, start);
    Ok(ids)
}
