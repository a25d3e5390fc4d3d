//! Document overview: one row per item that is not an attachment or note.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{PathsConfig, SearchConfig};
use crate::error::Result;
use crate::gateway::SchemaGateway;
use crate::index::ItemId;
use crate::mapping::SchemaMappings;

use super::authors::{doc_authors, format_author_label};
use super::columns::DocColumn;

/// Authors of a document, as a list or collapsed to a citation label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DocAuthors {
    Label(String),
    Names(Vec<String>),
}

impl Default for DocAuthors {
    fn default() -> Self {
        DocAuthors::Names(Vec::new())
    }
}

/// Brief information about one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocSummary {
    pub item_id: ItemId,
    pub authors: DocAuthors,
    pub doc_type: String,
    pub title: String,
    pub publication: String,
    pub year: String,
    pub date_added: String,
    pub attachments: Vec<PathBuf>,
}

impl DocSummary {
    fn column_mut(&mut self, column: DocColumn) -> &mut String {
        match column {
            DocColumn::DocType => &mut self.doc_type,
            DocColumn::Title => &mut self.title,
            DocColumn::Publication => &mut self.publication,
            DocColumn::Year => &mut self.year,
            DocColumn::DateAdded => &mut self.date_added,
        }
    }
}

/// Options for [`all_docs`].
#[derive(Debug, Clone, Copy)]
pub struct DocListOptions<'a> {
    /// Directory prepended to attachment paths. `None` leaves them relative
    /// to the storage directory.
    pub storage_dir: Option<&'a Path>,
    /// Collapse author lists with [`format_author_label`].
    pub simplify_authors: bool,
}

/// Stored file paths of every attachment, grouped by parent document.
///
/// `storage:`-relative paths are placed under `<prefix>/<attachment key>/`.
/// Attachments without a parent or without a path are left out.
pub fn doc_attachments(
    gateway: &SchemaGateway<'_>,
    mappings: &SchemaMappings,
    prefix: Option<&Path>,
) -> Result<BTreeMap<ItemId, Vec<PathBuf>>> {
    let attachment_type = mappings.item_types.require_id("attachment")?;
    let rows = gateway.query_map(
        "SELECT a.parentItemID, i.key, a.path
         FROM items i
         JOIN itemAttachments a ON a.itemID = i.itemID
         WHERE i.itemTypeID = ?1 AND a.parentItemID IS NOT NULL AND a.path IS NOT NULL
         ORDER BY a.parentItemID, i.itemID",
        &[Box::new(attachment_type)],
        |row| {
            Ok((
                row.get::<_, ItemId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )?;

    let prefix = prefix.unwrap_or_else(|| Path::new(""));
    let mut attachments: BTreeMap<ItemId, Vec<PathBuf>> = BTreeMap::new();
    for (parent, key, path) in rows {
        attachments
            .entry(parent)
            .or_default()
            .push(attachment_path(prefix, &key, &path));
    }
    Ok(attachments)
}

fn attachment_path(prefix: &Path, key: &str, stored: &str) -> PathBuf {
    let relative = stored
        .strip_prefix(PathsConfig::STORAGE_PATH_PREFIX)
        .unwrap_or(stored);
    prefix.join(key).join(relative)
}

/// Every document with its type, title, publication, year, date added,
/// authors and attachment paths. Missing values are empty.
pub fn all_docs(
    gateway: &SchemaGateway<'_>,
    mappings: &SchemaMappings,
    options: DocListOptions<'_>,
) -> Result<Vec<DocSummary>> {
    let excluded = mappings.item_type_ids(&SearchConfig::DEFAULT_IGNORED_TYPES)?;
    let author_type = mappings.creator_types.require_id("author")?;

    let mut columns = Vec::with_capacity(DocColumn::ALL.len());
    for column in DocColumn::ALL {
        columns.push((column, column.fetch(gateway, mappings, &excluded)?));
    }
    let authors = doc_authors(gateway, &excluded, author_type)?;
    let attachments = doc_attachments(gateway, mappings, options.storage_dir)?;

    let ids: BTreeSet<ItemId> = columns
        .iter()
        .flat_map(|(_, rows)| rows.iter().map(|(id, _)| *id))
        .chain(authors.keys().copied())
        .chain(attachments.keys().copied())
        .collect();

    let mut docs: BTreeMap<ItemId, DocSummary> = ids
        .into_iter()
        .map(|id| {
            (
                id,
                DocSummary {
                    item_id: id,
                    ..DocSummary::default()
                },
            )
        })
        .collect();

    for (column, rows) in columns {
        for (id, value) in rows {
            if let Some(doc) = docs.get_mut(&id) {
                let slot = doc.column_mut(column);
                // Several publication fields may be set; the first one wins.
                if slot.is_empty() {
                    *slot = value;
                }
            }
        }
    }

    for doc in docs.values_mut() {
        let names = authors.get(&doc.item_id).cloned().unwrap_or_default();
        doc.authors = if options.simplify_authors {
            DocAuthors::Label(format_author_label(&names))
        } else {
            DocAuthors::Names(names)
        };
        if let Some(paths) = attachments.get(&doc.item_id) {
            doc.attachments = paths.clone();
        }
    }

    debug!(documents = docs.len(), "Read document overview");
    Ok(docs.into_values().collect())
}
