//! Single-valued document columns, one query each.

use regex::Regex;
use rusqlite::types::Value;
use std::sync::LazyLock;

use crate::error::Result;
use crate::gateway::{id_params, SchemaGateway};
use crate::index::{placeholders, ItemId};
use crate::mapping::SchemaMappings;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("valid year regex"));

/// Fields whose value is shown as a document's publication venue.
const PUBLICATION_FIELDS: [&str; 9] = [
    "publicationTitle",
    "encyclopediaTitle",
    "dictionaryTitle",
    "websiteTitle",
    "forumTitle",
    "blogTitle",
    "proceedingsTitle",
    "bookTitle",
    "programTitle",
];

/// A per-document column read with one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocColumn {
    DocType,
    Title,
    Publication,
    Year,
    DateAdded,
}

impl DocColumn {
    pub const ALL: [DocColumn; 5] = [
        DocColumn::DocType,
        DocColumn::Title,
        DocColumn::Publication,
        DocColumn::Year,
        DocColumn::DateAdded,
    ];

    /// Human readable column label.
    pub fn label(self) -> &'static str {
        match self {
            DocColumn::DocType => "document type",
            DocColumn::Title => "title",
            DocColumn::Publication => "publication title",
            DocColumn::Year => "year",
            DocColumn::DateAdded => "time added",
        }
    }

    fn field_names(self) -> &'static [&'static str] {
        match self {
            DocColumn::DocType | DocColumn::DateAdded => &[],
            DocColumn::Title => &["title"],
            DocColumn::Publication => &PUBLICATION_FIELDS,
            DocColumn::Year => &["date"],
        }
    }

    fn sql(self, excluded: usize, fields: usize) -> String {
        let excluded = placeholders(excluded);
        match self {
            DocColumn::DocType => format!(
                "SELECT items.itemID, itemTypes.typeName
                 FROM items
                 JOIN itemTypes ON itemTypes.itemTypeID = items.itemTypeID
                 WHERE items.itemTypeID NOT IN ({excluded})
                 ORDER BY items.itemID"
            ),
            DocColumn::DateAdded => format!(
                "SELECT itemID, dateAdded FROM items
                 WHERE itemTypeID NOT IN ({excluded})
                 ORDER BY itemID"
            ),
            DocColumn::Title | DocColumn::Publication | DocColumn::Year => format!(
                "SELECT items.itemID, itemDataValues.value
                 FROM items
                 JOIN itemData ON itemData.itemID = items.itemID
                 JOIN itemDataValues ON itemDataValues.valueID = itemData.valueID
                 WHERE items.itemTypeID NOT IN ({excluded})
                   AND itemData.fieldID IN ({fields})
                 ORDER BY items.itemID, itemData.fieldID",
                fields = placeholders(fields)
            ),
        }
    }

    fn finish(self, raw: String) -> String {
        match self {
            DocColumn::Year => extract_year(&raw).unwrap_or(raw),
            _ => raw,
        }
    }

    /// Read `(item, value)` pairs for every document whose type is not in
    /// `excluded_types`, ordered by item id.
    ///
    /// Publication fields absent from this database's schema version are
    /// skipped; the title and date fields must exist.
    pub fn fetch(
        self,
        gateway: &SchemaGateway<'_>,
        mappings: &SchemaMappings,
        excluded_types: &[i64],
    ) -> Result<Vec<(ItemId, String)>> {
        let field_ids: Vec<i64> = match self {
            DocColumn::Publication => self
                .field_names()
                .iter()
                .filter_map(|name| mappings.fields.id_of(name))
                .collect(),
            _ => mappings.field_ids(self.field_names())?,
        };
        if !self.field_names().is_empty() && field_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = id_params(excluded_types);
        params.extend(id_params(&field_ids));

        let rows = gateway.query_map(
            &self.sql(excluded_types.len(), field_ids.len()),
            &params,
            |row| Ok((row.get::<_, ItemId>(0)?, row.get::<_, Value>(1)?)),
        )?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, value)| value_text(value).map(|text| (id, self.finish(text))))
            .collect())
    }
}

/// The first four-digit run in a Zotero date string.
pub fn extract_year(date: &str) -> Option<String> {
    YEAR_RE.find(date).map(|m| m.as_str().to_string())
}

/// Zotero stores field values with SQLite's dynamic typing.
fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Blob(_) => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
    }
}
