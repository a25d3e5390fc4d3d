//! Creator names and per-document author lists.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::gateway::{id_params, SchemaGateway};
use crate::index::{placeholders, ItemId};

/// One creator's name, either joined or split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CreatorName {
    Full(String),
    Split {
        #[serde(rename = "firstName")]
        first_name: String,
        #[serde(rename = "lastName")]
        last_name: String,
    },
}

/// Names of every creator in the database, in creator id order.
///
/// With `split` the first and last names are kept apart, otherwise they are
/// joined with a space and trimmed.
pub fn creator_names(gateway: &SchemaGateway<'_>, split: bool) -> Result<Vec<CreatorName>> {
    let rows = gateway.query_map(
        "SELECT IFNULL(firstName, ''), IFNULL(lastName, '') FROM creators ORDER BY creatorID",
        &[],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;

    Ok(rows
        .into_iter()
        .map(|(first_name, last_name)| {
            if split {
                CreatorName::Split {
                    first_name,
                    last_name,
                }
            } else {
                CreatorName::Full(format!("{} {}", first_name, last_name).trim().to_string())
            }
        })
        .collect())
}

/// Last names of each document's creators of type `author_type`, in the
/// order Zotero displays them.
pub fn doc_authors(
    gateway: &SchemaGateway<'_>,
    excluded_types: &[i64],
    author_type: i64,
) -> Result<BTreeMap<ItemId, Vec<String>>> {
    let sql = format!(
        "SELECT ic.itemID, c.lastName
         FROM itemCreators ic
         JOIN items i ON i.itemID = ic.itemID
         JOIN creators c ON c.creatorID = ic.creatorID
         WHERE i.itemTypeID NOT IN ({}) AND ic.creatorTypeID = ?
         ORDER BY ic.itemID, ic.orderIndex",
        placeholders(excluded_types.len())
    );
    let mut params = id_params(excluded_types);
    params.push(Box::new(author_type));

    let rows = gateway.query_map(&sql, &params, |row| {
        Ok((row.get::<_, ItemId>(0)?, row.get::<_, Option<String>>(1)?))
    })?;

    let mut authors: BTreeMap<ItemId, Vec<String>> = BTreeMap::new();
    for (id, last_name) in rows {
        authors
            .entry(id)
            .or_default()
            .push(last_name.unwrap_or_default());
    }
    Ok(authors)
}

/// Short author label as used in citations.
///
/// ```
/// use zotero_core::read::format_author_label;
///
/// assert_eq!(format_author_label(&["Lee".to_string(), "Smith".to_string()]), "Lee and Smith");
/// ```
pub fn format_author_label<S: AsRef<str>>(last_names: &[S]) -> String {
    match last_names {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [first, second] => format!("{} and {}", first.as_ref(), second.as_ref()),
        [first, ..] => format!("{} et al.", first.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use rusqlite::Connection;

    fn creators_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (itemID INTEGER PRIMARY KEY, itemTypeID INT);
             CREATE TABLE creators (creatorID INTEGER PRIMARY KEY, firstName TEXT, lastName TEXT);
             CREATE TABLE itemCreators (itemID INT, creatorID INT, creatorTypeID INT, orderIndex INT);
             INSERT INTO items VALUES (1, 2), (2, 2), (3, 28);
             INSERT INTO creators VALUES (1, 'Ann', 'Smith'), (2, '', 'Doe'), (3, 'Bo', 'Lee');
             INSERT INTO itemCreators VALUES
                (1, 1, 8, 1), (1, 2, 8, 2), (1, 3, 8, 0),
                (2, 2, 10, 0),
                (3, 1, 8, 0);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_doc_authors_ordered() {
        let conn = creators_conn();
        let gw = SchemaGateway::new(&conn, CancellationToken::new());

        let authors = doc_authors(&gw, &[28], 8).unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[&1], vec!["Lee", "Smith", "Doe"]);
    }

    #[test]
    fn test_creator_names() {
        let conn = creators_conn();
        let gw = SchemaGateway::new(&conn, CancellationToken::new());

        let full = creator_names(&gw, false).unwrap();
        assert_eq!(full[0], CreatorName::Full("Ann Smith".into()));
        assert_eq!(full[1], CreatorName::Full("Doe".into()));

        let split = creator_names(&gw, true).unwrap();
        assert_eq!(
            split[2],
            CreatorName::Split {
                first_name: "Bo".into(),
                last_name: "Lee".into()
            }
        );
    }

    #[test]
    fn test_format_author_label() {
        let none: [&str; 0] = [];
        assert_eq!(format_author_label(&none), "");
        assert_eq!(format_author_label(&["Smith"]), "Smith");
        assert_eq!(format_author_label(&["Smith", "Doe"]), "Smith and Doe");
        assert_eq!(format_author_label(&["Smith", "Doe", "Lee"]), "Smith et al.");
    }
}
