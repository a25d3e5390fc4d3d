//! Symbolic name ↔ integer id lookups for a Zotero database.
//!
//! Zotero stores item types, fields and creator types as integer ids. The
//! mappings are loaded once when a database is opened and never change for
//! the lifetime of that handle.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Result, ZoteroError};
use crate::gateway::SchemaGateway;

/// A bidirectional name ↔ id map for one vocabulary table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NameIdMap {
    #[serde(skip)]
    kind: &'static str,
    by_name: HashMap<String, i64>,
    #[serde(skip)]
    by_id: HashMap<i64, String>,
}

impl NameIdMap {
    /// Build a map from `(name, id)` pairs. `kind` names the vocabulary in errors.
    pub fn from_pairs(kind: &'static str, pairs: impl IntoIterator<Item = (String, i64)>) -> Self {
        let mut map = Self {
            kind,
            ..Self::default()
        };
        for (name, id) in pairs {
            map.by_id.insert(id, name.clone());
            map.by_name.insert(name, id);
        }
        map
    }

    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Like [`id_of`](Self::id_of), but a miss is an error.
    pub fn require_id(&self, name: &str) -> Result<i64> {
        self.id_of(name).ok_or_else(|| ZoteroError::UnknownName {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.by_name.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// All vocabularies a search or metadata read may need.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMappings {
    pub item_types: NameIdMap,
    pub fields: NameIdMap,
    pub creator_types: NameIdMap,
}

impl SchemaMappings {
    /// Load every vocabulary from the database.
    pub fn load(gateway: &SchemaGateway<'_>) -> Result<Self> {
        let item_types = load_pairs(
            gateway,
            "item type",
            "SELECT typeName, itemTypeID FROM itemTypes",
        )?;
        let fields = load_pairs(
            gateway,
            "field",
            "SELECT fieldName, fieldID FROM fieldsCombined",
        )?;
        let creator_types = load_pairs(
            gateway,
            "creator type",
            "SELECT creatorType, creatorTypeID FROM creatorTypes",
        )?;

        debug!(
            item_types = item_types.len(),
            fields = fields.len(),
            creator_types = creator_types.len(),
            "Loaded schema mappings"
        );

        Ok(Self {
            item_types,
            fields,
            creator_types,
        })
    }

    /// Resolve item type names to ids, failing on the first unknown name.
    pub fn item_type_ids<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<i64>> {
        names
            .iter()
            .map(|n| self.item_types.require_id(n.as_ref()))
            .collect()
    }

    /// Resolve field names to ids, failing on the first unknown name.
    pub fn field_ids<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<i64>> {
        names
            .iter()
            .map(|n| self.fields.require_id(n.as_ref()))
            .collect()
    }
}

fn load_pairs(gateway: &SchemaGateway<'_>, kind: &'static str, sql: &str) -> Result<NameIdMap> {
    let pairs = gateway.query_map(sql, &[], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(NameIdMap::from_pairs(kind, pairs))
}
