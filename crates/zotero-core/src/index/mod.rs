//! Ephemeral full-text indexing over a Zotero database.
//!
//! Zotero's schema has no cross-entity full-text index. Every search here
//! builds a throw-away FTS5 table in the connection's `temp` schema, queries
//! it and drops it before returning:
//!
//! - `query`: search terms, match expressions and SQL fragment helpers
//! - `ephemeral`: the lifecycle of one transient FTS5 table
//! - `narrower`: vocabulary pre-filtering for attachment full texts
//! - `search`: the author, field and full-text searches
//! - `substring`: `LIKE` searches for a single fragment, with no index at all

mod ephemeral;
mod narrower;
mod query;
mod search;
mod substring;

pub use ephemeral::{sweep_residue, EphemeralIndex, IndexDefinition, IndexState};
pub use narrower::{narrow_vocabulary, NarrowedWords};
pub use query::{
    json_id_filter, placeholders, quote_fts5_phrase, validate_identifier, MatchExpression,
    MatchMode, SearchTerms,
};
pub use search::{search_authors, search_fields, search_full_texts, ItemId, SearchOptions};
pub use substring::{
    search_authors_substring, search_fields_substring, search_full_texts_substring,
};
