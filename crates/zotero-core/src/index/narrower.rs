//! Vocabulary narrowing for full-text search.
//!
//! `fulltextItemWords` has one row per distinct word per attachment and is far
//! larger than the `fulltextWords` vocabulary. Matching the vocabulary first
//! and joining only the surviving word ids keeps the second stage small.

use crate::error::Result;
use crate::gateway::{SchemaGateway, SqlParam};

use super::ephemeral::{EphemeralIndex, IndexDefinition};
use super::query::{MatchExpression, SearchTerms};

const VOCABULARY_SOURCE: &str = "SELECT wordID, word FROM main.fulltextWords";

/// Vocabulary rows matching any word of any search token, usable inside one statement.
#[derive(Debug)]
pub struct NarrowedWords {
    subquery: String,
    expression: MatchExpression,
}

impl NarrowedWords {
    /// Parenthesised subquery with columns `wordID` and `word`. Takes one bound parameter.
    pub fn subquery(&self) -> &str {
        &self.subquery
    }

    /// The parameter to bind at the subquery's position.
    pub fn param(&self) -> SqlParam {
        Box::new(self.expression.as_str().to_string())
    }
}

/// Run `body` with the vocabulary narrowed to words matching any word of `terms`.
///
/// The vocabulary holds single words, so a token such as `"entropy production"`
/// contributes both of its words here.
///
/// The vocabulary index is content-backed by `fulltextWords`, rebuilt before
/// use, and dropped when `body` returns.
pub fn narrow_vocabulary<'g, T, F>(
    gateway: &'g SchemaGateway<'g>,
    terms: &SearchTerms,
    body: F,
) -> Result<T>
where
    F: FnOnce(&NarrowedWords) -> Result<T>,
{
    let definition = IndexDefinition::external("words", VOCABULARY_SOURCE, "wordID", &["word"]);

    EphemeralIndex::scoped(gateway, definition, |index| {
        index.rebuild()?;
        let narrowed = NarrowedWords {
            subquery: index.match_subquery("rowid AS wordID, word")?,
            expression: terms.any_word_expression(),
        };
        body(&narrowed)
    })
}
