//! FTS5 query building utilities.
//!
//! Caller tokens never reach SQL text. They are quoted into an FTS5 match
//! expression, and the expression itself is bound as a statement parameter.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Result, ZoteroError};

/// Identifiers this crate is willing to splice into SQL text.
static SQL_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// How the tokens of a search combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Every token must match (FTS5's implicit conjunction).
    #[default]
    All,
    /// Any token may match.
    Any,
}

impl MatchMode {
    fn operator(self) -> &'static str {
        match self {
            MatchMode::All => " AND ",
            MatchMode::Any => " OR ",
        }
    }
}

/// A validated, non-empty list of search tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerms {
    tokens: Vec<String>,
    mode: MatchMode,
}

impl SearchTerms {
    /// Build terms from individual tokens. Each token is matched as a phrase,
    /// except against the full-text word vocabulary, where all its words must match.
    ///
    /// Fails if there are no tokens, or if any token has nothing the FTS5
    /// tokenizer would index (blank, or punctuation only).
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();

        if tokens.is_empty() {
            return Err(ZoteroError::validation(
                "terms",
                "at least one search token is required",
            ));
        }
        if let Some(pos) = tokens.iter().position(|t| t.trim().is_empty()) {
            return Err(ZoteroError::validation(
                "terms",
                format!("token {} is empty", pos),
            ));
        }
        if tokens.iter().any(|t| t.contains('\0')) {
            return Err(ZoteroError::validation(
                "terms",
                "tokens must not contain NUL characters",
            ));
        }
        if let Some(token) = tokens.iter().find(|t| token_words(t).next().is_none()) {
            return Err(ZoteroError::validation(
                "terms",
                format!("token {:?} has no letters or digits to search for", token),
            ));
        }

        Ok(Self {
            tokens,
            mode: MatchMode::All,
        })
    }

    /// Split a single string on whitespace, one token per word.
    pub fn parse(input: &str) -> Result<Self> {
        Self::new(input.split_whitespace())
    }

    /// Accept a match on any token.
    pub fn any(mut self) -> Self {
        self.mode = MatchMode::Any;
        self
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// The match expression in this terms' own mode.
    pub fn expression(&self) -> MatchExpression {
        self.expression_with(self.mode)
    }

    /// The match expression combining tokens with `mode`.
    pub fn expression_with(&self, mode: MatchMode) -> MatchExpression {
        let phrases: Vec<String> = self.tokens.iter().map(|t| quote_fts5_phrase(t)).collect();
        MatchExpression(phrases.join(mode.operator()))
    }

    /// The match expression over single words, for indexes built from a
    /// word vocabulary where phrase order is lost.
    ///
    /// Words of one token must all match; tokens combine with this terms' mode.
    pub fn word_expression(&self) -> MatchExpression {
        let groups: Vec<String> = self
            .tokens
            .iter()
            .map(|token| {
                let words: Vec<String> = token_words(token).map(quote_fts5_phrase).collect();
                if words.len() == 1 {
                    words.join("")
                } else {
                    format!("({})", words.join(MatchMode::All.operator()))
                }
            })
            .collect();
        MatchExpression(groups.join(self.mode.operator()))
    }

    /// Disjunction of every word of every token.
    pub fn any_word_expression(&self) -> MatchExpression {
        let words: Vec<String> = self
            .tokens
            .iter()
            .flat_map(|token| token_words(token))
            .map(quote_fts5_phrase)
            .collect();
        MatchExpression(words.join(MatchMode::Any.operator()))
    }
}

/// Split a token the way the `unicode61` tokenizer does: runs of letters and digits.
fn token_words(token: &str) -> impl Iterator<Item = &str> {
    token
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// A rendered FTS5 match expression, to be bound as a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchExpression(String);

impl MatchExpression {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quote a token as an FTS5 string, so operators and punctuation inside it are literal.
///
/// - `smith` → `"smith"`
/// - `OR` → `"OR"`
/// - `say "hi"` → `"say ""hi"""`
pub fn quote_fts5_phrase(token: &str) -> String {
    format!("\"{}\"", token.replace('"', "\"\""))
}

/// Placeholder list for an `IN (...)` filter with `n` bound values.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// `column IN (...)` over a JSON array of ids bound as one parameter.
///
/// Binding the list as a single value keeps large filters clear of SQLite's
/// bound-variable limit.
pub fn json_id_filter(column: &str) -> String {
    format!("{} IN (SELECT value FROM json_each(?))", column)
}

/// Check that a generated name is safe to splice into SQL text.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if SQL_IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(ZoteroError::validation(
            "identifier",
            format!("{:?} is not a plain SQL identifier", name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_simple_token() {
        assert_eq!(quote_fts5_phrase("einstein"), "\"einstein\"");
    }

    #[test]
    fn test_quote_operators_are_literal() {
        assert_eq!(quote_fts5_phrase("OR"), "\"OR\"");
        assert_eq!(quote_fts5_phrase("NEAR(a b)"), "\"NEAR(a b)\"");
        assert_eq!(quote_fts5_phrase("x*"), "\"x*\"");
    }

    #[test]
    fn test_quote_embedded_quotes() {
        assert_eq!(quote_fts5_phrase("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_fts5_phrase("'); DROP"), "\"'); DROP\"");
    }

    #[test]
    fn test_expression_defaults_to_conjunction() {
        let terms = SearchTerms::parse("quantum  gravity").unwrap();
        assert_eq!(terms.mode(), MatchMode::All);
        assert_eq!(terms.expression().as_str(), "\"quantum\" AND \"gravity\"");
    }

    #[test]
    fn test_expression_disjunction() {
        let terms = SearchTerms::new(["black hole", "wormhole"]).unwrap().any();
        assert_eq!(
            terms.expression().as_str(),
            "\"black hole\" OR \"wormhole\""
        );
        assert_eq!(
            terms.expression_with(MatchMode::All).as_str(),
            "\"black hole\" AND \"wormhole\""
        );
    }

    #[test]
    fn test_word_expression_splits_tokens() {
        let terms = SearchTerms::new(["entropy production", "quark"]).unwrap();
        assert_eq!(
            terms.word_expression().as_str(),
            "(\"entropy\" AND \"production\") AND \"quark\""
        );
        assert_eq!(
            terms.any().word_expression().as_str(),
            "(\"entropy\" AND \"production\") OR \"quark\""
        );

        let terms = SearchTerms::new(["non-equilibrium", "OR"]).unwrap();
        assert_eq!(
            terms.any_word_expression().as_str(),
            "\"non\" OR \"equilibrium\" OR \"OR\""
        );
    }

    #[test]
    fn test_punctuation_only_tokens_rejected() {
        for input in ["Smith -", "-", "&", "***", "entropy \"\""] {
            let err = SearchTerms::parse(input).unwrap_err();
            assert!(matches!(err, ZoteroError::Validation { .. }), "{input}");
        }
        assert!(SearchTerms::new(["x*", "'); DROP"]).is_ok());
        assert!(SearchTerms::parse("García").is_ok());
    }

    #[test]
    fn test_json_id_filter() {
        assert_eq!(
            json_id_filter("d.itemID"),
            "d.itemID IN (SELECT value FROM json_each(?))"
        );
    }

    #[test]
    fn test_empty_terms_rejected() {
        assert!(SearchTerms::parse("").is_err());
        assert!(SearchTerms::parse("   ").is_err());
        assert!(SearchTerms::new(Vec::<String>::new()).is_err());
        assert!(SearchTerms::new(["ok", " "]).is_err());
        assert!(SearchTerms::new(["nul\0byte"]).is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("zs_authors_0af3").is_ok());
        assert!(validate_identifier("zs authors").is_err());
        assert!(validate_identifier("x\"; DROP TABLE items; --").is_err());
        assert!(validate_identifier("1abc").is_err());
    }
}
