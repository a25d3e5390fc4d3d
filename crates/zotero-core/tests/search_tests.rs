//! Integration tests for the search calls of `ZoteroDatabase`.
//!
//! Every test also checks that no transient structure survives the call.

mod common;

use common::{fixture, fixture_with, sorted};
use std::time::Duration;
use zotero_core::{
    CancelReason, CancellationToken, ErrorKind, SearchOptions, SearchTerms, ZoteroError,
};

fn terms(input: &str) -> SearchTerms {
    SearchTerms::parse(input).unwrap()
}

#[test]
fn test_author_search_matches_first_and_last_names() {
    let fx = fixture();
    let options = SearchOptions::default();

    assert_eq!(sorted(fx.db.search_authors(&terms("Smith"), &options).unwrap()), vec![1, 2]);
    assert_eq!(fx.db.search_authors(&terms("John"), &options).unwrap().len(), 2);
    // Editors are creators too.
    assert_eq!(sorted(fx.db.search_authors(&terms("Lee"), &options).unwrap()), vec![1, 42]);
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_author_search_combines_tokens() {
    let fx = fixture();
    let options = SearchOptions::default();

    assert_eq!(fx.db.search_authors(&terms("Smith Doe"), &options).unwrap(), vec![1]);
    assert_eq!(
        sorted(fx.db.search_authors(&terms("Smith Doe").any(), &options).unwrap()),
        vec![1, 2, 3]
    );
}

#[test]
fn test_author_search_folds_diacritics() {
    let fx = fixture();
    let found = fx
        .db
        .search_authors(&terms("garcia"), &SearchOptions::default())
        .unwrap();
    assert_eq!(found, vec![3]);
}

#[test]
fn test_field_search_skips_ignored_types() {
    let fx = fixture();

    let found = fx
        .db
        .search_fields(&terms("entropy"), &SearchOptions::default())
        .unwrap();
    assert_eq!(found, vec![1]);

    let none_ignored = SearchOptions::default().with_ignored_types(Vec::<String>::new());
    let found = fx.db.search_fields(&terms("entropy"), &none_ignored).unwrap();
    assert_eq!(sorted(found), vec![1, 4]);
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_field_search_covers_every_field() {
    let fx = fixture();
    let found = fx
        .db
        .search_fields(&terms("ensembles"), &SearchOptions::default())
        .unwrap();
    assert_eq!(found, vec![42]);
}

#[test]
fn test_field_search_unknown_type() {
    let fx = fixture();
    let options = SearchOptions::default().with_ignored_types(["podcast"]);

    let err = fx.db.search_fields(&terms("entropy"), &options).unwrap_err();
    assert!(matches!(
        err,
        ZoteroError::UnknownName { kind: "item type", ref name } if name == "podcast"
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_full_text_search_returns_parents() {
    let fx = fixture();
    let options = SearchOptions::default();

    assert_eq!(fx.db.search_full_texts(&terms("boltzmann"), &options).unwrap(), vec![42]);
    assert_eq!(
        fx.db.search_full_texts(&terms("entropy production"), &options).unwrap(),
        vec![1]
    );
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_full_text_search_collapses_parents_and_skips_standalone() {
    let fx = fixture();
    let found = fx
        .db
        .search_full_texts(&terms("entropy"), &SearchOptions::default())
        .unwrap();

    // 100 and 103 share parent 42; 102 has no parent.
    assert_eq!(found.len(), 2);
    assert_eq!(sorted(found), vec![1, 42]);
}

#[test]
fn test_full_text_filter_accepts_parents_and_attachments() {
    let fx = fixture();

    let by_parent = SearchOptions::default().with_item_ids(vec![42]);
    assert_eq!(fx.db.search_full_texts(&terms("entropy"), &by_parent).unwrap(), vec![42]);

    let by_attachment = SearchOptions::default().with_item_ids(vec![101]);
    assert_eq!(fx.db.search_full_texts(&terms("entropy"), &by_attachment).unwrap(), vec![1]);
}

#[test]
fn test_operator_words_are_searched_literally() {
    let fx = fixture();
    let found = fx
        .db
        .search_full_texts(&terms("OR"), &SearchOptions::default())
        .unwrap();
    assert_eq!(found, vec![1]);
}

#[test]
fn test_filtered_results_are_subsets() {
    let fx = fixture();
    let all = SearchOptions::default();
    let subset = SearchOptions::default().with_item_ids(vec![1, 3, 100]);

    let full = fx.db.search_authors(&terms("Doe"), &all).unwrap();
    for id in fx.db.search_authors(&terms("Doe"), &subset).unwrap() {
        assert!(full.contains(&id));
        assert!([1, 3].contains(&id));
    }

    let full = fx.db.search_fields(&terms("quark"), &all).unwrap();
    for id in fx.db.search_fields(&terms("quark"), &subset).unwrap() {
        assert!(full.contains(&id));
    }

    let full = fx.db.search_full_texts(&terms("entropy"), &all).unwrap();
    let filtered = fx.db.search_full_texts(&terms("entropy"), &subset).unwrap();
    assert!(filtered.iter().all(|id| full.contains(id)));
    assert_eq!(sorted(filtered), vec![1, 42]);
}

#[test]
fn test_searches_are_deterministic() {
    let fx = fixture();
    let options = SearchOptions::default();

    let first = fx.db.search_full_texts(&terms("entropy"), &options).unwrap();
    let second = fx.db.search_full_texts(&terms("entropy"), &options).unwrap();
    assert_eq!(first, second);

    let first = fx.db.search_authors(&terms("Smith Lee").any(), &options).unwrap();
    let second = fx.db.search_authors(&terms("Smith Lee").any(), &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_item_filter_matches_nothing() {
    let fx = fixture();
    let options = SearchOptions::default().with_item_ids(Vec::<i64>::new());

    assert!(fx.db.search_authors(&terms("Smith"), &options).unwrap().is_empty());
    assert!(fx.db.search_fields(&terms("entropy"), &options).unwrap().is_empty());
    assert!(fx.db.search_full_texts(&terms("entropy"), &options).unwrap().is_empty());
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_empty_terms_are_rejected() {
    let err = SearchTerms::parse("   ").unwrap_err();
    assert!(matches!(err, ZoteroError::Validation { .. }));

    let err = SearchTerms::new(["entropy", ""]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_hostile_tokens_are_plain_text() {
    let fx = fixture();
    let options = SearchOptions::default();

    for input in [
        "'); DROP TABLE items; --",
        "\"entropy\" OR *",
        "NEAR(entropy quark)",
        "title:entropy",
    ] {
        let hostile = SearchTerms::new([input]).unwrap();
        fx.db.search_authors(&hostile, &options).unwrap();
        fx.db.search_fields(&hostile, &options).unwrap();
        fx.db.search_full_texts(&hostile, &options).unwrap();
    }

    assert!(fx.db.table_names().unwrap().contains(&"items".to_string()));
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_cancelled_search_leaves_nothing_behind() {
    let fx = fixture();
    let token = CancellationToken::new();
    token.cancel();
    let options = SearchOptions::default().with_cancel(token);

    let err = fx.db.search_full_texts(&terms("entropy"), &options).unwrap_err();
    assert!(matches!(err, ZoteroError::Cancelled(CancelReason::Requested)));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);

    // The connection stays usable.
    let found = fx
        .db
        .search_full_texts(&terms("entropy"), &SearchOptions::default())
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[test]
fn test_expired_deadline_cancels() {
    let fx = fixture();
    let options = SearchOptions::default().with_cancel(CancellationToken::with_timeout(Duration::ZERO));

    let err = fx.db.search_authors(&terms("Smith"), &options).unwrap_err();
    assert!(matches!(err, ZoteroError::Cancelled(CancelReason::DeadlineExceeded)));
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_multi_word_token_matches_words_in_any_order() {
    let fx = fixture();
    let options = SearchOptions::default();

    let phrase = SearchTerms::new(["entropy production"]).unwrap();
    assert_eq!(fx.db.search_full_texts(&phrase, &options).unwrap(), vec![1]);
    assert_eq!(fx.db.search_fields(&phrase, &options).unwrap(), vec![1]);

    let reversed = SearchTerms::new(["production entropy"]).unwrap();
    assert_eq!(fx.db.search_full_texts(&reversed, &options).unwrap(), vec![1]);

    let hyphenated = SearchTerms::new(["boltzmann-entropy"]).unwrap();
    assert_eq!(fx.db.search_full_texts(&hyphenated, &options).unwrap(), vec![42]);
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_punctuation_only_tokens_are_rejected() {
    for input in ["Smith -", "-", "&", "***", "entropy ..."] {
        let err = SearchTerms::parse(input).unwrap_err();
        assert!(matches!(err, ZoteroError::Validation { .. }), "{input}");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}

#[test]
fn test_second_stage_failure_leaves_nothing_behind() {
    // The vocabulary index builds fine; the per-attachment stage has no source.
    let fx = fixture_with("DROP TABLE fulltextItemWords;");

    let err = fx
        .db
        .search_full_texts(&terms("entropy"), &SearchOptions::default())
        .unwrap_err();
    assert!(matches!(err, ZoteroError::Database { .. }));
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);

    let filtered = SearchOptions::default().with_item_ids(vec![42]);
    assert!(fx.db.search_full_texts(&terms("entropy"), &filtered).is_err());
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);

    // Other searches on the same connection still work.
    assert_eq!(
        sorted(fx.db.search_authors(&terms("Smith"), &SearchOptions::default()).unwrap()),
        vec![1, 2]
    );
}

#[test]
fn test_large_item_filter() {
    let fx = fixture();
    let options = SearchOptions::default().with_item_ids((0..200_000).collect::<Vec<i64>>());

    assert_eq!(
        sorted(fx.db.search_full_texts(&terms("entropy"), &options).unwrap()),
        vec![1, 42]
    );
    assert_eq!(sorted(fx.db.search_authors(&terms("Smith"), &options).unwrap()), vec![1, 2]);
    assert_eq!(fx.db.search_fields(&terms("quark"), &options).unwrap(), vec![3]);
    assert_eq!(fx.db.search_full_texts_substring("oltz", &options).unwrap(), vec![42]);
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_author_substring_search() {
    let fx = fixture();
    let options = SearchOptions::default();

    assert_eq!(fx.db.search_authors_substring("Smi", &options).unwrap(), vec![1, 2]);
    assert_eq!(fx.db.search_authors_substring("smi", &options).unwrap(), vec![1, 2]);
    assert_eq!(fx.db.search_authors_substring("ar", &options).unwrap(), vec![3]);
    assert_eq!(
        fx.db
            .search_authors_substring("Smi", &SearchOptions::default().with_item_ids(vec![2, 3]))
            .unwrap(),
        vec![2]
    );
    assert_eq!(fx.db.temp_object_count().unwrap(), 0);
}

#[test]
fn test_field_substring_search() {
    let fx = fixture();

    assert_eq!(
        fx.db.search_fields_substring("hermo", &SearchOptions::default()).unwrap(),
        vec![2]
    );
    assert_eq!(
        fx.db.search_fields_substring("Physic", &SearchOptions::default()).unwrap(),
        vec![1, 3]
    );
    assert_eq!(
        fx.db.search_fields_substring("entropy", &SearchOptions::default()).unwrap(),
        vec![1]
    );

    let none_ignored = SearchOptions::default().with_ignored_types(Vec::<String>::new());
    assert_eq!(
        fx.db.search_fields_substring("entropy", &none_ignored).unwrap(),
        vec![1, 4]
    );
}

#[test]
fn test_full_text_substring_search() {
    let fx = fixture();
    let options = SearchOptions::default();

    // 102 is standalone and has no parent to report.
    assert_eq!(fx.db.search_full_texts_substring("entro", &options).unwrap(), vec![1, 42]);
    assert_eq!(fx.db.search_full_texts_substring("duct", &options).unwrap(), vec![1]);
    assert!(fx.db.search_full_texts_substring("xyz", &options).unwrap().is_empty());

    let by_attachment = SearchOptions::default().with_item_ids(vec![101]);
    assert_eq!(
        fx.db.search_full_texts_substring("entro", &by_attachment).unwrap(),
        vec![1]
    );
    let by_parent = SearchOptions::default().with_item_ids(vec![42]);
    assert_eq!(
        fx.db.search_full_texts_substring("entro", &by_parent).unwrap(),
        vec![42]
    );
}

#[test]
fn test_substring_key_is_literal_and_validated() {
    let fx = fixture();
    let options = SearchOptions::default();

    assert!(fx.db.search_authors_substring("%", &options).unwrap().is_empty());
    assert!(fx.db.search_fields_substring("'); DROP TABLE items; --", &options).unwrap().is_empty());
    assert!(fx.db.table_names().unwrap().contains(&"items".to_string()));

    let err = fx.db.search_full_texts_substring("  ", &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
