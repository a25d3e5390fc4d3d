//! A small Zotero data directory for integration tests.

#![allow(dead_code)]

use rusqlite::Connection;
use tempfile::TempDir;
use zotero_core::ZoteroDatabase;

const SCHEMA: &str = "
    CREATE TABLE itemTypes (itemTypeID INTEGER PRIMARY KEY, typeName TEXT UNIQUE);
    CREATE TABLE fieldsCombined (fieldID INTEGER PRIMARY KEY, fieldName TEXT UNIQUE);
    CREATE TABLE creatorTypes (creatorTypeID INTEGER PRIMARY KEY, creatorType TEXT UNIQUE);
    CREATE TABLE items (
        itemID INTEGER PRIMARY KEY,
        itemTypeID INT NOT NULL,
        dateAdded TEXT NOT NULL,
        key TEXT NOT NULL
    );
    CREATE TABLE itemDataValues (valueID INTEGER PRIMARY KEY, value UNIQUE);
    CREATE TABLE itemData (itemID INT, fieldID INT, valueID INT, PRIMARY KEY (itemID, fieldID));
    CREATE TABLE creators (creatorID INTEGER PRIMARY KEY, firstName TEXT, lastName TEXT);
    CREATE TABLE itemCreators (
        itemID INT, creatorID INT, creatorTypeID INT, orderIndex INT,
        PRIMARY KEY (itemID, orderIndex)
    );
    CREATE TABLE itemAttachments (itemID INTEGER PRIMARY KEY, parentItemID INT, path TEXT);
    CREATE TABLE fulltextWords (wordID INTEGER PRIMARY KEY, word TEXT UNIQUE);
    CREATE TABLE fulltextItemWords (wordID INT, itemID INT, PRIMARY KEY (wordID, itemID));
";

// Documents: 1, 2, 3 (articles and books), 42 (book), 4 (note).
// Attachments: 100 and 103 under 42, 101 under 1, 102 standalone.
const DATA: &str = "
    INSERT INTO itemTypes VALUES (2, 'book'), (3, 'attachment'), (22, 'journalArticle'), (28, 'note');
    INSERT INTO fieldsCombined VALUES
        (1, 'title'), (6, 'date'), (12, 'publicationTitle'), (90, 'abstractNote');
    INSERT INTO creatorTypes VALUES (8, 'author'), (10, 'editor');

    INSERT INTO items VALUES
        (1, 22, '2020-01-01 10:00:00', 'DOC00001'),
        (2, 2, '2020-02-01 10:00:00', 'DOC00002'),
        (3, 22, '2020-03-01 10:00:00', 'DOC00003'),
        (4, 28, '2020-04-01 10:00:00', 'NOTE0004'),
        (42, 2, '2021-05-01 10:00:00', 'DOC00042'),
        (100, 3, '2021-05-02 10:00:00', 'ATT00100'),
        (101, 3, '2020-01-02 10:00:00', 'ATT00101'),
        (102, 3, '2022-01-01 10:00:00', 'ATT00102'),
        (103, 3, '2021-05-03 10:00:00', 'ATT00103');

    INSERT INTO itemDataValues VALUES
        (1, 'Entropy production in open systems'),
        (2, '2019-03-00 2019-03'),
        (3, 'Physical Review E'),
        (4, 'Thermodynamics of quarks'),
        (5, '2001'),
        (6, 'Quark matter'),
        (7, 'Nuclear Physics A'),
        (8, 'entropy reminder'),
        (9, 'Statistical mechanics'),
        (10, 'A primer on ensembles');
    INSERT INTO itemData VALUES
        (1, 1, 1), (1, 6, 2), (1, 12, 3),
        (2, 1, 4), (2, 6, 5),
        (3, 1, 6), (3, 12, 7),
        (4, 1, 8),
        (42, 1, 9), (42, 90, 10);

    INSERT INTO creators VALUES
        (1, 'Ann', 'Smith'), (2, 'John', 'Doe'), (3, 'Bo', 'Lee'), (4, 'María', 'García');
    INSERT INTO itemCreators VALUES
        (1, 1, 8, 1), (1, 2, 8, 2), (1, 3, 8, 0),
        (2, 1, 8, 0),
        (3, 2, 8, 0), (3, 4, 8, 1),
        (42, 3, 10, 0);

    INSERT INTO itemAttachments VALUES
        (100, 42, 'storage:mechanics.pdf'),
        (101, 1, 'storage:entropy.pdf'),
        (102, NULL, 'storage:loose.pdf'),
        (103, 42, NULL);

    INSERT INTO fulltextWords VALUES
        (1, 'entropy'), (2, 'boltzmann'), (3, 'production'), (4, 'quark'), (5, 'or');
    INSERT INTO fulltextItemWords VALUES
        (1, 100), (2, 100),
        (1, 101), (3, 101), (5, 101),
        (1, 102),
        (1, 103);
";

/// A Zotero data directory with `zotero.sqlite` and `storage/`.
pub struct Fixture {
    pub dir: TempDir,
    pub db: ZoteroDatabase,
}

pub fn fixture() -> Fixture {
    fixture_with("")
}

/// The standard fixture with `extra_sql` applied to the database before opening.
pub fn fixture_with(extra_sql: &str) -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join("storage")).unwrap();

    {
        let conn = Connection::open(dir.path().join("zotero.sqlite")).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(DATA).unwrap();
        conn.execute_batch(extra_sql).unwrap();
    }

    let db = ZoteroDatabase::open(dir.path()).unwrap();
    Fixture { dir, db }
}

/// Sorted copy, for comparing result sets.
pub fn sorted(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids
}
