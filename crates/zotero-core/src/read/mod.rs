//! Metadata readers: document overviews, creators and attachments.

mod authors;
mod columns;
mod docs;

pub use authors::{creator_names, doc_authors, format_author_label, CreatorName};
pub use columns::{extract_year, DocColumn};
pub use docs::{all_docs, doc_attachments, DocAuthors, DocListOptions, DocSummary};
