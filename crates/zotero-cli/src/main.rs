//! Zotero Search - command-line front end for zotero-core.
//!
//! Runs author, field or full-text searches (indexed, or plain substring
//! matches with `--substring`) against a Zotero data directory
//! and prints the results as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zotero_core::config::resolve_data_dir;
use zotero_core::{CancellationToken, ItemId, SearchOptions, SearchTerms, ZoteroDatabase};

#[derive(Parser, Debug)]
#[command(name = "zotero-search")]
#[command(about = "Full-text search over a Zotero library")]
struct Args {
    /// Zotero data directory (defaults to ~/Zotero)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Abort the search after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search creators' first and last names
    Authors(SearchArgs),
    /// Search field values such as titles and abstracts
    Fields {
        #[command(flatten)]
        search: SearchArgs,

        /// Item types to skip (defaults to attachment,note)
        #[arg(long, value_delimiter = ',')]
        ignore: Option<Vec<String>>,
    },
    /// Search the indexed full texts of attachments
    Fulltext(SearchArgs),
    /// List every document with brief information
    Docs {
        /// Print attachment paths relative to the storage directory
        #[arg(long)]
        relative: bool,

        /// Print all author last names instead of a short label
        #[arg(long)]
        full_authors: bool,
    },
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Search terms, each matched as a phrase (full texts: all of its words)
    #[arg(required = true)]
    terms: Vec<String>,

    /// Restrict the search to these item ids
    #[arg(long, value_delimiter = ',')]
    items: Option<Vec<ItemId>>,

    /// Match items containing any term instead of all terms
    #[arg(long, conflicts_with = "substring")]
    any: bool,

    /// Match the terms, joined by spaces, as one fragment anywhere in the text
    #[arg(long)]
    substring: bool,
}

/// What a search subcommand asked for.
enum Query {
    Terms(SearchTerms),
    Substring(String),
}

impl Query {
    fn describe(&self) -> String {
        match self {
            Query::Terms(terms) => terms.expression().to_string(),
            Query::Substring(key) => format!("*{}*", key),
        }
    }
}

impl SearchArgs {
    fn terms(&self) -> Result<SearchTerms> {
        let terms = SearchTerms::new(&self.terms)?;
        Ok(if self.any { terms.any() } else { terms })
    }

    fn query(&self) -> Result<Query> {
        if self.substring {
            Ok(Query::Substring(self.terms.join(" ")))
        } else {
            Ok(Query::Terms(self.terms()?))
        }
    }

    fn options(&self, cancel: &CancellationToken) -> SearchOptions {
        let options = SearchOptions::default().with_cancel(cancel.clone());
        match &self.items {
            Some(items) => options.with_item_ids(items.clone()),
            None => options,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchOutput {
    query: String,
    items: Vec<ItemId>,
    total_count: usize,
    query_time_ms: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let data_dir = resolve_data_dir(args.data_dir.as_deref())?;
    info!("Zotero data directory: {}", data_dir.display());

    let cancel = match args.timeout_secs {
        Some(secs) => CancellationToken::with_timeout(Duration::from_secs(secs)),
        None => CancellationToken::new(),
    };

    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the running search");
            watcher.cancel();
        }
    });

    let command = args.command;
    let output = tokio::task::spawn_blocking(move || run(&data_dir, command, &cancel)).await??;
    println!("{}", output);

    Ok(())
}

fn run(data_dir: &Path, command: Command, cancel: &CancellationToken) -> Result<String> {
    let db = ZoteroDatabase::open(data_dir)?;

    let output = match command {
        Command::Authors(search) => {
            let query = search.query()?;
            let options = search.options(cancel);
            let start = Instant::now();
            let items = match &query {
                Query::Terms(terms) => db.search_authors(terms, &options)?,
                Query::Substring(key) => db.search_authors_substring(key, &options)?,
            };
            search_output(&query, items, start)?
        }
        Command::Fields { search, ignore } => {
            let query = search.query()?;
            let mut options = search.options(cancel);
            if let Some(types) = ignore {
                options = options.with_ignored_types(types);
            }
            let start = Instant::now();
            let items = match &query {
                Query::Terms(terms) => db.search_fields(terms, &options)?,
                Query::Substring(key) => db.search_fields_substring(key, &options)?,
            };
            search_output(&query, items, start)?
        }
        Command::Fulltext(search) => {
            let query = search.query()?;
            let options = search.options(cancel);
            let start = Instant::now();
            let items = match &query {
                Query::Terms(terms) => db.search_full_texts(terms, &options)?,
                Query::Substring(key) => db.search_full_texts_substring(key, &options)?,
            };
            search_output(&query, items, start)?
        }
        Command::Docs {
            relative,
            full_authors,
        } => {
            let docs = db.all_docs(!relative, !full_authors)?;
            info!("Listed {} documents", docs.len());
            serde_json::to_string_pretty(&docs)?
        }
    };

    Ok(output)
}

fn search_output(query: &Query, items: Vec<ItemId>, start: Instant) -> Result<String> {
    let output = SearchOutput {
        query: query.describe(),
        total_count: items.len(),
        items,
        query_time_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    Ok(serde_json::to_string_pretty(&output)?)
}
