//! Command-line interface for readshelf.
//!
//! Provides commands for searching the remote catalogs, managing the
//! reading lists, and backing up or inspecting local storage.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::catalog::{CatalogClient, SearchOptions, SortOrder};
use crate::config::{self, ResolvedConfig};
use crate::domain::{Book, Bucket, Source};
use crate::library::{self, Preferences, ReadingListManager};
use crate::storage::{keys, FileBackend, ImportOptions, PersistenceService};

/// readshelf - personal reading tracker
#[derive(Parser, Debug)]
#[command(name = "readshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search a remote catalog
    Search {
        /// Search query
        query: String,

        /// Catalog to search (openlibrary, googlebooks)
        #[arg(short, long)]
        source: Option<Source>,

        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Results per page (defaults to the saved preference)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Result order (relevance, newest, oldest, rating)
        #[arg(long, default_value = "relevance")]
        sort: SortOrder,
    },

    /// Show catalog details of a book
    Show {
        /// Book ID in the catalog
        id: String,

        /// Catalog the ID belongs to
        #[arg(short, long)]
        source: Option<Source>,
    },

    /// Show the reading lists
    Lists {
        /// Only show one list (reading, toRead, completed)
        list: Option<Bucket>,
    },

    /// Add a catalog book to a reading list
    Add {
        /// Book ID in the catalog
        id: String,

        /// Target list
        #[arg(short, long, default_value = "toRead")]
        list: Bucket,

        /// Catalog the ID belongs to
        #[arg(short, long)]
        source: Option<Source>,
    },

    /// Move a book to another list
    Move {
        /// Book ID
        id: String,

        /// Target list
        list: Bucket,
    },

    /// Remove a book from the reading lists
    Remove {
        /// Book ID
        id: String,

        /// Only remove from this list
        #[arg(short, long)]
        list: Option<Bucket>,
    },

    /// Set reading progress in percent (100 marks the book completed)
    Progress {
        /// Book ID
        id: String,

        /// Progress (clamped to 0-100)
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },

    /// Rate a book (0-5)
    Rate {
        /// Book ID
        id: String,

        /// Rating (clamped to 0-5)
        value: f64,
    },

    /// Show reading statistics
    Stats,

    /// Export all stored data as JSON
    Export {
        /// Output file (writes to stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import data from a JSON backup
    Import {
        /// Backup file (reads from stdin if not provided)
        input: Option<PathBuf>,

        /// Merge with existing data instead of replacing it
        #[arg(short, long)]
        merge: bool,

        /// Skip schema validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Delete all stored readshelf data
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Show storage usage
    Storage,

    /// Show recent searches
    History {
        /// Forget all recorded searches
        #[arg(long)]
        clear: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;
        let store = Arc::new(open_store(cfg)?);

        match self.command {
            Commands::Search {
                query,
                source,
                page,
                limit,
                sort,
            } => search(cfg, &store, &query, source, page, limit, sort).await,
            Commands::Show { id, source } => show_book(cfg, &id, source).await,
            Commands::Lists { list } => show_lists(store, list),
            Commands::Add { id, list, source } => add_book(cfg, store, &id, list, source).await,
            Commands::Move { id, list } => {
                let mut manager = ReadingListManager::new(store);
                manager.move_to_list(&id, list)?;
                println!("Moved {} to {}", id, list);
                Ok(())
            }
            Commands::Remove { id, list } => remove_book(store, &id, list),
            Commands::Progress { id, value } => update_progress(store, &id, value),
            Commands::Rate { id, value } => {
                let mut manager = ReadingListManager::new(store);
                manager.update_rating(&id, value)?;
                println!("Rated {}: {:.1}/5", id, value.clamp(0.0, 5.0));
                Ok(())
            }
            Commands::Stats => show_stats(store),
            Commands::Export { output } => export(&store, output),
            Commands::Import {
                input,
                merge,
                no_validate,
            } => import(&store, input, merge, !no_validate),
            Commands::Clear { yes } => clear(&store, yes),
            Commands::Storage => show_storage(cfg, &store),
            Commands::History { clear } => show_history(&store, clear),
            Commands::Config => show_config(cfg, &store),
        }
    }
}

fn open_store(cfg: &ResolvedConfig) -> Result<PersistenceService<FileBackend>> {
    if let Some(parent) = cfg.storage_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create storage directory: {}", parent.display()))?;
    }

    let backend = FileBackend::with_capacity(&cfg.storage_file, cfg.capacity_bytes);
    Ok(PersistenceService::new(backend)
        .with_prefix(cfg.prefix.clone())
        .with_capacity(cfg.capacity_bytes))
}

fn catalog_client(cfg: &ResolvedConfig, source: Option<Source>) -> CatalogClient {
    let mut settings = cfg.catalog.clone();
    if let Some(source) = source {
        settings.default_source = source;
    }
    CatalogClient::new(settings)
}

fn print_book_row(book: &Book) {
    let year = book
        .publish_year
        .map(|y| y.to_string())
        .unwrap_or_default();
    println!(
        "{:<16} {:<40} {:<24} {:<6}",
        truncate(&book.id, 16),
        truncate(&book.title, 40),
        truncate(&book.author, 24),
        year
    );
}

/// Truncate for table display, on a character boundary
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Search the catalog and print one page of results
async fn search(
    cfg: &ResolvedConfig,
    store: &PersistenceService<FileBackend>,
    query: &str,
    source: Option<Source>,
    page: u32,
    limit: Option<u32>,
    sort: SortOrder,
) -> Result<()> {
    let prefs = Preferences::load(store)?;
    // Flag, then a saved preference, then the configured default
    let source = match source {
        Some(source) => source,
        None if store.load_value(keys::PREFERENCES)?.is_some() => prefs.default_source,
        None => cfg.catalog.default_source,
    };
    let options = SearchOptions {
        page,
        limit: limit.unwrap_or(prefs.results_per_page),
        sort,
        source: Some(source),
    };

    let client = catalog_client(cfg, Some(source));
    let results = client.search(query, &options).await?;
    library::record_search(store, query)?;

    if results.books.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!(
        "Found {} result(s) for \"{}\" in {} (page {}/{}):\n",
        results.total, query, source, results.page, results.total_pages
    );
    println!("{:<16} {:<40} {:<24} {:<6}", "ID", "TITLE", "AUTHOR", "YEAR");
    println!("{}", "-".repeat(90));
    for book in &results.books {
        print_book_row(book);
    }

    if results.has_more {
        println!("\nMore results: --page {}", results.page + 1);
    }

    Ok(())
}

/// Show catalog details of one book
async fn show_book(cfg: &ResolvedConfig, id: &str, source: Option<Source>) -> Result<()> {
    let client = catalog_client(cfg, source);
    let details = client.get_details(id, source).await?;
    let book = &details.book;

    println!("{}", book.title);
    println!("{}", "=".repeat(book.title.chars().count().max(8)));
    println!("  ID:        {} ({})", book.id, book.source);
    println!("  Author(s): {}", if book.authors.is_empty() {
        book.author.clone()
    } else {
        book.authors.join(", ")
    });
    if let Some(date) = &details.publish_date {
        println!("  Published: {}", date);
    }
    if let Some(publisher) = &book.publisher {
        println!("  Publisher: {}", publisher);
    }
    if let Some(pages) = book.page_count {
        println!("  Pages:     {}", pages);
    }
    if let Some(isbn) = &book.isbn {
        println!("  ISBN:      {}", isbn);
    }
    if let Some(rating) = book.rating {
        println!("  Rating:    {:.1}/5", rating);
    }
    if !book.subjects.is_empty() {
        println!("  Subjects:  {}", book.subjects.join(", "));
    }
    if let Some(description) = &book.description {
        println!("\n{}", description);
    }

    Ok(())
}

fn show_lists(store: Arc<PersistenceService<FileBackend>>, only: Option<Bucket>) -> Result<()> {
    let mut manager = ReadingListManager::new(store);
    let buckets: Vec<Bucket> = match only {
        Some(bucket) => vec![bucket],
        None => Bucket::ALL.to_vec(),
    };

    for bucket in buckets {
        let books = manager.list(bucket)?;
        println!("\n{} ({})", bucket, books.len());
        println!("{}", "-".repeat(90));
        if books.is_empty() {
            println!("  (empty)");
        }
        for book in books {
            print_book_row(book);
            match bucket {
                Bucket::Reading => {
                    if let Some(progress) = book.progress {
                        println!("  {:>3}% read", progress);
                    }
                }
                Bucket::Completed => {
                    if let Some(rating) = book.user_rating {
                        println!("  rated {:.1}/5", rating);
                    }
                }
                Bucket::ToRead => {}
            }
        }
    }

    Ok(())
}

/// Fetch a book from the catalog and add it to a list
async fn add_book(
    cfg: &ResolvedConfig,
    store: Arc<PersistenceService<FileBackend>>,
    id: &str,
    bucket: Bucket,
    source: Option<Source>,
) -> Result<()> {
    let client = catalog_client(cfg, source);
    let details = client
        .get_details(id, source)
        .await
        .with_context(|| format!("Failed to look up book {}", id))?;
    let title = details.book.title.clone();

    let mut manager = ReadingListManager::new(store);
    manager.add_to_list(details.book, bucket)?;
    println!("Added \"{}\" to {}", title, bucket);

    Ok(())
}

fn remove_book(
    store: Arc<PersistenceService<FileBackend>>,
    id: &str,
    bucket: Option<Bucket>,
) -> Result<()> {
    let mut manager = ReadingListManager::new(store);
    match manager.remove_from_list(id, bucket)? {
        Some(book) => println!("Removed \"{}\"", book.title),
        None => println!("No book with ID {} in the reading lists", id),
    }
    Ok(())
}

fn update_progress(store: Arc<PersistenceService<FileBackend>>, id: &str, value: i32) -> Result<()> {
    let mut manager = ReadingListManager::new(store);
    manager.update_progress(id, value)?;

    match manager.find(id)? {
        Some((Bucket::Completed, book)) => println!("Finished \"{}\"", book.title),
        Some((_, book)) => println!(
            "\"{}\": {}% read",
            book.title,
            book.progress.unwrap_or_default()
        ),
        None => {}
    }
    Ok(())
}

fn show_stats(store: Arc<PersistenceService<FileBackend>>) -> Result<()> {
    let mut manager = ReadingListManager::new(store);
    let stats = manager.get_stats()?;

    println!("Books read:        {}", stats.books_read);
    println!("Pages read:        {}", stats.total_pages);
    println!("Average rating:    {:.1}", stats.average_rating);
    println!("Currently reading: {}", stats.currently_reading);
    println!("Want to read:      {}", stats.want_to_read);
    Ok(())
}

fn export(store: &PersistenceService<FileBackend>, output: Option<PathBuf>) -> Result<()> {
    let json = store.export_all()?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("Failed to write backup: {}", path.display()))?;
            eprintln!("Exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn import(
    store: &PersistenceService<FileBackend>,
    input: Option<PathBuf>,
    merge: bool,
    validate: bool,
) -> Result<()> {
    let json = match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read backup: {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            buffer
        }
    };

    let report = store.import_all(&json, ImportOptions { merge, validate })?;

    eprintln!("Imported {} key(s)", report.imported.len());
    for key in &report.imported {
        eprintln!("  {}", key);
    }
    for warning in &report.warnings {
        eprintln!("  warning: {}", warning);
    }
    Ok(())
}

fn clear(store: &PersistenceService<FileBackend>, confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("Refusing to delete all data without --yes");
    }
    store.clear_all()?;
    println!("All readshelf data deleted");
    Ok(())
}

fn show_storage(cfg: &ResolvedConfig, store: &PersistenceService<FileBackend>) -> Result<()> {
    let stats = store.stats()?;

    println!("File:  {}", cfg.storage_file.display());
    println!("Used:  {} / {} bytes ({:.2}%)", stats.used, stats.total, stats.percentage);
    println!("Items: {}", stats.items);
    for key in store.keys()? {
        println!("  {}", key);
    }
    Ok(())
}

fn show_history(store: &PersistenceService<FileBackend>, clear: bool) -> Result<()> {
    if clear {
        library::clear_search_history(store)?;
        println!("Search history cleared");
        return Ok(());
    }

    let history = library::search_history(store)?;
    if history.is_empty() {
        println!("No recent searches");
    }
    for (i, query) in history.iter().enumerate() {
        println!("{:>3}. {}", i + 1, query);
    }
    Ok(())
}

fn show_config(cfg: &ResolvedConfig, store: &PersistenceService<FileBackend>) -> Result<()> {
    let prefs = Preferences::load(store)?;
    let catalog = &cfg.catalog;

    println!("readshelf configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Storage:");
    println!("  Home:     {}", cfg.home.display());
    println!("  File:     {}", cfg.storage_file.display());
    println!("  Prefix:   {}", cfg.prefix);
    println!("  Capacity: {} bytes", cfg.capacity_bytes);
    println!();
    println!("Catalog:");
    println!("  Default source: {}", catalog.default_source);
    println!("  Cache TTL:      {}s", catalog.cache_ttl.as_secs());
    println!(
        "  Rate limit:     {} req / {}ms",
        catalog.rate_limit_requests,
        catalog.rate_limit_window.as_millis()
    );
    println!("  Timeout:        {}s", catalog.timeout.as_secs());
    println!(
        "  Retries:        {} (backoff {}ms..{}ms)",
        catalog.retry.max_attempts.saturating_sub(1),
        catalog.retry.initial_delay_ms,
        catalog.retry.max_delay_ms
    );
    println!("  Open Library:   {}", catalog.open_library_url);
    println!("  Google Books:   {}", catalog.google_books_url);
    println!(
        "  Google API key: {}",
        if catalog.google_api_key.is_some() { "set" } else { "(none)" }
    );
    println!();
    println!("Preferences:");
    println!("  Theme:            {:?}", prefs.theme);
    println!("  Default source:   {}", prefs.default_source);
    println!("  Results per page: {}", prefs.results_per_page);
    println!("  View mode:        {:?}", prefs.view_mode);
    Ok(())
}
