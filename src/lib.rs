//! readshelf - personal reading tracker
//!
//! Searches remote book catalogs and keeps the reader's lists (reading,
//! to read, completed) in validated local storage.
//!
//! # Modules
//!
//! - `storage`: Persistence service (envelopes, schemas, import/export, quota)
//! - `library`: Reading lists, preferences and search history on top of storage
//! - `catalog`: Remote catalog client (cache, rate limit, timeout, retry)
//! - `domain`: Data structures (Book, Bucket, ReadingLists)
//! - `events`: Publish/subscribe used for change notification
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Find a book and queue it
//! readshelf search "left hand of darkness"
//! readshelf add OL59800W --list toRead
//!
//! # Track progress (100 moves it to completed)
//! readshelf progress OL59800W 100
//!
//! # Back up everything
//! readshelf export -o backup.json
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod library;
pub mod storage;

// Re-export main types at crate root for convenience
pub use catalog::{CatalogClient, CatalogError, CatalogErrorKind, SearchOptions, SearchResults};
pub use domain::{Book, BookDetails, Bucket, ReadingLists, Source};
pub use library::{ListError, ReadingListManager};
pub use storage::{PersistenceService, StorageBackend, StorageError};
