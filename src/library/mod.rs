//! The reader's personal library, built on the persistence service.
//!
//! # Storage Keys
//!
//! ```text
//! readshelf_readingLists    # {reading: [...], toRead: [...], completed: [...]}
//! readshelf_preferences     # theme, default source, page size, view mode
//! readshelf_searchHistory   # recent queries, newest first (max 50)
//! ```

pub mod history;
pub mod manager;
pub mod preferences;

pub use history::{clear_search_history, record_search, search_history};
pub use manager::{ListAction, ListChange, ListError, ReadingListManager, ReadingStats};
pub use preferences::{Preferences, Theme, ViewMode};
