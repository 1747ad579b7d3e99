//! Domain types shared by the storage, library and catalog modules.
//!
//! - Book: normalized catalog record plus reading-status fields
//! - Lists: the three reading-status buckets
//! - Preferences: display and search settings

pub mod book;
pub mod lists;
pub mod preferences;

// Re-export commonly used types
pub use book::{display_author, Book, BookDetails, Source, UnknownSource};
pub use lists::{Bucket, InvalidListType, ReadingLists};
pub use preferences::{Preferences, Theme, ViewMode};
