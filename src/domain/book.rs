//! Normalized book records.
//!
//! Every catalog backend converges on the same [`Book`] shape. Status fields
//! (progress, dates, user rating) are only populated while the book sits in
//! a reading list.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Remote catalog a book was fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Open Library document search
    OpenLibrary,

    /// Google Books volume lookup
    GoogleBooks,
}

impl Default for Source {
    fn default() -> Self {
        Self::OpenLibrary
    }
}

impl Source {
    /// Wire name of the source
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenLibrary => "openlibrary",
            Self::GoogleBooks => "googlebooks",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown catalog source: {0}")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openlibrary" => Ok(Self::OpenLibrary),
            "googlebooks" => Ok(Self::GoogleBooks),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}

/// A book, normalized from any catalog backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Backend-specific identifier (work key or volume id)
    pub id: String,

    /// Backend the record came from
    #[serde(default)]
    pub source: Source,

    #[serde(default)]
    pub title: String,

    /// Primary author display name
    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url_large: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(default)]
    pub subjects: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Catalog rating (0-5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,

    // Status fields, managed by the reading list manager.
    /// Reading progress in percent (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_date: Option<NaiveDate>,

    /// The reader's own rating (0-5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<f64>,
}

impl Book {
    /// Create a book with only the required fields set
    pub fn new(id: impl Into<String>, source: Source, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            title: title.into(),
            author: String::new(),
            authors: Vec::new(),
            cover_url: None,
            cover_url_large: None,
            isbn: None,
            subjects: Vec::new(),
            publisher: None,
            language: None,
            rating: None,
            description: None,
            publish_year: None,
            page_count: None,
            progress: None,
            started_date: None,
            completed_date: None,
            added_date: None,
            user_rating: None,
        }
    }

    /// Set the author list; the first entry becomes the display author
    pub fn with_authors(mut self, authors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.authors = authors.into_iter().map(Into::into).collect();
        self.author = display_author(&self.authors);
        self
    }

    pub fn with_page_count(mut self, pages: u32) -> Self {
        self.page_count = Some(pages);
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Rating used for statistics: the reader's own, else the catalog's
    pub fn effective_rating(&self) -> Option<f64> {
        self.user_rating.or(self.rating)
    }
}

/// Display name for an author list
pub fn display_author(authors: &[String]) -> String {
    authors
        .first()
        .cloned()
        .unwrap_or_else(|| "Unknown Author".to_string())
}

/// A book with the extra fields only the detail endpoints provide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,

    /// Author names resolved from author records (detail fan-out)
    #[serde(default)]
    pub author_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_wire_names() {
        assert_eq!(
            serde_json::to_string(&Source::GoogleBooks).unwrap(),
            "\"googlebooks\""
        );
        assert_eq!("openlibrary".parse::<Source>().unwrap(), Source::OpenLibrary);
        assert!("amazon".parse::<Source>().is_err());
    }

    #[test]
    fn test_book_serializes_camel_case_without_empty_status() {
        let book = Book::new("OL1W", Source::OpenLibrary, "Dune").with_page_count(412);
        let json = serde_json::to_value(&book).unwrap();

        assert_eq!(json["pageCount"], 412);
        assert!(json.get("progress").is_none());
        assert!(json.get("startedDate").is_none());
    }

    #[test]
    fn test_with_authors_sets_display_author() {
        let book = Book::new("x", Source::OpenLibrary, "Good Omens")
            .with_authors(["Terry Pratchett", "Neil Gaiman"]);
        assert_eq!(book.author, "Terry Pratchett");

        let anonymous = Book::new("y", Source::OpenLibrary, "Beowulf").with_authors(Vec::<String>::new());
        assert_eq!(anonymous.author, "Unknown Author");
    }

    #[test]
    fn test_effective_rating_prefers_user_rating() {
        let mut book = Book::new("x", Source::GoogleBooks, "T").with_rating(3.5);
        assert_eq!(book.effective_rating(), Some(3.5));
        book.user_rating = Some(5.0);
        assert_eq!(book.effective_rating(), Some(5.0));
    }
}
