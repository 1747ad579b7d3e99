//! Catalog backends.
//!
//! Each backend knows how to build its requests and how to map its own
//! field vocabulary onto [`Book`]. The client picks one by [`Source`].

pub mod google_books;
pub mod open_library;

use serde_json::Value;

use super::client::SearchOptions;
use super::error::CatalogError;
use super::transport::Request;
use crate::domain::{Book, BookDetails, Source};

pub use google_books::GoogleBooks;
pub use open_library::OpenLibrary;

/// Most author records fetched to resolve a detail page's author names
pub const MAX_AUTHOR_LOOKUPS: usize = 3;

/// One page of normalized search results, before pagination math
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub books: Vec<Book>,
    pub total: u64,
}

/// Request building and response normalization for one catalog
pub trait BookSource: Send + Sync {
    fn source(&self) -> Source;

    fn search_request(&self, query: &str, options: &SearchOptions) -> Request;

    /// Largest page the backend will return, if it caps page size
    fn max_page_size(&self) -> Option<u32> {
        None
    }

    fn parse_search(&self, body: &Value) -> Result<SearchPage, CatalogError>;

    fn details_request(&self, id: &str) -> Request;

    fn parse_details(&self, id: &str, body: &Value) -> Result<BookDetails, CatalogError>;

    /// Follow-up requests for author records, when the detail response
    /// references authors instead of naming them
    fn author_requests(&self, _body: &Value) -> Vec<Request> {
        Vec::new()
    }

    /// Author name from an author record
    fn parse_author(&self, _body: &Value) -> Option<String> {
        None
    }
}

// Small accessors shared by the backends.

pub(crate) fn str_field(value: &Value, name: &str) -> Option<String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn str_list(value: &Value, name: &str) -> Vec<String> {
    value
        .get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn first_str(value: &Value, name: &str) -> Option<String> {
    str_list(value, name).into_iter().next()
}

/// Percent-encode one URL path segment (RFC 3986 unreserved bytes pass)
pub(crate) fn encode_segment(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Leading four-digit year of a date string like "1965-08-01" or "1965"
pub(crate) fn year_of(date: &str) -> Option<i32> {
    date.get(..4)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_helpers() {
        let doc = json!({"title": "  Dune ", "empty": "", "tags": ["a", 1, "b"]});

        assert_eq!(str_field(&doc, "title"), Some("Dune".to_string()));
        assert_eq!(str_field(&doc, "empty"), None);
        assert_eq!(str_list(&doc, "tags"), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(first_str(&doc, "missing"), None);
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("OL893415W"), "OL893415W");
        assert_eq!(encode_segment("a/b?c#d"), "a%2Fb%3Fc%23d");
        assert_eq!(encode_segment("../x y"), "..%2Fx%20y");
        assert_eq!(encode_segment("é"), "%C3%A9");
    }

    #[test]
    fn test_year_of() {
        assert_eq!(year_of("1965-08-01"), Some(1965));
        assert_eq!(year_of("2001"), Some(2001));
        assert_eq!(year_of("n.d."), None);
    }
}
