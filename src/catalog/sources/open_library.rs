//! Open Library document search.
//!
//! - search:  `GET {base}/search.json?q=..&page=..&limit=..`
//! - details: `GET {base}/works/{id}.json`
//! - authors: `GET {base}/authors/{id}.json` (details only list author keys)

use serde_json::Value;

use super::{
    encode_segment, first_str, str_field, str_list, BookSource, SearchPage, MAX_AUTHOR_LOOKUPS,
};
use crate::catalog::client::{SearchOptions, SortOrder};
use crate::catalog::error::CatalogError;
use crate::catalog::transport::Request;
use crate::domain::{display_author, Book, BookDetails, Source};

pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org";
const COVERS_URL: &str = "https://covers.openlibrary.org/b/id";

/// Fields requested from the search endpoint
const SEARCH_FIELDS: &str = "key,title,author_name,cover_i,isbn,subject,publisher,language,\
ratings_average,first_publish_year,number_of_pages_median";

const MAX_SUBJECTS: usize = 10;

pub struct OpenLibrary {
    base_url: String,
}

impl Default for OpenLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl OpenLibrary {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn cover_urls(cover_id: Option<i64>) -> (Option<String>, Option<String>) {
        match cover_id {
            Some(id) if id > 0 => (
                Some(format!("{}/{}-M.jpg", COVERS_URL, id)),
                Some(format!("{}/{}-L.jpg", COVERS_URL, id)),
            ),
            _ => (None, None),
        }
    }

    /// Normalize one search document; documents without a work key are skipped
    fn normalize_doc(doc: &Value) -> Option<Book> {
        let key = str_field(doc, "key")?;
        let id = key.trim_start_matches("/works/").to_string();
        let title = str_field(doc, "title").unwrap_or_else(|| "Untitled".to_string());

        let mut book = Book::new(id, Source::OpenLibrary, title).with_authors(str_list(doc, "author_name"));
        let (cover, cover_large) = Self::cover_urls(doc.get("cover_i").and_then(Value::as_i64));
        book.cover_url = cover;
        book.cover_url_large = cover_large;
        book.isbn = first_str(doc, "isbn");
        book.subjects = str_list(doc, "subject").into_iter().take(MAX_SUBJECTS).collect();
        book.publisher = first_str(doc, "publisher");
        book.language = first_str(doc, "language");
        book.rating = doc
            .get("ratings_average")
            .and_then(Value::as_f64)
            .map(|r| (r * 10.0).round() / 10.0);
        book.publish_year = doc
            .get("first_publish_year")
            .and_then(Value::as_i64)
            .map(|y| y as i32);
        book.page_count = doc
            .get("number_of_pages_median")
            .and_then(Value::as_u64)
            .map(|p| p as u32);

        Some(book)
    }

    /// Work descriptions are either a string or `{"type": .., "value": ".."}`
    fn description(work: &Value) -> Option<String> {
        match work.get("description")? {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("value").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }
}

impl BookSource for OpenLibrary {
    fn source(&self) -> Source {
        Source::OpenLibrary
    }

    fn search_request(&self, query: &str, options: &SearchOptions) -> Request {
        let request = Request::get(format!("{}/search.json", self.base_url))
            .param("q", query)
            .param("page", options.page)
            .param("limit", options.limit)
            .param("fields", SEARCH_FIELDS);

        match options.sort {
            SortOrder::Relevance => request,
            SortOrder::Newest => request.param("sort", "new"),
            SortOrder::Oldest => request.param("sort", "old"),
            SortOrder::Rating => request.param("sort", "rating"),
        }
    }

    fn parse_search(&self, body: &Value) -> Result<SearchPage, CatalogError> {
        let docs = body
            .get("docs")
            .and_then(Value::as_array)
            .ok_or_else(|| CatalogError::invalid_response("Open Library search without `docs`"))?;

        let total = body
            .get("numFound")
            .or_else(|| body.get("num_found"))
            .and_then(Value::as_u64)
            .unwrap_or(docs.len() as u64);

        Ok(SearchPage {
            books: docs.iter().filter_map(Self::normalize_doc).collect(),
            total,
        })
    }

    fn details_request(&self, id: &str) -> Request {
        Request::get(format!("{}/works/{}.json", self.base_url, encode_segment(id)))
    }

    fn parse_details(&self, id: &str, body: &Value) -> Result<BookDetails, CatalogError> {
        let title = str_field(body, "title")
            .ok_or_else(|| CatalogError::invalid_response("Open Library work without `title`"))?;

        let mut book = Book::new(id, Source::OpenLibrary, title);
        book.author = display_author(&[]);
        let cover_id = body
            .get("covers")
            .and_then(Value::as_array)
            .and_then(|covers| covers.first())
            .and_then(Value::as_i64);
        let (cover, cover_large) = Self::cover_urls(cover_id);
        book.cover_url = cover;
        book.cover_url_large = cover_large;
        book.subjects = str_list(body, "subjects").into_iter().take(MAX_SUBJECTS).collect();
        book.description = Self::description(body);

        let publish_date = str_field(body, "first_publish_date");
        book.publish_year = publish_date.as_deref().and_then(|d| {
            // "June 1965" or "1965"
            d.split_whitespace().last().and_then(|y| y.parse().ok())
        });

        Ok(BookDetails {
            book,
            author_names: Vec::new(),
            publish_date,
        })
    }

    fn author_requests(&self, body: &Value) -> Vec<Request> {
        body.get("authors")
            .and_then(Value::as_array)
            .map(|authors| {
                authors
                    .iter()
                    .filter_map(|a| a.pointer("/author/key").and_then(Value::as_str))
                    .take(MAX_AUTHOR_LOOKUPS)
                    .map(|key| Request::get(format!("{}{}.json", self.base_url, key)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse_author(&self, body: &Value) -> Option<String> {
        str_field(body, "name").or_else(|| str_field(body, "personal_name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_request_params() {
        let ol = OpenLibrary::default();
        let options = SearchOptions {
            page: 2,
            limit: 10,
            sort: SortOrder::Newest,
            source: None,
        };
        let request = ol.search_request("dune", &options);

        assert_eq!(request.url, "https://openlibrary.org/search.json");
        assert_eq!(request.param_value("q"), Some("dune"));
        assert_eq!(request.param_value("page"), Some("2"));
        assert_eq!(request.param_value("limit"), Some("10"));
        assert_eq!(request.param_value("sort"), Some("new"));
    }

    #[test]
    fn test_details_request_escapes_id() {
        let ol = OpenLibrary::new("http://ol.test");
        assert_eq!(ol.details_request("OL1W").url, "http://ol.test/works/OL1W.json");
        assert_eq!(
            ol.details_request("OL1W.json?x=1").url,
            "http://ol.test/works/OL1W.json%3Fx%3D1.json"
        );
    }

    #[test]
    fn test_parse_search_normalizes_docs() {
        let body = json!({
            "numFound": 42,
            "docs": [
                {
                    "key": "/works/OL893415W",
                    "title": "Dune",
                    "author_name": ["Frank Herbert"],
                    "cover_i": 11481354,
                    "isbn": ["9780441013593", "0441013597"],
                    "subject": ["Science fiction"],
                    "publisher": ["Ace"],
                    "language": ["eng"],
                    "ratings_average": 4.2567,
                    "first_publish_year": 1965,
                    "number_of_pages_median": 604
                },
                {"title": "No key, skipped"}
            ]
        });

        let page = OpenLibrary::default().parse_search(&body).unwrap();
        assert_eq!(page.total, 42);
        assert_eq!(page.books.len(), 1);

        let dune = &page.books[0];
        assert_eq!(dune.id, "OL893415W");
        assert_eq!(dune.source, Source::OpenLibrary);
        assert_eq!(dune.author, "Frank Herbert");
        assert_eq!(
            dune.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/11481354-M.jpg")
        );
        assert_eq!(
            dune.cover_url_large.as_deref(),
            Some("https://covers.openlibrary.org/b/id/11481354-L.jpg")
        );
        assert_eq!(dune.isbn.as_deref(), Some("9780441013593"));
        assert_eq!(dune.rating, Some(4.3));
        assert_eq!(dune.publish_year, Some(1965));
        assert_eq!(dune.page_count, Some(604));
    }

    #[test]
    fn test_parse_search_rejects_missing_docs() {
        let err = OpenLibrary::default().parse_search(&json!({"error": "x"})).unwrap_err();
        assert_eq!(err.kind, crate::catalog::error::CatalogErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_details_and_author_refs() {
        let ol = OpenLibrary::new("https://openlibrary.org/");
        let body = json!({
            "title": "Dune",
            "description": {"type": "/type/text", "value": "Spice."},
            "subjects": ["Arrakis"],
            "covers": [123],
            "first_publish_date": "August 1965",
            "authors": [
                {"author": {"key": "/authors/OL1A"}},
                {"author": {"key": "/authors/OL2A"}},
                {"author": {"key": "/authors/OL3A"}},
                {"author": {"key": "/authors/OL4A"}}
            ]
        });

        let details = ol.parse_details("OL893415W", &body).unwrap();
        assert_eq!(details.book.description.as_deref(), Some("Spice."));
        assert_eq!(details.book.publish_year, Some(1965));
        assert_eq!(details.publish_date.as_deref(), Some("August 1965"));

        let requests = ol.author_requests(&body);
        assert_eq!(requests.len(), MAX_AUTHOR_LOOKUPS);
        assert_eq!(requests[0].url, "https://openlibrary.org/authors/OL1A.json");

        assert_eq!(
            ol.parse_author(&json!({"name": "Frank Herbert"})),
            Some("Frank Herbert".to_string())
        );
    }
}
