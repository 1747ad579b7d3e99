//! Google Books volume lookup.
//!
//! - search:  `GET {base}/volumes?q=..&startIndex=..&maxResults=..`
//! - details: `GET {base}/volumes/{id}`

use serde_json::Value;

use super::{encode_segment, str_field, str_list, year_of, BookSource, SearchPage};
use crate::catalog::client::{SearchOptions, SortOrder};
use crate::catalog::error::CatalogError;
use crate::catalog::transport::Request;
use crate::domain::{Book, BookDetails, Source};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1";

/// The volumes endpoint rejects larger pages
const MAX_RESULTS_PER_PAGE: u32 = 40;

pub struct GoogleBooks {
    base_url: String,
    api_key: Option<String>,
}

impl Default for GoogleBooks {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None)
    }
}

impl GoogleBooks {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    fn with_key(&self, request: Request) -> Request {
        match &self.api_key {
            Some(key) => request.param("key", key),
            None => request,
        }
    }

    /// Image links are served over plain http by default
    fn secure(url: String) -> String {
        match url.strip_prefix("http://") {
            Some(rest) => format!("https://{}", rest),
            None => url,
        }
    }

    fn isbn(info: &Value) -> Option<String> {
        let identifiers = info.get("industryIdentifiers")?.as_array()?;
        let find = |kind: &str| {
            identifiers
                .iter()
                .find(|i| i.get("type").and_then(Value::as_str) == Some(kind))
                .and_then(|i| str_field(i, "identifier"))
        };
        find("ISBN_13").or_else(|| find("ISBN_10"))
    }

    /// Normalize one volume; volumes without an id are skipped
    fn normalize_volume(item: &Value) -> Option<Book> {
        let id = str_field(item, "id")?;
        let empty = Value::Null;
        let info = item.get("volumeInfo").unwrap_or(&empty);
        let title = str_field(info, "title").unwrap_or_else(|| "Untitled".to_string());

        let mut book = Book::new(id, Source::GoogleBooks, title).with_authors(str_list(info, "authors"));

        if let Some(links) = info.get("imageLinks") {
            book.cover_url = str_field(links, "thumbnail")
                .or_else(|| str_field(links, "smallThumbnail"))
                .map(Self::secure);
            book.cover_url_large = ["large", "medium", "small"]
                .iter()
                .find_map(|size| str_field(links, size))
                .map(Self::secure)
                .or_else(|| book.cover_url.clone());
        }

        book.isbn = Self::isbn(info);
        book.subjects = str_list(info, "categories");
        book.publisher = str_field(info, "publisher");
        book.language = str_field(info, "language");
        book.rating = info.get("averageRating").and_then(Value::as_f64);
        book.description = str_field(info, "description");
        book.publish_year = str_field(info, "publishedDate").as_deref().and_then(year_of);
        book.page_count = info
            .get("pageCount")
            .and_then(Value::as_u64)
            .filter(|&p| p > 0)
            .map(|p| p as u32);

        Some(book)
    }
}

impl BookSource for GoogleBooks {
    fn source(&self) -> Source {
        Source::GoogleBooks
    }

    fn search_request(&self, query: &str, options: &SearchOptions) -> Request {
        let per_page = options.limit.clamp(1, MAX_RESULTS_PER_PAGE);
        let start_index = u64::from(options.page.saturating_sub(1)) * u64::from(per_page);

        let order_by = match options.sort {
            SortOrder::Newest => "newest",
            _ => "relevance",
        };

        self.with_key(
            Request::get(format!("{}/volumes", self.base_url))
                .param("q", query)
                .param("startIndex", start_index)
                .param("maxResults", per_page)
                .param("orderBy", order_by),
        )
    }

    fn max_page_size(&self) -> Option<u32> {
        Some(MAX_RESULTS_PER_PAGE)
    }

    fn parse_search(&self, body: &Value) -> Result<SearchPage, CatalogError> {
        if !body.is_object() {
            return Err(CatalogError::invalid_response("Google Books search is not an object"));
        }

        // `items` is omitted entirely when nothing matched
        let books = body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Self::normalize_volume).collect())
            .unwrap_or_default();

        let total = body.get("totalItems").and_then(Value::as_u64).unwrap_or(0);

        Ok(SearchPage { books, total })
    }

    fn details_request(&self, id: &str) -> Request {
        let url = format!("{}/volumes/{}", self.base_url, encode_segment(id));
        self.with_key(Request::get(url))
    }

    fn parse_details(&self, _id: &str, body: &Value) -> Result<BookDetails, CatalogError> {
        let book = Self::normalize_volume(body)
            .ok_or_else(|| CatalogError::invalid_response("Google Books volume without `id`"))?;

        let publish_date = body
            .get("volumeInfo")
            .and_then(|info| str_field(info, "publishedDate"));
        let author_names = body
            .get("volumeInfo")
            .map(|info| str_list(info, "authors"))
            .unwrap_or_default();

        Ok(BookDetails {
            book,
            author_names,
            publish_date,
        })
    }
}
