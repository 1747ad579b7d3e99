//! The catalog client: cached, rate-limited, retried access to a book
//! catalog backend.
//!
//! ```text
//! search/get_details
//!   -> TTL cache (hit returns immediately)
//!   -> loading state: begin (finished on drop if cancelled)
//!   -> fetch: rate limiter -> timeout(transport) -> retry with backoff
//!   -> BookSource normalization
//!   -> cache insert, loading state: finish
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::cache::{CacheStats, TtlCache};
use super::error::{CatalogError, CatalogErrorKind};
use super::loading::{LoadingState, LoadingTracker, Operation};
use super::rate_limit::RateLimiter;
use super::retry::RetryPolicy;
use super::sources::{google_books, open_library, BookSource, GoogleBooks, OpenLibrary};
use super::transport::{HttpTransport, Request, Transport};
use crate::domain::{display_author, BookDetails, Book, Source};
use crate::events::Subscription;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Result ordering requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Relevance,
    Newest,
    Oldest,
    Rating,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Rating => "rating",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(Self::Relevance),
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "rating" => Ok(Self::Rating),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// Paging, ordering and backend selection for a search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
    pub sort: SortOrder,
    /// Backend to query; the client's default when `None`
    pub source: Option<Source>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort: SortOrder::default(),
            source: None,
        }
    }
}

impl SearchOptions {
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }
}

/// One page of normalized search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub books: Vec<Book>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
    pub has_more: bool,
}

impl SearchResults {
    fn empty(page: u32) -> Self {
        Self {
            books: Vec::new(),
            total: 0,
            page,
            total_pages: 0,
            has_more: false,
        }
    }

    fn paginate(books: Vec<Book>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
        Self {
            books,
            total,
            page,
            total_pages,
            has_more: page < total_pages,
        }
    }
}

/// Tunables for [`CatalogClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSettings {
    pub default_source: Source,
    pub cache_ttl: Duration,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub open_library_url: String,
    pub google_books_url: String,
    pub google_api_key: Option<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            default_source: Source::OpenLibrary,
            cache_ttl: Duration::from_secs(300),
            rate_limit_requests: 10,
            rate_limit_window: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::with_retries(3),
            open_library_url: open_library::DEFAULT_BASE_URL.to_string(),
            google_books_url: google_books::DEFAULT_BASE_URL.to_string(),
            google_api_key: None,
        }
    }
}

/// Client for the remote book catalogs
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
    sources: HashMap<Source, Arc<dyn BookSource>>,
    default_source: Source,
    search_cache: TtlCache<SearchResults>,
    details_cache: TtlCache<BookDetails>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    timeout: Duration,
    loading: LoadingTracker,
}

impl CatalogClient {
    /// Client talking HTTP to the real backends
    pub fn new(settings: CatalogSettings) -> Self {
        Self::with_transport(settings, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(settings: CatalogSettings, transport: Arc<dyn Transport>) -> Self {
        let mut sources: HashMap<Source, Arc<dyn BookSource>> = HashMap::new();
        sources.insert(
            Source::OpenLibrary,
            Arc::new(OpenLibrary::new(settings.open_library_url.as_str())),
        );
        sources.insert(
            Source::GoogleBooks,
            Arc::new(GoogleBooks::new(
                settings.google_books_url.as_str(),
                settings.google_api_key.clone(),
            )),
        );

        Self {
            transport,
            sources,
            default_source: settings.default_source,
            search_cache: TtlCache::new(settings.cache_ttl),
            details_cache: TtlCache::new(settings.cache_ttl),
            limiter: RateLimiter::new(settings.rate_limit_requests, settings.rate_limit_window),
            retry: settings.retry,
            timeout: settings.timeout,
            loading: LoadingTracker::new(),
        }
    }

    /// Replace the backend registered for `source.source()`
    pub fn register_source(&mut self, source: Arc<dyn BookSource>) {
        self.sources.insert(source.source(), source);
    }

    pub fn default_source(&self) -> Source {
        self.default_source
    }

    /// Search the catalog
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, CatalogError> {
        let query = query.trim();
        let page = options.page.max(1);
        let limit = options.limit.max(1);

        if query.is_empty() {
            return Ok(SearchResults::empty(page));
        }

        let source = options.source.unwrap_or(self.default_source);
        let backend = self.backend(source)?;
        // Page math and the cache key use the page size actually requested
        let limit = match backend.max_page_size() {
            Some(max) => limit.min(max),
            None => limit,
        };

        let key = format!(
            "search:{}:{}:{}:{}:{}",
            source, query, page, limit, options.sort
        );

        if let Some(cached) = self.search_cache.get(&key) {
            return Ok(cached);
        }

        let options = SearchOptions {
            page,
            limit,
            sort: options.sort,
            source: Some(source),
        };

        let loading = self.loading.begin(Operation::Search);
        let result = self.search_uncached(&**backend, query, &options).await;
        loading.finish(result.as_ref().err());

        let results = result?;
        info!(
            source = %source,
            query,
            total = results.total,
            returned = results.books.len(),
            "Catalog search"
        );
        self.search_cache.insert(key, results.clone());
        Ok(results)
    }

    async fn search_uncached(
        &self,
        backend: &dyn BookSource,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, CatalogError> {
        let body = self.fetch(&backend.search_request(query, options)).await?;
        let page = backend.parse_search(&body)?;

        Ok(SearchResults::paginate(
            page.books,
            page.total,
            options.page,
            options.limit,
        ))
    }

    /// Fetch the detail record for one book
    pub async fn get_details(
        &self,
        id: &str,
        source: Option<Source>,
    ) -> Result<BookDetails, CatalogError> {
        let source = source.unwrap_or(self.default_source);
        let key = format!("details:{}:{}", source, id);

        if let Some(cached) = self.details_cache.get(&key) {
            return Ok(cached);
        }

        let loading = self.loading.begin(Operation::BookDetails);
        let result = self.details_uncached(source, id).await;
        loading.finish(result.as_ref().err());

        let details = result?;
        self.details_cache.insert(key, details.clone());
        Ok(details)
    }

    async fn details_uncached(&self, source: Source, id: &str) -> Result<BookDetails, CatalogError> {
        if id.trim().is_empty() {
            return Err(CatalogError::new(CatalogErrorKind::NotFound));
        }

        let backend = self.backend(source)?;
        let body = self.fetch(&backend.details_request(id)).await?;
        let mut details = backend.parse_details(id, &body)?;

        let mut names = Vec::new();
        for request in backend.author_requests(&body) {
            match self.fetch(&request).await {
                Ok(author) => names.extend(backend.parse_author(&author)),
                Err(e) => warn!(url = %request.url, error = %e, "Author lookup failed, skipping"),
            }
        }

        if !names.is_empty() {
            details.book.author = display_author(&names);
            details.book.authors = names.clone();
            details.author_names = names;
        }

        Ok(details)
    }

    pub fn clear_cache(&self) {
        self.search_cache.clear();
        self.details_cache.clear();
        debug!("Catalog cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.search_cache.stats().merge(self.details_cache.stats())
    }

    pub fn loading_state(&self) -> LoadingState {
        self.loading.snapshot()
    }

    pub fn subscribe_to_loading_state<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LoadingState) + Send + Sync + 'static,
    {
        self.loading.subscribe(listener)
    }

    fn backend(&self, source: Source) -> Result<&Arc<dyn BookSource>, CatalogError> {
        self.sources.get(&source).ok_or_else(|| {
            CatalogError::new(CatalogErrorKind::Unknown)
                .with_message(format!("No catalog backend registered for {}", source))
        })
    }

    /// One logical request: rate limited, bounded by the timeout, and
    /// retried with backoff unless the failure is final
    async fn fetch(&self, request: &Request) -> Result<Value, CatalogError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter.acquire().await;

            let result = match tokio::time::timeout(self.timeout, self.transport.get_json(request)).await {
                Ok(result) => result,
                Err(_) => Err(CatalogError::timeout(self.timeout)),
            };

            match result {
                Ok(body) => return Ok(body),
                Err(e) if e.kind.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        url = %request.url,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Catalog request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(url = %request.url, attempt, kind = ?e.kind, "Catalog request failed");
                    return Err(e);
                }
            }
        }
    }
}
