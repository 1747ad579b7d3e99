//! Remote book catalogs.
//!
//! [`CatalogClient`] fronts two backends (Open Library and Google Books)
//! behind one normalized [`Book`](crate::domain::Book) model, with:
//!
//! - a TTL response cache ([`cache`])
//! - a fixed-window rate limiter ([`rate_limit`])
//! - a per-request timeout and exponential-backoff retry ([`retry`])
//! - normalized errors ([`error`])
//! - observable loading state ([`loading`])

pub mod cache;
pub mod client;
pub mod error;
pub mod loading;
pub mod rate_limit;
pub mod retry;
pub mod sources;
pub mod transport;

pub use cache::{CacheStats, TtlCache};
pub use client::{CatalogClient, CatalogSettings, SearchOptions, SearchResults, SortOrder};
pub use error::{CatalogError, CatalogErrorKind};
pub use loading::{LoadingState, Operation, OperationState};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use sources::{BookSource, GoogleBooks, OpenLibrary, SearchPage};
pub use transport::{HttpTransport, Request, Transport};
