//! Normalized catalog errors.
//!
//! Every failure that can happen while talking to a remote catalog (network,
//! timeout, HTTP status, malformed body) is mapped to a [`CatalogErrorKind`]
//! with a message suitable for showing to the reader.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Fixed set of catalog failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogErrorKind {
    Network,
    RateLimited,
    NotFound,
    InvalidResponse,
    Timeout,
    Unknown,
}

impl CatalogErrorKind {
    /// Default user-facing message for this kind
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network => "Unable to reach the book catalog. Check your connection and try again.",
            Self::RateLimited => "Too many requests. Please wait a moment and try again.",
            Self::NotFound => "The requested book could not be found.",
            Self::InvalidResponse => "The book catalog returned an unexpected response.",
            Self::Timeout => "The book catalog took too long to respond.",
            Self::Unknown => "Something went wrong while contacting the book catalog.",
        }
    }

    /// A definitive absence is never retried
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Non-success HTTP status returned by a catalog
#[derive(Debug, Clone, Error)]
#[error("HTTP {status} from {url}")]
pub struct HttpStatusError {
    pub status: u16,
    pub url: String,
}

/// A response body that didn't have the expected shape
#[derive(Debug, Clone, Error)]
#[error("malformed response: {0}")]
pub struct MalformedResponse(pub String);

/// A catalog failure with its kind, display message and underlying cause
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CatalogError {
    pub kind: CatalogErrorKind,
    pub message: String,
    #[source]
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl CatalogError {
    /// Error of `kind` carrying that kind's default message
    pub fn new(kind: CatalogErrorKind) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            cause: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(CatalogErrorKind::Timeout).with_message(format!(
            "The book catalog did not respond within {} seconds.",
            after.as_secs_f64()
        ))
    }

    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::InvalidResponse).with_cause(MalformedResponse(detail.into()))
    }

    /// Map a non-success HTTP status
    pub fn from_status(status: u16, url: &str) -> Self {
        let kind = match status {
            404 => CatalogErrorKind::NotFound,
            429 => CatalogErrorKind::RateLimited,
            500..=599 => CatalogErrorKind::Network,
            _ => CatalogErrorKind::Unknown,
        };
        Self::new(kind).with_cause(HttpStatusError {
            status,
            url: url.to_string(),
        })
    }

    /// Map a transport-level `reqwest` failure
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            return Self::from_status(status.as_u16(), &url).with_cause(err);
        }

        let kind = if err.is_timeout() {
            CatalogErrorKind::Timeout
        } else if err.is_decode() {
            CatalogErrorKind::InvalidResponse
        } else if err.is_connect() || err.is_request() || err.is_body() {
            CatalogErrorKind::Network
        } else {
            CatalogErrorKind::Unknown
        };
        Self::new(kind).with_cause(err)
    }
}
