//! HTTP transport for catalog backends.
//!
//! The client only ever issues JSON GET requests, so the transport seam is a
//! single method. Tests substitute a scripted implementation.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::error::CatalogError;

const USER_AGENT: &str = concat!("readshelf/", env!("CARGO_PKG_VERSION"));

/// A GET request with query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Value of a query parameter, if set
    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Something that can fetch JSON documents
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, request: &Request) -> Result<Value, CatalogError>;
}

/// [`Transport`] over `reqwest`
pub struct HttpTransport {
    client: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, request: &Request) -> Result<Value, CatalogError> {
        debug!(url = %request.url, "Catalog request");

        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .await
            .map_err(CatalogError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::from_status(status.as_u16(), &request.url));
        }

        response
            .json::<Value>()
            .await
            .map_err(CatalogError::from_reqwest)
    }
}
