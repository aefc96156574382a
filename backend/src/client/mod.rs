use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::models::CatalogPage;

/// Failure talking to the external catalog, classified by kind.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Timeout, refused connection, TLS failure, ...
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog returned HTTP {0}")]
    Status(u16),

    #[error("unexpected catalog response: {0}")]
    Decode(String),
}

/// Read side of the external product catalog.
pub trait CatalogSource {
    /// `GET /products?limit&skip`
    fn fetch_page(
        &self,
        limit: u32,
        skip: u64,
    ) -> impl Future<Output = Result<CatalogPage, ClientError>> + Send;

    /// `GET /products/{id}`. `Ok(None)` when the catalog answers 404.
    fn fetch_product(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, ClientError>> + Send;
}

/// HTTP client for the DummyJSON-style catalog API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CatalogSource for CatalogClient {
    async fn fetch_page(&self, limit: u32, skip: u64) -> Result<CatalogPage, ClientError> {
        let url = format!("{}/products", self.base_url);
        debug!(%url, limit, skip, "Fetching catalog page");

        let response = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string()), ("skip", skip.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), limit, skip, "Catalog page request failed");
            return Err(ClientError::Status(status.as_u16()));
        }

        response
            .json::<CatalogPage>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn fetch_product(&self, id: i64) -> Result<Option<serde_json::Value>, ClientError> {
        let url = format!("{}/products/{}", self.base_url, id);
        debug!(%url, "Fetching catalog product");

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), api_id = id, "Catalog product request failed");
            return Err(ClientError::Status(status.as_u16()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map(Some)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}
