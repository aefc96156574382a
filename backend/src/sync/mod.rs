//! Pulls the external catalog into the local `products` table.
//!
//! Pages are requested with an increasing `skip` until the offset reaches
//! the total the catalog reports. A record that cannot be decoded or
//! stored is logged and skipped; a page that cannot be fetched ends the
//! run with whatever was synced up to that point.

use std::future::Future;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::client::{CatalogSource, ClientError};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{ExternalProduct, Product};

/// Write side of the sync: insert-or-update keyed by external id.
pub trait ProductStore {
    fn upsert(&self, product: &ExternalProduct) -> impl Future<Output = AppResult<Product>> + Send;
}

impl ProductStore for PgPool {
    async fn upsert(&self, product: &ExternalProduct) -> AppResult<Product> {
        db::upsert_product(self, &Product::from_external(product, None)).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Product {0} not found in catalog")]
    NotFound(i64),

    #[error(transparent)]
    Fetch(#[from] ClientError),

    #[error("catalog record could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] AppError),
}

/// Outcome of a full catalog sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Records upserted successfully.
    pub synced: u64,
    /// Records skipped because they could not be decoded or stored.
    pub failed: u64,
    /// Pages fetched successfully.
    pub pages: u64,
    /// Total the catalog reported on its last page.
    pub total_reported: u64,
    /// Why the run stopped early, if it did.
    pub aborted: Option<String>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    pub fn message(&self) -> String {
        match &self.aborted {
            None => format!("Successfully synced {} products", self.synced),
            Some(reason) => format!(
                "Sync aborted after {} products: {}",
                self.synced, reason
            ),
        }
    }
}

pub struct Syncer<'a, S, R> {
    source: &'a S,
    store: &'a R,
}

impl<'a, S, R> Syncer<'a, S, R>
where
    S: CatalogSource + Sync,
    R: ProductStore + Sync,
{
    pub fn new(source: &'a S, store: &'a R) -> Self {
        Self { source, store }
    }

    pub async fn sync_all(&self, page_size: u32) -> SyncReport {
        let page_size = page_size.max(1);
        let mut report = SyncReport::default();
        let mut skip: u64 = 0;

        info!(page_size, "Starting catalog sync");

        loop {
            let page = match self.source.fetch_page(page_size, skip).await {
                Ok(page) => page,
                Err(e) => {
                    error!(skip, error = %e, synced = report.synced, "Failed to fetch catalog page");
                    report.aborted = Some(e.to_string());
                    break;
                }
            };

            report.pages += 1;
            report.total_reported = page.total;
            debug!(
                skip = page.skip,
                limit = page.limit,
                received = page.products.len(),
                total = page.total,
                "Fetched catalog page"
            );

            if page.products.is_empty() {
                break;
            }

            for raw in page.products {
                match self.upsert_raw(raw).await {
                    Ok(product) => {
                        report.synced += 1;
                        debug!(api_id = product.api_id, "Upserted product");
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(error = %e, "Skipping catalog record");
                    }
                }
            }

            skip += u64::from(page_size);
            if skip >= page.total {
                break;
            }
        }

        info!(
            synced = report.synced,
            failed = report.failed,
            pages = report.pages,
            total_reported = report.total_reported,
            complete = report.is_complete(),
            "Catalog sync finished"
        );
        report
    }

    pub async fn sync_one(&self, api_id: i64) -> Result<Product, SyncError> {
        let raw = self
            .source
            .fetch_product(api_id)
            .await?
            .ok_or(SyncError::NotFound(api_id))?;

        let product = self.upsert_raw(raw).await?;
        info!(api_id, title = %product.title, "Synced product");
        Ok(product)
    }

    async fn upsert_raw(&self, raw: serde_json::Value) -> Result<Product, SyncError> {
        let external: ExternalProduct = serde_json::from_value(raw)?;
        Ok(self.store.upsert(&external).await?)
    }
}
