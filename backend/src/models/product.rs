use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

// ── Upstream catalog shapes ──────────────────────────────────────────────────

/// One product as returned by the external catalog API.
///
/// Nested blobs (`dimensions`, `reviews`, `meta`) are kept as raw JSON and
/// stored verbatim, so upstream additions survive the round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProduct {
    /// External id, the natural key for upserts.
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub discount_percentage: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub stock: Option<i32>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<serde_json::Value>,
    #[serde(default)]
    pub warranty_information: Option<String>,
    #[serde(default)]
    pub shipping_information: Option<String>,
    #[serde(default)]
    pub availability_status: Option<String>,
    #[serde(default)]
    pub reviews: Option<serde_json::Value>,
    #[serde(default)]
    pub return_policy: Option<String>,
    #[serde(default)]
    pub minimum_order_quantity: Option<i32>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// One page of `GET /products?limit&skip`.
///
/// Records stay as raw JSON so a single malformed entry can be skipped
/// without losing the rest of the page.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    pub products: Vec<serde_json::Value>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
}

// ── Stored entity ────────────────────────────────────────────────────────────

/// Local copy of a catalog entry, one row per external id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub api_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: f64,
    pub discount_percentage: f64,
    pub rating: f64,
    pub stock: i32,
    pub sku: Option<String>,
    pub weight: Option<f64>,
    pub dimensions: Option<Json<serde_json::Value>>,
    pub warranty_information: Option<String>,
    pub shipping_information: Option<String>,
    pub availability_status: Option<String>,
    pub reviews: Option<Json<serde_json::Value>>,
    pub return_policy: Option<String>,
    pub minimum_order_quantity: i32,
    pub meta: Option<Json<serde_json::Value>>,
    pub images: Option<Json<Vec<String>>>,
    pub thumbnail: Option<String>,
    pub tags: Option<Json<Vec<String>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Build the row an upsert of `ext` would leave behind, keeping the
    /// identity and creation time of `existing` when there is one.
    pub fn from_external(ext: &ExternalProduct, existing: Option<&Product>) -> Self {
        let now = Utc::now();
        Self {
            id: existing.map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            api_id: ext.id,
            title: ext.title.clone(),
            description: ext.description.clone(),
            category: ext.category.clone(),
            brand: ext.brand.clone(),
            price: ext.price.unwrap_or(0.0),
            discount_percentage: ext.discount_percentage.unwrap_or(0.0),
            rating: ext.rating.unwrap_or(0.0),
            stock: ext.stock.unwrap_or(0),
            sku: ext.sku.clone(),
            weight: ext.weight,
            dimensions: ext.dimensions.clone().map(Json),
            warranty_information: ext.warranty_information.clone(),
            shipping_information: ext.shipping_information.clone(),
            availability_status: ext.availability_status.clone(),
            reviews: ext.reviews.clone().map(Json),
            return_policy: ext.return_policy.clone(),
            minimum_order_quantity: ext.minimum_order_quantity.unwrap_or(1),
            meta: ext.meta.clone().map(Json),
            images: ext.images.clone().map(Json),
            thumbnail: ext.thumbnail.clone(),
            tags: ext.tags.clone().map(Json),
            created_at: existing.map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

// ── Query parameters ──────────────────────────────────────────────────────────

pub const DEFAULT_PER_PAGE: i64 = 15;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Deserialize, Default)]
pub struct ProductFilters {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ProductFilters {
    pub fn per_page(&self) -> i64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// 1-based page number.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }

    /// `ILIKE` pattern for the free-text search, if any.
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s))
    }
}

// ── Responses ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, filters: &ProductFilters, total: i64) -> Self {
        let per_page = filters.per_page();
        Self {
            data,
            current_page: filters.page(),
            per_page,
            total,
            last_page: last_page(total, per_page),
        }
    }
}

/// Number of the last page; an empty table still has page 1.
pub fn last_page(total: i64, per_page: i64) -> i64 {
    if total <= 0 || per_page <= 0 {
        return 1;
    }
    (total + per_page - 1) / per_page
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProductStats {
    pub total_products: i64,
    pub total_categories: i64,
    pub total_brands: i64,
    pub average_price: Option<f64>,
    pub average_rating: Option<f64>,
    pub total_stock: Option<i64>,
    pub out_of_stock: i64,
}
