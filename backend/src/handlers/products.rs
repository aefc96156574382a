use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    db,
    error::AppResult,
    extract::{ApiPath, ApiQuery},
    models::ProductFilters,
    AppState,
};

// ── GET /api/products ─────────────────────────────────────────────────────────

pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(filters): ApiQuery<ProductFilters>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let page = db::fetch_products(&state.db, &filters).await?;
    let elapsed = start.elapsed();

    info!(
        count = page.data.len(),
        total = page.total,
        page = page.current_page,
        elapsed_ms = elapsed.as_millis(),
        "Listed products"
    );

    state
        .metrics
        .write()
        .await
        .record_raw("db_query:list", "db", elapsed, page.data.len());

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "data": page.data,
            "current_page": page.current_page,
            "per_page": page.per_page,
            "total": page.total,
            "last_page": page.last_page,
            "query_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── GET /api/products/:id ─────────────────────────────────────────────────────

pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let product = db::fetch_product_by_id(&state.db, id).await?;
    let elapsed = start.elapsed();

    state
        .metrics
        .write()
        .await
        .record_raw("db_query:get", "db", elapsed, 1);

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": product })),
    ))
}

// ── GET /api/products/categories ──────────────────────────────────────────────

pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let categories = db::fetch_categories(&state.db).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": categories })),
    ))
}

// ── GET /api/products/stats ───────────────────────────────────────────────────

pub async fn product_stats(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let stats = db::fetch_stats(&state.db).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": stats })),
    ))
}
