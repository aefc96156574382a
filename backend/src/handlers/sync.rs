use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    db,
    error::{AppError, AppResult},
    extract::{ApiPath, ApiQuery},
    metrics::MetricEntry,
    sync::Syncer,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    /// Records per catalog page (default: SYNC_PAGE_SIZE)
    pub limit: Option<u32>,
}

// ── POST /api/products/sync ───────────────────────────────────────────────────

pub async fn sync_all(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SyncParams>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let limit = params.limit.unwrap_or(state.sync_page_size);
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be > 0".to_string()));
    }

    let start = Instant::now();
    let report = Syncer::new(&state.catalog, &state.db).sync_all(limit).await;
    let elapsed = start.elapsed();

    state.metrics.write().await.record(MetricEntry::new(
        "sync_all",
        "catalog",
        elapsed,
        report.synced as usize,
        report.is_complete(),
        report.aborted.clone(),
    ));

    if !report.is_complete() {
        warn!(synced = report.synced, "Sync request ended early");
        return Ok((
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({
                "success": false,
                "message": report.message(),
                "total": report.synced,
                "failed": report.failed,
                "pages": report.pages,
            })),
        ));
    }

    let total_in_db = db::count_products(&state.db).await?;
    info!(
        synced = report.synced,
        failed = report.failed,
        total_in_db,
        sync_ms = elapsed.as_millis(),
        "Sync request complete"
    );

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": report.message(),
            "total": report.synced,
            "failed": report.failed,
            "pages": report.pages,
            "total_in_db": total_in_db,
            "sync_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── POST /api/products/sync/:api_id ───────────────────────────────────────────

pub async fn sync_one(
    State(state): State<AppState>,
    ApiPath(api_id): ApiPath<i64>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let result = Syncer::new(&state.catalog, &state.db).sync_one(api_id).await;
    let elapsed = start.elapsed();

    state.metrics.write().await.record(MetricEntry::new(
        "sync_one",
        "catalog",
        elapsed,
        usize::from(result.is_ok()),
        result.is_ok(),
        result.as_ref().err().map(ToString::to_string),
    ));

    let product = result.map_err(|e| {
        warn!(api_id, error = %e, "Single product sync failed");
        AppError::from(e)
    })?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": "Product synced successfully",
            "data": product,
        })),
    ))
}
