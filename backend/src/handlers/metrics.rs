use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::{error::AppResult, AppState};

// ── GET /api/metrics ──────────────────────────────────────────────────────────

pub async fn get_metrics(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let metrics = state.metrics.read().await;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "entry_count": metrics.len(),
            "aggregated": metrics.aggregated(),
        })),
    ))
}

// ── GET /api/metrics/export/csv ───────────────────────────────────────────────

pub async fn export_csv(State(state): State<AppState>) -> AppResult<Response> {
    let csv = state.metrics.read().await.to_csv()?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"operation_metrics.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

// ── DELETE /api/metrics ───────────────────────────────────────────────────────

pub async fn clear_metrics(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let cleared = state.metrics.write().await.clear();

    info!(cleared, "Operation metrics cleared");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "cleared": cleared })),
    ))
}
