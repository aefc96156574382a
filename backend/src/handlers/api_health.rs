use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::{
    error::AppResult,
    health::DEFAULT_UPTIME_WINDOW,
    metrics::MetricEntry,
    models::{HealthCheckResult, HistoryReport},
    AppState,
};

/// Entries returned by the history endpoint.
const HISTORY_PAGE: usize = 50;

// ── GET /api/api-health ───────────────────────────────────────────────────────

/// Latest cached result, or a fresh probe when the cache is cold.
pub async fn current_health(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if let Some(cached) = state.health.cached_health() {
        return Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "cached": true, "data": cached })),
        ));
    }

    let result = probe(&state).await;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "cached": false, "data": result })),
    ))
}

// ── POST /api/api-health/check ────────────────────────────────────────────────

pub async fn force_check(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let result = probe(&state).await;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": result })),
    ))
}

// ── GET /api/api-health/comprehensive ─────────────────────────────────────────

pub async fn comprehensive(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let report = state.health.comprehensive_check().await;

    {
        let mut metrics = state.metrics.write().await;
        for (name, endpoint) in &report.endpoints {
            metrics.record(MetricEntry::new(
                format!("probe:{name}"),
                state.health.api_name(),
                Duration::from_secs_f64(endpoint.response_time_ms / 1000.0),
                1,
                endpoint.status.is_up(),
                endpoint.error.clone(),
            ));
        }
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": report })),
    ))
}

// ── GET /api/api-health/history ───────────────────────────────────────────────

pub async fn history(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let history = state.health.history(HISTORY_PAGE);
    let report = HistoryReport {
        uptime_percentage: state.health.compute_uptime(DEFAULT_UPTIME_WINDOW),
        total_checks: history.len(),
        history,
    };

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": report })),
    ))
}

// ── DELETE /api/api-health/history ────────────────────────────────────────────

pub async fn clear_history(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let cleared = state.health.clear_history();
    info!(api_name = %state.health.api_name(), cleared, "Health history cleared");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "cleared": cleared })),
    ))
}

// ── GET /api/api-health/stats ─────────────────────────────────────────────────

pub async fn stats(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": state.health.stats() })),
    ))
}

async fn probe(state: &AppState) -> HealthCheckResult {
    let result = state.health.check_health().await;

    state.metrics.write().await.record(MetricEntry::new(
        "probe",
        result.api_name.clone(),
        Duration::from_secs_f64(result.response_time_ms / 1000.0),
        1,
        result.status.is_up(),
        result.error.clone(),
    ));

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::Method;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::handlers::testing::{call, state_for};

    async fn healthy_catalog() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "title": "x" })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let server = healthy_catalog().await;
        let state = state_for(&server.uri());

        let (status, body) = call(state.clone(), Method::GET, "/api/api-health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cached"], false);
        assert_eq!(body["data"]["status"], "up");

        let (_, body) = call(state.clone(), Method::GET, "/api/api-health").await;
        assert_eq!(body["cached"], true);
        assert_eq!(body["data"]["api_name"], "dummyjson");

        assert_eq!(state.metrics.read().await.len(), 1);
    }

    #[tokio::test]
    async fn history_and_stats_reflect_checks() {
        let server = healthy_catalog().await;
        let state = state_for(&server.uri());

        for _ in 0..3 {
            call(state.clone(), Method::POST, "/api/api-health/check").await;
        }

        let (_, body) = call(state.clone(), Method::GET, "/api/api-health/history").await;
        assert_eq!(body["data"]["total_checks"], 3);
        assert_eq!(body["data"]["uptime_percentage"], 100.0);
        assert_eq!(body["data"]["history"].as_array().unwrap().len(), 3);

        let (_, body) = call(state, Method::GET, "/api/api-health/stats").await;
        assert_eq!(body["data"]["successful_checks"], 3);
        assert_eq!(body["data"]["failed_checks"], 0);
    }

    #[tokio::test]
    async fn stats_without_history() {
        let state = state_for("http://127.0.0.1:1");
        let (status, body) = call(state, Method::GET, "/api/api-health/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["uptime_percentage"], 100.0);
        assert_eq!(body["data"]["total_checks"], 0);
    }

    #[tokio::test]
    async fn unreachable_catalog_still_answers_ok_envelope() {
        let state = state_for("http://127.0.0.1:1");
        let (status, body) = call(state, Method::POST, "/api/api-health/check").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "down");
        assert_eq!(body["data"]["status_code"], 0);
    }
}
