//! Availability probes for the external catalog API.
//!
//! Every probe is a single timed GET. Results of the primary probe are
//! appended to a capacity-bounded history and the latest one is cached
//! for a short time; both live in the [`MemoryCache`] handed to the
//! monitor. Concurrent writers race on the history, last write wins.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info};

use crate::cache::MemoryCache;
use crate::models::*;

pub const HISTORY_CAPACITY: usize = 100;
pub const HISTORY_TTL: Duration = Duration::from_secs(60 * 60);
pub const LATEST_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_UPTIME_WINDOW: usize = 100;

#[derive(Debug, Clone)]
pub struct ProbeEndpoint {
    pub name: String,
    pub url: String,
}

impl ProbeEndpoint {
    fn new(name: &str, url: String) -> Self {
        Self {
            name: name.to_string(),
            url,
        }
    }
}

#[derive(Clone)]
pub struct HealthMonitor {
    http: reqwest::Client,
    cache: MemoryCache,
    api_name: String,
    probe_url: String,
    endpoints: Vec<ProbeEndpoint>,
}

impl HealthMonitor {
    /// Monitor for a DummyJSON-style catalog rooted at `base_url`.
    pub fn new(
        api_name: impl Into<String>,
        base_url: &str,
        timeout: Duration,
        cache: MemoryCache,
    ) -> Result<Self, reqwest::Error> {
        let base = base_url.trim_end_matches('/');
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            cache,
            api_name: api_name.into(),
            probe_url: format!("{base}/products/1"),
            endpoints: vec![
                ProbeEndpoint::new("products", format!("{base}/products/1")),
                ProbeEndpoint::new("categories", format!("{base}/products/categories")),
                ProbeEndpoint::new("search", format!("{base}/products/search?q=phone")),
            ],
        })
    }

    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    fn latest_key(&self) -> String {
        format!("api_health_{}", self.api_name)
    }

    fn history_key(&self) -> String {
        format!("api_health_{}_history", self.api_name)
    }

    // ── Probes ────────────────────────────────────────────────────────────────

    /// Probe the primary endpoint, record the result in the history and
    /// refresh the cached latest result.
    pub async fn check_health(&self) -> HealthCheckResult {
        let start = Instant::now();

        let (status, status_code, error) = match self.http.get(&self.probe_url).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                if response.status().is_success() {
                    match response.json::<serde_json::Value>().await {
                        Ok(body) if has_expected_shape(&body) => (HealthStatus::Up, code, None),
                        _ => (
                            HealthStatus::Degraded,
                            code,
                            Some("Invalid response structure".to_string()),
                        ),
                    }
                } else {
                    (HealthStatus::Down, code, Some(format!("HTTP {code}")))
                }
            }
            Err(e) => {
                error!(
                    api_name = %self.api_name,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Health probe failed"
                );
                (HealthStatus::Down, 0, Some(e.to_string()))
            }
        };

        let result = HealthCheckResult {
            api_name: self.api_name.clone(),
            status,
            status_code,
            response_time_ms: elapsed_ms(start),
            checked_at: Utc::now(),
            error,
        };

        info!(
            api_name = %result.api_name,
            status = %result.status,
            status_code = result.status_code,
            response_time_ms = result.response_time_ms,
            "Health check complete"
        );

        self.cache.put(self.latest_key(), &result, LATEST_TTL);
        self.record_history(&result);
        result
    }

    /// Probe every named endpoint in turn. The aggregate is the worst
    /// outcome: a non-2xx endpoint makes it `degraded`, a transport
    /// failure makes it `down`.
    pub async fn comprehensive_check(&self) -> ComprehensiveReport {
        let mut endpoints = BTreeMap::new();
        let mut overall = HealthStatus::Up;

        for endpoint in &self.endpoints {
            let (result, contribution) = self.probe_endpoint(endpoint).await;
            debug!(
                endpoint = %endpoint.name,
                status = %result.status,
                status_code = result.status_code,
                "Endpoint probed"
            );
            overall = overall.max(contribution);
            endpoints.insert(endpoint.name.clone(), result);
        }

        info!(api_name = %self.api_name, overall = %overall, "Comprehensive health check complete");

        ComprehensiveReport {
            api_name: self.api_name.clone(),
            overall_status: overall,
            endpoints,
            checked_at: Utc::now(),
        }
    }

    async fn probe_endpoint(&self, endpoint: &ProbeEndpoint) -> (EndpointResult, HealthStatus) {
        let start = Instant::now();
        match self.http.get(&endpoint.url).send().await {
            Ok(response) if response.status().is_success() => (
                EndpointResult {
                    status: HealthStatus::Up,
                    status_code: response.status().as_u16(),
                    response_time_ms: elapsed_ms(start),
                    error: None,
                },
                HealthStatus::Up,
            ),
            Ok(response) => (
                EndpointResult {
                    status: HealthStatus::Down,
                    status_code: response.status().as_u16(),
                    response_time_ms: elapsed_ms(start),
                    error: None,
                },
                HealthStatus::Degraded,
            ),
            Err(e) => {
                error!(endpoint = %endpoint.name, error = %e, "Endpoint probe failed");
                (
                    EndpointResult {
                        status: HealthStatus::Down,
                        status_code: 0,
                        response_time_ms: elapsed_ms(start),
                        error: Some(e.to_string()),
                    },
                    HealthStatus::Down,
                )
            }
        }
    }

    // ── Cache-backed views ────────────────────────────────────────────────────

    /// Latest result, if one was recorded within [`LATEST_TTL`].
    pub fn cached_health(&self) -> Option<HealthCheckResult> {
        self.cache.get(&self.latest_key())
    }

    pub fn record_history(&self, result: &HealthCheckResult) {
        let key = self.history_key();
        let mut history: Vec<HistoryEntry> = self.cache.get(&key).unwrap_or_default();
        push_capped(&mut history, HistoryEntry::from(result), HISTORY_CAPACITY);
        self.cache.put(key, &history, HISTORY_TTL);
    }

    /// Up to `limit` most recent history entries, oldest first.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let history: Vec<HistoryEntry> = self.cache.get(&self.history_key()).unwrap_or_default();
        most_recent(history, limit)
    }

    /// Drop the history and the cached latest result. Returns whether
    /// there was any history to drop.
    pub fn clear_history(&self) -> bool {
        let key = self.history_key();
        let existed = self.cache.has(&key);
        self.cache.forget(&key);
        self.cache.forget(&self.latest_key());
        existed
    }

    pub fn compute_uptime(&self, window: usize) -> f64 {
        uptime_percentage(&self.history(window))
    }

    pub fn stats(&self) -> UptimeStats {
        uptime_stats(&self.history(DEFAULT_UPTIME_WINDOW))
    }
}

// ── Pure helpers ──────────────────────────────────────────────────────────────

/// A catalog product body must at least carry `id` and `title`.
pub fn has_expected_shape(body: &serde_json::Value) -> bool {
    body.get("id").is_some_and(|v| !v.is_null()) && body.get("title").is_some_and(|v| !v.is_null())
}

pub fn push_capped<T>(items: &mut Vec<T>, item: T, capacity: usize) {
    items.push(item);
    if items.len() > capacity {
        let excess = items.len() - capacity;
        items.drain(..excess);
    }
}

fn most_recent<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if items.len() > limit {
        items.drain(..items.len() - limit);
    }
    items
}

/// Share of `up` entries in percent, 2 decimals. An empty history counts
/// as fully available.
pub fn uptime_percentage(history: &[HistoryEntry]) -> f64 {
    if history.is_empty() {
        return 100.0;
    }
    let up = history.iter().filter(|h| h.status.is_up()).count();
    round2(up as f64 * 100.0 / history.len() as f64)
}

pub fn uptime_stats(history: &[HistoryEntry]) -> UptimeStats {
    let total = history.len();
    let successful = history.iter().filter(|h| h.status.is_up()).count();

    if total == 0 {
        return UptimeStats {
            uptime_percentage: 100.0,
            total_checks: 0,
            successful_checks: 0,
            failed_checks: 0,
            average_response_time_ms: 0.0,
            min_response_time_ms: None,
            max_response_time_ms: None,
        };
    }

    let times = history.iter().map(|h| h.response_time_ms);
    let sum: f64 = times.clone().sum();
    let min = times.clone().fold(f64::INFINITY, f64::min);
    let max = times.fold(f64::NEG_INFINITY, f64::max);

    UptimeStats {
        uptime_percentage: uptime_percentage(history),
        total_checks: total,
        successful_checks: successful,
        failed_checks: total - successful,
        average_response_time_ms: round2(sum / total as f64),
        min_response_time_ms: Some(round2(min)),
        max_response_time_ms: Some(round2(max)),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    round2(start.elapsed().as_secs_f64() * 1000.0)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(status: HealthStatus, ms: f64) -> HistoryEntry {
        HistoryEntry {
            status,
            response_time_ms: ms,
            checked_at: Utc::now(),
        }
    }

    fn result(status: HealthStatus, ms: f64) -> HealthCheckResult {
        HealthCheckResult {
            api_name: "dummyjson".into(),
            status,
            status_code: 200,
            response_time_ms: ms,
            checked_at: Utc::now(),
            error: None,
        }
    }

    fn monitor(base: &str, timeout: Duration) -> HealthMonitor {
        HealthMonitor::new("dummyjson", base, timeout, MemoryCache::new()).unwrap()
    }

    async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(server)
            .await;
    }

    // ── Uptime arithmetic ──────────────────────────────────────────────────────

    #[test]
    fn uptime_of_empty_history_is_full() {
        assert_eq!(uptime_percentage(&[]), 100.0);
    }

    #[test]
    fn uptime_counts_only_up() {
        let h = vec![
            entry(HealthStatus::Up, 1.0),
            entry(HealthStatus::Up, 1.0),
            entry(HealthStatus::Degraded, 1.0),
            entry(HealthStatus::Down, 1.0),
        ];
        assert_eq!(uptime_percentage(&h), 50.0);
    }

    #[test]
    fn uptime_rounds_to_two_decimals() {
        let h = vec![
            entry(HealthStatus::Up, 1.0),
            entry(HealthStatus::Up, 1.0),
            entry(HealthStatus::Down, 1.0),
        ];
        assert_eq!(uptime_percentage(&h), 66.67);
    }

    #[test]
    fn stats_over_history() {
        let h = vec![
            entry(HealthStatus::Up, 100.0),
            entry(HealthStatus::Down, 300.0),
            entry(HealthStatus::Up, 200.0),
            entry(HealthStatus::Up, 50.5),
        ];
        let s = uptime_stats(&h);
        assert_eq!(s.total_checks, 4);
        assert_eq!(s.successful_checks, 3);
        assert_eq!(s.failed_checks, 1);
        assert_eq!(s.uptime_percentage, 75.0);
        assert_eq!(s.average_response_time_ms, 162.63);
        assert_eq!(s.min_response_time_ms, Some(50.5));
        assert_eq!(s.max_response_time_ms, Some(300.0));
    }

    #[test]
    fn stats_of_empty_history() {
        let s = uptime_stats(&[]);
        assert_eq!(s.uptime_percentage, 100.0);
        assert_eq!(s.total_checks, 0);
        assert_eq!(s.min_response_time_ms, None);
    }

    // ── History ────────────────────────────────────────────────────────────────

    #[test]
    fn push_capped_drops_oldest() {
        let mut v: Vec<u32> = (0..100).collect();
        push_capped(&mut v, 100, 100);
        assert_eq!(v.len(), 100);
        assert_eq!(v.first(), Some(&1));
        assert_eq!(v.last(), Some(&100));
    }

    #[test]
    fn history_never_exceeds_capacity() {
        let m = monitor("http://127.0.0.1:1", Duration::from_secs(1));
        for i in 0..=HISTORY_CAPACITY {
            m.record_history(&result(HealthStatus::Up, i as f64));
        }
        let h = m.history(usize::MAX);
        assert_eq!(h.len(), HISTORY_CAPACITY);
        assert_eq!(h[0].response_time_ms, 1.0, "the oldest entry must be evicted");
        assert_eq!(h[HISTORY_CAPACITY - 1].response_time_ms, HISTORY_CAPACITY as f64);
    }

    #[test]
    fn uptime_window_uses_most_recent_entries() {
        let m = monitor("http://127.0.0.1:1", Duration::from_secs(1));
        for _ in 0..5 {
            m.record_history(&result(HealthStatus::Down, 1.0));
        }
        for _ in 0..5 {
            m.record_history(&result(HealthStatus::Up, 1.0));
        }
        assert_eq!(m.compute_uptime(5), 100.0);
        assert_eq!(m.compute_uptime(DEFAULT_UPTIME_WINDOW), 50.0);
        assert_eq!(m.history(3).len(), 3);
    }

    #[test]
    fn clear_history_resets_uptime() {
        let m = monitor("http://127.0.0.1:1", Duration::from_secs(1));
        assert!(!m.clear_history());
        m.record_history(&result(HealthStatus::Down, 1.0));
        assert_eq!(m.compute_uptime(DEFAULT_UPTIME_WINDOW), 0.0);
        assert!(m.clear_history());
        assert!(m.history(10).is_empty());
        assert_eq!(m.compute_uptime(DEFAULT_UPTIME_WINDOW), 100.0);
    }

    #[test]
    fn payload_shape() {
        assert!(has_expected_shape(&json!({ "id": 1, "title": "x" })));
        assert!(!has_expected_shape(&json!({ "id": 1 })));
        assert!(!has_expected_shape(&json!({ "id": null, "title": "x" })));
        assert!(!has_expected_shape(&json!([1, 2])));
    }

    // ── check_health ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn healthy_catalog_is_up_and_cached() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/products/1",
            ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "title": "Mascara" })),
        )
        .await;

        let m = monitor(&server.uri(), Duration::from_secs(5));
        assert!(m.cached_health().is_none());

        let r = m.check_health().await;
        assert_eq!(r.status, HealthStatus::Up);
        assert_eq!(r.status_code, 200);
        assert!(r.error.is_none());
        assert!(r.response_time_ms >= 0.0);

        assert_eq!(m.cached_health(), Some(r));
        assert_eq!(m.history(10).len(), 1);
        assert_eq!(m.compute_uptime(DEFAULT_UPTIME_WINDOW), 100.0);
    }

    #[tokio::test]
    async fn unexpected_payload_is_degraded() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/products/1",
            ResponseTemplate::new(200).set_body_json(json!({ "message": "maintenance" })),
        )
        .await;

        let r = monitor(&server.uri(), Duration::from_secs(5)).check_health().await;
        assert_eq!(r.status, HealthStatus::Degraded);
        assert_eq!(r.status_code, 200);
        assert_eq!(r.error.as_deref(), Some("Invalid response structure"));
    }

    #[tokio::test]
    async fn non_json_body_is_degraded() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/products/1",
            ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
        )
        .await;

        let r = monitor(&server.uri(), Duration::from_secs(5)).check_health().await;
        assert_eq!(r.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn server_error_is_down() {
        let server = MockServer::start().await;
        mount(&server, "/products/1", ResponseTemplate::new(500)).await;

        let m = monitor(&server.uri(), Duration::from_secs(5));
        let r = m.check_health().await;
        assert_eq!(r.status, HealthStatus::Down);
        assert_eq!(r.status_code, 500);
        assert_eq!(r.error.as_deref(), Some("HTTP 500"));
        assert_eq!(m.compute_uptime(DEFAULT_UPTIME_WINDOW), 0.0);
    }

    #[tokio::test]
    async fn unreachable_catalog_is_down_with_error() {
        let m = monitor("http://127.0.0.1:1", Duration::from_secs(2));
        let r = m.check_health().await;
        assert_eq!(r.status, HealthStatus::Down);
        assert_eq!(r.status_code, 0);
        assert!(r.error.is_some());
        assert_eq!(m.history(10).len(), 1);
    }

    #[tokio::test]
    async fn slow_catalog_times_out_as_down() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/products/1",
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 1, "title": "late" }))
                .set_delay(Duration::from_millis(500)),
        )
        .await;

        let r = monitor(&server.uri(), Duration::from_millis(50)).check_health().await;
        assert_eq!(r.status, HealthStatus::Down);
        assert_eq!(r.status_code, 0);
        assert!(r.response_time_ms >= 40.0);
    }

    // ── comprehensive_check ────────────────────────────────────────────────────

    async fn catalog_with(products: ResponseTemplate, categories: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        mount(&server, "/products/1", products).await;
        mount(&server, "/products/categories", categories).await;
        mount(
            &server,
            "/products/search",
            ResponseTemplate::new(200).set_body_json(json!({ "products": [], "total": 0 })),
        )
        .await;
        server
    }

    fn ok_product() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "title": "x" }))
    }

    fn ok_categories() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!(["beauty", "groceries"]))
    }

    fn hanging() -> ResponseTemplate {
        ResponseTemplate::new(200).set_delay(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn all_endpoints_up() {
        let server = catalog_with(ok_product(), ok_categories()).await;
        let report = monitor(&server.uri(), Duration::from_secs(5))
            .comprehensive_check()
            .await;

        assert_eq!(report.overall_status, HealthStatus::Up);
        let names: Vec<&str> = report.endpoints.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["categories", "products", "search"]);
        assert!(report.endpoints.values().all(|e| e.status == HealthStatus::Up));
    }

    #[tokio::test]
    async fn one_non_success_degrades() {
        let server = catalog_with(ok_product(), ResponseTemplate::new(502)).await;
        let report = monitor(&server.uri(), Duration::from_secs(5))
            .comprehensive_check()
            .await;

        assert_eq!(report.overall_status, HealthStatus::Degraded);
        let categories = &report.endpoints["categories"];
        assert_eq!(categories.status, HealthStatus::Down);
        assert_eq!(categories.status_code, 502);
    }

    #[tokio::test]
    async fn one_transport_failure_is_down() {
        let server = catalog_with(hanging(), ok_categories()).await;
        let report = monitor(&server.uri(), Duration::from_millis(50))
            .comprehensive_check()
            .await;

        assert_eq!(report.overall_status, HealthStatus::Down);
        let products = &report.endpoints["products"];
        assert_eq!(products.status_code, 0);
        assert!(products.error.is_some());
    }

    #[tokio::test]
    async fn down_overrides_degraded_regardless_of_order() {
        // products (probed first) times out, categories (probed later) is a 500
        let server = catalog_with(hanging(), ResponseTemplate::new(500)).await;
        let report = monitor(&server.uri(), Duration::from_millis(50))
            .comprehensive_check()
            .await;

        assert_eq!(report.overall_status, HealthStatus::Down);
    }

    #[tokio::test]
    async fn comprehensive_check_leaves_history_alone() {
        let server = catalog_with(ok_product(), ok_categories()).await;
        let m = monitor(&server.uri(), Duration::from_secs(5));
        m.comprehensive_check().await;
        assert!(m.history(10).is_empty());
        assert!(m.cached_health().is_none());
    }
}
