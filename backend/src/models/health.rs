use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Probe outcome. Ordered by severity so the worst of several outcomes
/// is simply the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Degraded,
    Down,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Up => "up",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }

    pub fn is_up(self) -> bool {
        self == HealthStatus::Up
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one timed probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub api_name: String,
    pub status: HealthStatus,
    /// 0 when no HTTP response was received.
    pub status_code: u16,
    pub response_time_ms: f64,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// Compact projection of a [`HealthCheckResult`] kept in the rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: HealthStatus,
    pub response_time_ms: f64,
    pub checked_at: DateTime<Utc>,
}

impl From<&HealthCheckResult> for HistoryEntry {
    fn from(r: &HealthCheckResult) -> Self {
        Self {
            status: r.status,
            response_time_ms: r.response_time_ms,
            checked_at: r.checked_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResult {
    pub status: HealthStatus,
    pub status_code: u16,
    pub response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub api_name: String,
    pub overall_status: HealthStatus,
    /// Keyed by endpoint name.
    pub endpoints: BTreeMap<String, EndpointResult>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub uptime_percentage: f64,
    pub total_checks: usize,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UptimeStats {
    pub uptime_percentage: f64,
    pub total_checks: usize,
    pub successful_checks: usize,
    pub failed_checks: usize,
    pub average_response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_response_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_time_ms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order() {
        assert!(HealthStatus::Up < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Down);
        let worst = [HealthStatus::Degraded, HealthStatus::Down, HealthStatus::Up]
            .into_iter()
            .max();
        assert_eq!(worst, Some(HealthStatus::Down));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&HealthStatus::Degraded).unwrap(), "\"degraded\"");
        let s: HealthStatus = serde_json::from_str("\"down\"").unwrap();
        assert_eq!(s, HealthStatus::Down);
    }

    #[test]
    fn endpoint_error_omitted_when_absent() {
        let r = EndpointResult {
            status: HealthStatus::Up,
            status_code: 200,
            response_time_ms: 12.5,
            error: None,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("error").is_none());
    }
}
