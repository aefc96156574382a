use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Timings kept before the oldest ones are dropped.
pub const METRICS_CAPACITY: usize = 10_000;

const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "operation",
    "target",
    "duration_ns",
    "duration_ms",
    "item_count",
    "success",
    "notes",
];

/// One recorded operation timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String, // "sync_all" | "sync_one" | "probe" | "db_query:list" | ...
    pub target: String,    // "catalog" | "db" | api name
    pub duration_ns: u64,
    pub duration_ms: f64,
    pub item_count: usize,
    pub success: bool,
    pub notes: Option<String>,
}

impl MetricEntry {
    pub fn new(
        operation: impl Into<String>,
        target: impl Into<String>,
        duration: Duration,
        item_count: usize,
        success: bool,
        notes: Option<String>,
    ) -> Self {
        let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            target: target.into(),
            duration_ns,
            duration_ms: ns_to_ms(duration_ns),
            item_count,
            success,
            notes,
        }
    }
}

/// Rolling window of operation timings shared by all requests.
///
/// Once `capacity` entries are held, each new entry evicts the oldest.
#[derive(Debug)]
pub struct MetricsStore {
    entries: VecDeque<MetricEntry>,
    capacity: usize,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::with_capacity(METRICS_CAPACITY)
    }
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &MetricEntry> {
        self.entries.iter()
    }

    pub fn record(&mut self, entry: MetricEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Record a successful operation without notes.
    pub fn record_raw(
        &mut self,
        operation: impl Into<String>,
        target: impl Into<String>,
        duration: Duration,
        item_count: usize,
    ) {
        self.record(MetricEntry::new(
            operation, target, duration, item_count, true, None,
        ));
    }

    /// Drop every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        cleared
    }

    /// Latency summary per (operation, target), ordered by operation then target.
    pub fn aggregated(&self) -> Vec<AggregatedMetric> {
        let mut groups: BTreeMap<(&str, &str), (Vec<u64>, usize)> = BTreeMap::new();
        for e in &self.entries {
            let (durations, failures) = groups
                .entry((e.operation.as_str(), e.target.as_str()))
                .or_default();
            durations.push(e.duration_ns);
            if !e.success {
                *failures += 1;
            }
        }

        groups
            .into_iter()
            .map(|((operation, target), (mut durations, failures))| {
                durations.sort_unstable();
                AggregatedMetric::from_sorted(operation, target, &durations, failures)
            })
            .collect()
    }

    /// All held entries as CSV, header included even when empty.
    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(vec![]);
        wtr.write_record(CSV_HEADER)?;
        for e in &self.entries {
            wtr.serialize(e)?;
        }
        Ok(String::from_utf8(wtr.into_inner()?)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub operation: String,
    pub target: String,
    pub sample_count: usize,
    pub failure_count: usize,
    pub min_ns: u64,
    pub max_ns: u64,
    pub avg_ns: u64,
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
    pub avg_ms: f64,
    pub p95_ms: f64,
}

impl AggregatedMetric {
    /// `sorted` must be non-empty and ascending.
    fn from_sorted(operation: &str, target: &str, sorted: &[u64], failures: usize) -> Self {
        let count = sorted.len();
        let total: u128 = sorted.iter().map(|&d| u128::from(d)).sum();
        let avg = u64::try_from(total / count.max(1) as u128).unwrap_or(u64::MAX);
        let p95 = percentile(sorted, 0.95);

        Self {
            operation: operation.to_string(),
            target: target.to_string(),
            sample_count: count,
            failure_count: failures,
            min_ns: sorted.first().copied().unwrap_or(0),
            max_ns: sorted.last().copied().unwrap_or(0),
            avg_ns: avg,
            p50_ns: percentile(sorted, 0.5),
            p95_ns: p95,
            p99_ns: percentile(sorted, 0.99),
            avg_ms: ns_to_ms(avg),
            p95_ms: ns_to_ms(p95),
        }
    }
}

/// Nearest-rank percentile over an ascending slice; 0 when empty.
fn percentile(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (sorted.len() as f64 * q) as usize;
    sorted[rank.min(sorted.len() - 1)]
}

fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}
