use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetric {
    pub request_id: u64,
    pub start_time: u64, // milliseconds since epoch
    pub latency_us: u64,
    pub batch_size: usize,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub server: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub failure_rate: f64,
    pub ids_received: usize,

    // Latency statistics (microseconds)
    pub latency_min_us: u64,
    pub latency_max_us: u64,
    pub latency_avg_us: f64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,

    // Requests answered per server
    pub server_distribution: HashMap<String, usize>,

    pub failure_reasons: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct ClientMetrics {
    client_name: String,
    start_time: Instant,
    requests: Vec<RequestMetric>,
}

impl ClientMetrics {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            start_time: Instant::now(),
            requests: Vec::new(),
        }
    }

    pub fn record_success(&mut self, latency: Duration, batch_size: usize, server: Option<String>) {
        self.record(latency, batch_size, None, server);
    }

    /// Failure reasons are grouped by the string given here, so pass a
    /// category rather than a full error message.
    pub fn record_failure(&mut self, latency: Duration, batch_size: usize, reason: impl Into<String>) {
        self.record(latency, batch_size, Some(reason.into()), None);
    }

    fn record(
        &mut self,
        latency: Duration,
        batch_size: usize,
        failure_reason: Option<String>,
        server: Option<String>,
    ) {
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        self.requests.push(RequestMetric {
            request_id: self.requests.len() as u64 + 1,
            start_time,
            latency_us: latency.as_micros() as u64,
            batch_size,
            success: failure_reason.is_none(),
            failure_reason,
            server,
        });
    }

    pub fn aggregate(&self) -> AggregatedStats {
        let mut stats = AggregatedStats::default();

        if self.requests.is_empty() {
            return stats;
        }

        stats.total_requests = self.requests.len();
        stats.successful_requests = self.requests.iter().filter(|r| r.success).count();
        stats.failed_requests = stats.total_requests - stats.successful_requests;
        stats.failure_rate = (stats.failed_requests as f64 / stats.total_requests as f64) * 100.0;
        stats.ids_received = self
            .requests
            .iter()
            .filter(|r| r.success)
            .map(|r| r.batch_size)
            .sum();

        let mut latencies: Vec<u64> = self
            .requests
            .iter()
            .filter(|r| r.success)
            .map(|r| r.latency_us)
            .collect();
        latencies.sort_unstable();

        if let (Some(&min), Some(&max)) = (latencies.first(), latencies.last()) {
            stats.latency_min_us = min;
            stats.latency_max_us = max;
            stats.latency_avg_us = latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;
            stats.latency_p50_us = percentile(&latencies, 50.0);
            stats.latency_p95_us = percentile(&latencies, 95.0);
            stats.latency_p99_us = percentile(&latencies, 99.0);
        }

        for request in &self.requests {
            if let Some(server) = &request.server {
                *stats.server_distribution.entry(server.clone()).or_insert(0) += 1;
            }
            if let Some(reason) = &request.failure_reason {
                *stats.failure_reasons.entry(reason.clone()).or_insert(0) += 1;
            }
        }

        stats
    }

    pub fn export_to_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let output = serde_json::json!({
            "client_name": self.client_name,
            "test_duration_ms": self.start_time.elapsed().as_millis() as u64,
            "aggregated_stats": self.aggregate(),
        });

        let json_string = serde_json::to_string_pretty(&output)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;

        Ok(())
    }
}

/// Nearest-rank percentile: the smallest sample with at least `pct` percent of
/// samples at or below it. `sorted` must be ascending.
fn percentile(sorted: &[u64], pct: f64) -> u64 {
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted
        .get(rank.clamp(1, sorted.len().max(1)) - 1)
        .copied()
        .unwrap_or(0)
}
