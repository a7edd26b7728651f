use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteMetric {
    pub vote_number: u32,
    pub start_time: u64, // milliseconds since epoch
    pub latency_ms: u64,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub server_version: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub total_votes: usize,
    pub successful_votes: usize,
    pub failed_votes: usize,
    pub failure_rate: f64,

    // Latency statistics (milliseconds)
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
    pub latency_avg_ms: f64,
    pub latency_p50_ms: u64,
    pub latency_p95_ms: u64,

    // Versions announced by the server across the session
    pub server_versions: HashMap<String, usize>,

    // Failure reasons breakdown
    pub failure_reasons: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct ClientMetrics {
    target: String,
    start_time: Instant,
    votes: Vec<VoteMetric>,
}

impl ClientMetrics {
    pub fn new(target: String) -> Self {
        Self {
            target,
            start_time: Instant::now(),
            votes: Vec::new(),
        }
    }

    pub fn record_vote(
        &mut self,
        vote_number: u32,
        latency: Duration,
        success: bool,
        failure_reason: Option<String>,
        server_version: Option<String>,
    ) {
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        self.votes.push(VoteMetric {
            vote_number,
            start_time,
            latency_ms: latency.as_millis() as u64,
            success,
            failure_reason,
            server_version,
        });
    }

    pub fn votes(&self) -> &[VoteMetric] {
        &self.votes
    }

    pub fn aggregate(&self) -> AggregatedStats {
        let mut stats = AggregatedStats::default();

        if self.votes.is_empty() {
            return stats;
        }

        stats.total_votes = self.votes.len();
        stats.successful_votes = self.votes.iter().filter(|v| v.success).count();
        stats.failed_votes = stats.total_votes - stats.successful_votes;
        stats.failure_rate = (stats.failed_votes as f64 / stats.total_votes as f64) * 100.0;

        // Latency only counts votes that reached the server
        let mut latencies: Vec<u64> = self
            .votes
            .iter()
            .filter(|v| v.success)
            .map(|v| v.latency_ms)
            .collect();

        if !latencies.is_empty() {
            latencies.sort_unstable();

            stats.latency_min_ms = latencies[0];
            stats.latency_max_ms = latencies[latencies.len() - 1];
            stats.latency_avg_ms =
                latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;

            stats.latency_p50_ms = percentile(&latencies, 50.0);
            stats.latency_p95_ms = percentile(&latencies, 95.0);
        }

        for version in self.votes.iter().filter_map(|v| v.server_version.as_ref()) {
            *stats.server_versions.entry(version.clone()).or_insert(0) += 1;
        }

        for reason in self.votes.iter().filter_map(|v| v.failure_reason.as_ref()) {
            *stats.failure_reasons.entry(reason.clone()).or_insert(0) += 1;
        }

        stats
    }

    pub fn export_to_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let output = serde_json::json!({
            "target": self.target,
            "session_duration_secs": self.start_time.elapsed().as_secs(),
            "aggregated_stats": self.aggregate(),
            "votes": self.votes,
        });

        let json_string = serde_json::to_string_pretty(&output)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;

        Ok(())
    }
}

fn percentile(sorted_data: &[u64], percentile: f64) -> u64 {
    if sorted_data.is_empty() {
        return 0;
    }

    let index = (percentile / 100.0 * (sorted_data.len() - 1) as f64).round() as usize;
    sorted_data[index.min(sorted_data.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let data = vec![10, 20, 30, 40, 50];
        assert_eq!(percentile(&data, 50.0), 30);
        assert_eq!(percentile(&data, 95.0), 50);
        assert_eq!(percentile(&[], 50.0), 0);
    }

    #[test]
    fn test_metrics_aggregation() {
        let mut metrics = ClientMetrics::new("127.0.0.1:8192".to_string());

        metrics.record_vote(1, Duration::from_millis(40), true, None, Some("2.13".into()));
        metrics.record_vote(2, Duration::from_millis(80), true, None, Some("2.13".into()));
        metrics.record_vote(3, Duration::from_millis(900), false, Some("timeout".into()), None);
        metrics.record_vote(4, Duration::from_millis(5), false, Some("io".into()), None);

        let stats = metrics.aggregate();

        assert_eq!(stats.total_votes, 4);
        assert_eq!(stats.successful_votes, 2);
        assert_eq!(stats.failed_votes, 2);
        assert_eq!(stats.failure_rate, 50.0);
        assert_eq!(stats.latency_min_ms, 40);
        assert_eq!(stats.latency_max_ms, 80);
        assert_eq!(stats.latency_avg_ms, 60.0);
        assert_eq!(stats.server_versions.get("2.13"), Some(&2));
        assert_eq!(stats.failure_reasons.get("timeout"), Some(&1));
        assert_eq!(stats.failure_reasons.get("io"), Some(&1));
    }

    #[test]
    fn test_empty_session() {
        let stats = ClientMetrics::new("t".to_string()).aggregate();
        assert_eq!(stats.total_votes, 0);
        assert_eq!(stats.failure_rate, 0.0);
    }

    #[test]
    fn test_export_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let mut metrics = ClientMetrics::new("127.0.0.1:8192".to_string());
        metrics.record_vote(1, Duration::from_millis(12), true, None, Some("1.9".into()));
        metrics.export_to_json(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["target"], "127.0.0.1:8192");
        assert_eq!(written["aggregated_stats"]["successful_votes"], 1);
        assert_eq!(written["votes"][0]["server_version"], "1.9");
    }
}
