//! # Client Middleware
//!
//! Runs a voting session around the [`ClientCore`](super::client::ClientCore):
//! - builds a fresh [`VoteRecord`] with the current time for every vote
//! - bounds each delivery with the configured timeout
//! - sends `count` votes, pausing `delay` between them
//! - reports each outcome to the log and, when enabled, to [`ClientMetrics`]
//!
//! A failed vote is logged and counted, never retried; the session moves on
//! to the next one.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::{sleep, timeout};

use crate::client::client::ClientCore;
use crate::client::metrics::ClientMetrics;
use crate::common::config::SessionSettings;
use crate::common::error::{Result, VoteError};
use crate::common::messages::VoteRecord;

/// Outcome counts for a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub sent: u32,
    pub failed: u32,
}

impl SessionSummary {
    pub fn all_sent(&self) -> bool {
        self.failed == 0
    }
}

/// Drives repeated vote deliveries for one configured target.
pub struct ClientMiddleware {
    settings: SessionSettings,
    core: Arc<ClientCore>,
    metrics: Option<Arc<Mutex<ClientMetrics>>>,
}

impl ClientMiddleware {
    pub fn new(settings: SessionSettings, core: Arc<ClientCore>) -> Self {
        Self {
            settings,
            core,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<ClientMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Send every vote of the session and return how many got through.
    pub async fn run(&self) -> SessionSummary {
        let count = self.settings.count;
        let target = &self.settings.target;
        let mut summary = SessionSummary::default();

        info!(
            "Sending {} vote(s) for '{}' from {} to {}",
            count, self.settings.username, self.settings.service_name, target
        );

        for vote_number in 1..=count {
            if count > 1 {
                info!("Sending vote #{}/{}...", vote_number, count);
            }

            let started = Instant::now();
            let result = self.send_vote().await;
            let latency = started.elapsed();

            match &result {
                Ok(_) => {
                    summary.sent += 1;
                    info!("✅ Sent vote to {}!", target);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("❌ Vote #{} to {} failed: {}", vote_number, target, e);
                }
            }

            self.record(vote_number, latency, &result);

            if vote_number != count {
                sleep(self.settings.delay).await;
            }
        }

        if summary.all_sent() {
            info!("All {} vote(s) sent to {}", summary.sent, target);
        } else {
            warn!(
                "{} of {} vote(s) to {} failed",
                summary.failed, count, target
            );
        }

        summary
    }

    /// One delivery under the session timeout.
    async fn send_vote(&self) -> Result<String> {
        let record = VoteRecord::new(
            self.settings.service_name.clone(),
            self.settings.username.clone(),
            self.settings.voter_address.clone(),
            unix_date(Utc::now()),
        );

        match timeout(
            self.settings.timeout,
            self.core.deliver(&self.settings.target, &record),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(VoteError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no answer within {:?}", self.settings.timeout),
            ))),
        }
    }

    fn record(&self, vote_number: u32, latency: std::time::Duration, result: &Result<String>) {
        let Some(metrics) = &self.metrics else {
            return;
        };

        match metrics.lock() {
            Ok(mut metrics) => match result {
                Ok(version) => {
                    metrics.record_vote(vote_number, latency, true, None, Some(version.clone()))
                }
                Err(e) => metrics.record_vote(
                    vote_number,
                    latency,
                    false,
                    Some(e.kind().to_string()),
                    None,
                ),
            },
            Err(_) => warn!("Metrics lock poisoned; vote #{} not recorded", vote_number),
        }
    }
}

/// Timestamp in the layout of Unix `date`, e.g. `Mon Jan  2 15:04:05 UTC 2006`.
pub fn unix_date(time: DateTime<Utc>) -> String {
    time.format("%a %b %e %H:%M:%S %Z %Y").to_string()
}
