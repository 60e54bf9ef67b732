//! Exchange-completion polling
//!
//! The client under test finishes its token exchange in the background
//! after the callback lands. The only observable signal is that its
//! capability list grows, so the poller lists capabilities at a fixed
//! interval until the post-authentication set appears or the budget runs
//! out.
//!
//! Timing:
//!
//! - the first listing is issued immediately
//! - a predicate satisfied at attempt `N` returns after `(N - 1)` sleeps
//! - every listing is bounded by whatever is left of the budget, so the
//!   poller never runs past its timeout
//!
//! Listing failures are logged and counted as attempts. Timing out is not
//! an error either; the caller gets `completed == false` and decides.

use std::time::Duration;

use tokio::time::Instant;

use crate::mcp::client::CapabilityClient;
use crate::mcp::types::{CapabilitySnapshot, CONNECT_PROVIDER};

/// Default overall wait.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default spacing between listings.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Capability count that must be exceeded.
pub const DEFAULT_COMPLETION_THRESHOLD: usize = 5;

/// Poller tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub timeout: Duration,
    pub interval: Duration,
    /// Completion requires strictly more capabilities than this.
    pub threshold: usize,
    /// Completion requires this capability to be listed.
    pub required_capability: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
            threshold: DEFAULT_COMPLETION_THRESHOLD,
            required_capability: CONNECT_PROVIDER.to_string(),
        }
    }
}

impl PollerConfig {
    /// Whether `snapshot` shows a completed exchange.
    pub fn is_complete(&self, snapshot: &CapabilitySnapshot) -> bool {
        snapshot.len() > self.threshold && snapshot.contains(&self.required_capability)
    }
}

/// Result of one polling session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub completed: bool,
    /// Listings issued, failed ones included.
    pub attempts: u32,
    pub elapsed: Duration,
    /// Size of the last successful listing, if any.
    pub last_count: Option<usize>,
}

/// Waits for the post-authentication capability set.
#[derive(Debug, Clone, Default)]
pub struct ExchangePoller {
    config: PollerConfig,
}

impl ExchangePoller {
    pub fn new(config: PollerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Polls until completion or timeout.
    pub async fn poll(&self, client: &dyn CapabilityClient) -> PollOutcome {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut attempts = 0u32;
        let mut last_count = None;

        tracing::info!(
            timeout_ms = self.config.timeout.as_millis() as u64,
            interval_ms = self.config.interval.as_millis() as u64,
            required = %self.config.required_capability,
            "Waiting for token exchange to complete"
        );

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            attempts += 1;
            match tokio::time::timeout(remaining, client.list_capabilities()).await {
                Ok(Ok(snapshot)) => {
                    last_count = Some(snapshot.len());
                    tracing::debug!(
                        attempt = attempts,
                        count = snapshot.len(),
                        "Polled capabilities"
                    );
                    if self.config.is_complete(&snapshot) {
                        let elapsed = started.elapsed();
                        tracing::info!(
                            attempts,
                            count = snapshot.len(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Token exchange complete"
                        );
                        return PollOutcome {
                            completed: true,
                            attempts,
                            elapsed,
                            last_count,
                        };
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(attempt = attempts, "Capability listing failed: {}", e);
                }
                Err(_) => {
                    tracing::debug!(attempt = attempts, "Capability listing hit the deadline");
                    break;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.config.interval.min(remaining)).await;
        }

        let elapsed = started.elapsed();
        tracing::warn!(
            attempts,
            last_count = ?last_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "Token exchange did not complete in time"
        );
        PollOutcome {
            completed: false,
            attempts,
            elapsed,
            last_count,
        }
    }

    /// [`poll`](Self::poll), reduced to the completion flag.
    pub async fn wait_until_complete(&self, client: &dyn CapabilityClient) -> bool {
        self.poll(client).await.completed
    }
}
