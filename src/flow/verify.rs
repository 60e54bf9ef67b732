//! Final capability verification
//!
//! One more listing after the exchange, checked against three independent
//! conditions. All must hold. A failed verification is a test failure, not
//! an error, so listing failures produce a report over an empty snapshot.

use serde::Serialize;

use crate::mcp::client::CapabilityClient;
use crate::mcp::types::{CapabilitySnapshot, CONNECT_PROVIDER, GET_ACTIVITIES};

/// Capability count that must be exceeded.
pub const DEFAULT_MIN_CAPABILITIES: usize = 10;

/// Outcome of each check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub has_connect_provider: bool,
    pub has_get_activities: bool,
    pub count: usize,
    pub count_ok: bool,
}

impl VerificationReport {
    /// All three checks passed.
    pub fn passed(&self) -> bool {
        self.has_connect_provider && self.has_get_activities && self.count_ok
    }

    /// Logs one line per check, then the verdict.
    pub fn log(&self) {
        tracing::info!(ok = self.has_connect_provider, "check: {} present", CONNECT_PROVIDER);
        tracing::info!(ok = self.has_get_activities, "check: {} present", GET_ACTIVITIES);
        tracing::info!(
            ok = self.count_ok,
            count = self.count,
            "check: more than {} capabilities",
            DEFAULT_MIN_CAPABILITIES
        );
        if self.passed() {
            tracing::info!("Verification passed");
        } else {
            tracing::warn!("Verification failed");
        }
    }
}

/// Evaluates a snapshot.
pub fn verify_snapshot(snapshot: &CapabilitySnapshot) -> VerificationReport {
    let count = snapshot.len();
    VerificationReport {
        has_connect_provider: snapshot.contains(CONNECT_PROVIDER),
        has_get_activities: snapshot.contains(GET_ACTIVITIES),
        count,
        count_ok: count > DEFAULT_MIN_CAPABILITIES,
    }
}

/// Lists capabilities once and evaluates the result.
pub async fn verify_client(client: &dyn CapabilityClient) -> VerificationReport {
    let snapshot = match client.list_capabilities().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("Verification listing failed: {}", e);
            CapabilitySnapshot::default()
        }
    };
    let report = verify_snapshot(&snapshot);
    report.log();
    report
}
