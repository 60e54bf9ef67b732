//! `simulate` command handler

use std::sync::Arc;
use std::time::Duration;

use crate::auth::token::TokenGenerator;
use crate::callback::DispatchOutcome;
use crate::config::Config;
use crate::error::Result;
use crate::flow::simulator::{OAuthFlowSimulator, SimulationReport};
use crate::mcp::client::HttpCapabilityClient;

/// Subject of the token minted when no bearer token is configured.
pub const SIMULATOR_SUBJECT: &str = "oauth-flow-sim";

/// Email of the token minted when no bearer token is configured.
pub const SIMULATOR_EMAIL: &str = "oauth-flow-sim@example.com";

/// Runs one simulated flow against the configured server.
///
/// # Errors
///
/// Returns an error when the flow aborts (registration failure, bad
/// configuration). A failed verification is reported through
/// [`SimulationReport::passed`], not as an error.
pub async fn run_simulate(config: &Config) -> Result<SimulationReport> {
    let server_url = config.server_url()?;

    let bearer = match &config.server.bearer_token {
        Some(token) => token.clone(),
        None => {
            tracing::debug!("No bearer token configured, minting a test token");
            TokenGenerator::from_env()
                .generate(SIMULATOR_SUBJECT, SIMULATOR_EMAIL, 3600)?
                .raw
        }
    };

    let client = HttpCapabilityClient::new(HttpCapabilityClient::endpoint_for(&server_url)?)?
        .with_bearer_token(bearer)
        .with_timeout(Duration::from_millis(config.server.request_timeout_ms));

    let simulator = OAuthFlowSimulator::new(config.simulator_options()?, Arc::new(client))?;
    simulator.run().await
}

/// Renders a report for the terminal.
pub fn format_report(report: &SimulationReport) -> String {
    let mark = |ok: bool| if ok { "ok" } else { "FAILED" };
    let callback = match report.callback {
        DispatchOutcome::Delivered { status } => format!("delivered (HTTP {status})"),
        DispatchOutcome::ReceiverUnavailable => "receiver not listening".to_string(),
    };
    let states: Vec<String> = report.states.iter().map(|s| s.to_string()).collect();

    let mut out = String::new();
    out.push_str(&format!("client_id:         {}\n", report.client_id));
    out.push_str(&format!("flow:              {}\n", states.join(" -> ")));
    out.push_str(&format!("callback:          {}\n", callback));
    out.push_str(&format!(
        "exchange:          {} after {} poll(s), {}ms\n",
        mark(report.poll.completed),
        report.poll.attempts,
        report.poll.elapsed.as_millis()
    ));
    out.push_str(&format!(
        "connect_provider:  {}\n",
        mark(report.verification.has_connect_provider)
    ));
    out.push_str(&format!(
        "get_activities:    {}\n",
        mark(report.verification.has_get_activities)
    ));
    out.push_str(&format!(
        "capability count:  {} ({})\n",
        report.verification.count,
        mark(report.verification.count_ok)
    ));
    out.push_str(&format!(
        "result:            {}\n",
        if report.passed() { "PASSED" } else { "FAILED" }
    ));
    out
}
