//! End-to-end flow orchestration
//!
//! Drives one simulated authorization against a running server and the
//! client under test:
//!
//! 1. resolve the OAuth endpoints (discovery, falling back to convention)
//! 2. register a client
//! 3. generate PKCE material and the CSRF state
//! 4. build the authorization URL and fabricate a code
//! 5. optionally fire a trigger `tools/call` without awaiting it
//! 6. deliver the callback
//! 7. poll until the capability set grows
//! 8. verify the final capability set
//!
//! The trigger and the callback are two independent tasks. The trigger
//! usually blocks inside the client until the callback arrives, so the
//! simulator never awaits it. Its handle is aborted when the run ends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use url::Url;

use crate::auth::approval;
use crate::auth::discovery;
use crate::auth::pkce;
use crate::auth::registration::{ClientRegistrar, RegistrationRequest};
use crate::callback::dispatcher::{self, CallbackDispatcher, DispatchOutcome};
use crate::error::{Result, SimError};
use crate::flow::poller::{ExchangePoller, PollOutcome, PollerConfig};
use crate::flow::state::{FlowState, FlowTrace};
use crate::flow::verify::{self, VerificationReport};
use crate::mcp::client::CapabilityClient;

/// Default scope requested at registration.
pub const DEFAULT_SCOPE: &str = "fitness:read activities:read profile:read";

/// Default display name registered for the simulator's client.
pub const DEFAULT_CLIENT_NAME: &str = "OAuth Flow Test Simulator";

/// A `tools/call` fired before the callback.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerCall {
    pub tool: String,
    pub arguments: serde_json::Value,
}

/// Everything a run needs besides the capability client.
#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    /// Server base URL, e.g. `http://localhost:8081`.
    pub server_url: Url,
    /// Where the client under test receives the redirect.
    pub callback_url: Url,
    pub scope: String,
    pub client_name: String,
    pub client_uri: String,
    /// Fetch `/.well-known/oauth-authorization-server` first.
    pub discover: bool,
    pub registration_timeout: Duration,
    pub callback_timeout: Duration,
    pub poller: PollerConfig,
    pub trigger: Option<TriggerCall>,
}

impl SimulatorOptions {
    /// Defaults for `server_url`, with the callback on the default port.
    pub fn new(server_url: Url) -> Result<Self> {
        Ok(Self {
            server_url,
            callback_url: dispatcher::callback_url("localhost", dispatcher::DEFAULT_CALLBACK_PORT)?,
            scope: DEFAULT_SCOPE.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_uri: "http://localhost".to_string(),
            discover: true,
            registration_timeout: Duration::from_secs(5),
            callback_timeout: dispatcher::DEFAULT_DISPATCH_TIMEOUT,
            poller: PollerConfig::default(),
            trigger: None,
        })
    }

    pub fn with_callback_url(mut self, callback_url: Url) -> Self {
        self.callback_url = callback_url;
        self
    }

    pub fn with_poller(mut self, poller: PollerConfig) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_trigger(mut self, tool: impl Into<String>, arguments: serde_json::Value) -> Self {
        self.trigger = Some(TriggerCall {
            tool: tool.into(),
            arguments,
        });
        self
    }
}

/// What one run observed.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub client_id: String,
    pub states: Vec<FlowState>,
    pub authorization_url: Url,
    pub callback: DispatchOutcome,
    pub poll: PollOutcome,
    pub verification: VerificationReport,
}

impl SimulationReport {
    /// The exchange completed and verification passed.
    pub fn passed(&self) -> bool {
        self.poll.completed && self.verification.passed()
    }

    pub fn final_state(&self) -> FlowState {
        self.states.last().copied().unwrap_or(FlowState::Idle)
    }
}

/// Aborts the trigger task when dropped.
struct TriggerGuard(Option<JoinHandle<()>>);

impl Drop for TriggerGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            if !handle.is_finished() {
                tracing::debug!("Aborting pending trigger call");
            }
            handle.abort();
        }
    }
}

/// Runs simulated authorizations.
pub struct OAuthFlowSimulator {
    options: SimulatorOptions,
    client: Arc<dyn CapabilityClient>,
    http: Arc<reqwest::Client>,
}

impl std::fmt::Debug for OAuthFlowSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthFlowSimulator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl OAuthFlowSimulator {
    /// Creates a simulator observing `client`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the HTTP client cannot be built.
    pub fn new(options: SimulatorOptions, client: Arc<dyn CapabilityClient>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SimError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            options,
            client,
            http: Arc::new(http),
        })
    }

    pub fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    /// Runs one flow.
    ///
    /// # Errors
    ///
    /// Registration failure aborts before any PKCE material exists.
    /// Callback transport failures other than a refused connection also
    /// abort. Exchange timeouts and failed verification are reported, not
    /// raised.
    pub async fn run(&self) -> Result<SimulationReport> {
        let mut trace = FlowTrace::new();
        let redirect_uri = self.options.callback_url.as_str();

        tracing::info!(server = %self.options.server_url, "Starting simulated OAuth flow");

        let endpoints = discovery::resolve_endpoints(
            &self.http,
            &self.options.server_url,
            self.options.discover,
        )
        .await?;

        let request = RegistrationRequest::for_simulator(
            redirect_uri,
            &self.options.scope,
            &self.options.client_name,
            &self.options.client_uri,
            Utc::now().timestamp_millis(),
        );
        let registration = ClientRegistrar::new(Arc::clone(&self.http), endpoints.registration)
            .with_timeout(self.options.registration_timeout)
            .register(&request)
            .await?;
        trace.advance(FlowState::ClientRegistered);

        let material = pkce::generate()?;
        trace.advance(FlowState::ChallengeGenerated);

        let approval = approval::simulate_approval(
            &endpoints.authorization,
            &registration,
            redirect_uri,
            &material,
        );
        trace.advance(FlowState::CodeIssued);

        let _trigger = TriggerGuard(self.spawn_trigger());

        let dispatcher = CallbackDispatcher::new(
            self.options.callback_url.clone(),
            self.options.callback_timeout,
        )?;
        let callback = dispatcher.dispatch(&approval.code, &material.state).await?;
        trace.advance(FlowState::CallbackDelivered);

        trace.advance(FlowState::ExchangePending);
        let poll = ExchangePoller::new(self.options.poller.clone())
            .poll(self.client.as_ref())
            .await;
        trace.advance(if poll.completed {
            FlowState::ExchangeComplete
        } else {
            FlowState::TimedOut
        });

        let verification = verify::verify_client(self.client.as_ref()).await;

        Ok(SimulationReport {
            client_id: registration.client_id,
            states: trace.states().to_vec(),
            authorization_url: approval.authorization_url,
            callback,
            poll,
            verification,
        })
    }

    fn spawn_trigger(&self) -> Option<JoinHandle<()>> {
        let trigger = self.options.trigger.clone()?;
        let client = Arc::clone(&self.client);
        tracing::info!(tool = %trigger.tool, "Firing trigger call");
        Some(tokio::spawn(async move {
            match client.call_tool(&trigger.tool, trigger.arguments).await {
                Ok(_) => tracing::debug!(tool = %trigger.tool, "Trigger call returned"),
                Err(e) => tracing::debug!(tool = %trigger.tool, "Trigger call failed: {}", e),
            }
        }))
    }
}
