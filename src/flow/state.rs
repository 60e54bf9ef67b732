//! Flow state machine

use std::fmt;

use serde::Serialize;

/// Where a simulated authorization currently stands.
///
/// `Idle → ClientRegistered → ChallengeGenerated → CodeIssued →
/// CallbackDelivered → ExchangePending → ExchangeComplete | TimedOut`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    ClientRegistered,
    ChallengeGenerated,
    /// Code fabricated by the simulator, not issued by the server.
    CodeIssued,
    CallbackDelivered,
    ExchangePending,
    ExchangeComplete,
    TimedOut,
}

impl FlowState {
    /// `ExchangeComplete` and `TimedOut` end a flow.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ExchangeComplete | Self::TimedOut)
    }

    /// The state that legally follows this one on the success path.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::ClientRegistered),
            Self::ClientRegistered => Some(Self::ChallengeGenerated),
            Self::ChallengeGenerated => Some(Self::CodeIssued),
            Self::CodeIssued => Some(Self::CallbackDelivered),
            Self::CallbackDelivered => Some(Self::ExchangePending),
            Self::ExchangePending => Some(Self::ExchangeComplete),
            Self::ExchangeComplete | Self::TimedOut => None,
        }
    }

    /// Whether moving from `self` to `to` is allowed.
    pub fn can_transition_to(self, to: Self) -> bool {
        self.next() == Some(to) || (self == Self::ExchangePending && to == Self::TimedOut)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::ClientRegistered => "client_registered",
            Self::ChallengeGenerated => "challenge_generated",
            Self::CodeIssued => "code_issued",
            Self::CallbackDelivered => "callback_delivered",
            Self::ExchangePending => "exchange_pending",
            Self::ExchangeComplete => "exchange_complete",
            Self::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Ordered record of the states a run went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowTrace {
    states: Vec<FlowState>,
}

impl Default for FlowTrace {
    fn default() -> Self {
        Self {
            states: vec![FlowState::Idle],
        }
    }
}

impl FlowTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn current(&self) -> FlowState {
        self.states.last().copied().unwrap_or(FlowState::Idle)
    }

    /// Records a transition. Illegal transitions are logged and still
    /// recorded so the trace reflects what actually happened.
    pub fn advance(&mut self, to: FlowState) {
        let from = self.current();
        if !from.can_transition_to(to) {
            tracing::warn!(%from, %to, "Unexpected flow transition");
        }
        tracing::debug!(%from, %to, "Flow transition");
        self.states.push(to);
    }

    pub fn states(&self) -> &[FlowState] {
        &self.states
    }
}
