//! Flow orchestration
//!
//! - [`state`]     -- the flow state machine
//! - [`poller`]    -- waits for the background token exchange
//! - [`verify`]    -- final capability checks
//! - [`simulator`] -- runs the whole flow

pub mod poller;
pub mod simulator;
pub mod state;
pub mod verify;

pub use poller::{ExchangePoller, PollOutcome, PollerConfig};
pub use simulator::{OAuthFlowSimulator, SimulationReport, SimulatorOptions};
pub use state::FlowState;
pub use verify::VerificationReport;
