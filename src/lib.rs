//! oauth-flow-sim - OAuth 2.0 authorization-code + PKCE flow simulator
//!
//! Exercises a server's OAuth plumbing and a client's post-callback
//! behavior without a browser: it registers a client, generates PKCE
//! material, fabricates the approval, pushes the callback, then watches
//! the client's capability list until the token exchange has visibly
//! completed.
//!
//! # Architecture
//!
//! - `auth`: test tokens, PKCE, discovery, registration, approval
//! - `callback`: callback delivery and a loopback receiver
//! - `mcp`: JSON-RPC capability listing
//! - `flow`: state machine, poller, verification, orchestration
//! - `server`: server process and health helpers
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`, `commands`, `logging`: the command-line front end
//!
//! # Example
//!
//! ```no_run
//! use oauth_flow_sim::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/oauth-sim.yaml", &Default::default())?;
//!     config.validate()?;
//!     let report = oauth_flow_sim::commands::simulate::run_simulate(&config).await?;
//!     assert!(report.passed());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod callback;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod flow;
pub mod logging;
pub mod mcp;
pub mod server;

pub use config::Config;
pub use error::{Result, SimError};
pub use flow::{OAuthFlowSimulator, SimulationReport};
