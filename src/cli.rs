//! Command-line interface definition
//!
//! Uses clap's derive API. Every subcommand maps to a handler in
//! [`crate::commands`].

use clap::{Parser, Subcommand};

/// OAuth flow simulator
///
/// Drives an OAuth 2.0 authorization-code + PKCE flow against a running
/// server and checks that the client under test finishes its token
/// exchange.
#[derive(Parser, Debug, Clone)]
#[command(name = "oauth-flow-sim")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/oauth-sim.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the full simulated authorization flow
    Simulate {
        /// Server base URL (overrides config and OAUTH_SIM_SERVER_URL)
        #[arg(long)]
        server_url: Option<String>,

        /// Port the client under test receives the callback on
        #[arg(long)]
        callback_port: Option<u16>,

        /// Bearer token for capability listing; a test token is minted
        /// when omitted
        #[arg(long)]
        token: Option<String>,

        /// Tool to call (without waiting) before delivering the callback
        #[arg(long)]
        trigger_tool: Option<String>,

        /// How long to wait for the exchange to complete
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Skip authorization server metadata discovery
        #[arg(long)]
        no_discovery: bool,
    },

    /// Print a signed test token
    Token {
        /// Subject (user id)
        #[arg(long, default_value = "test-user")]
        subject: String,

        /// Email claim
        #[arg(long, default_value = "test@example.com")]
        email: String,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,

        /// Space-separated scope claim
        #[arg(long)]
        scope: Option<String>,
    },

    /// Print fresh PKCE material as JSON
    Pkce,

    /// Wait for one OAuth callback and print its code and state
    Listen {
        /// Port to listen on (0 picks a free port)
        #[arg(long, default_value_t = 35535)]
        port: u16,

        /// Reject callbacks whose state differs
        #[arg(long)]
        state: Option<String>,

        /// How long to wait in milliseconds
        #[arg(long, default_value_t = 60_000)]
        timeout_ms: u64,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/oauth-sim.yaml".to_string()),
            verbose: false,
            json: false,
            command: Commands::Pkce,
        }
    }
}
