//! oauth-flow-sim - OAuth flow test simulator
//!
#![doc = "oauth-flow-sim - OAuth flow test simulator"]
#![doc = "Main entry point for the simulator CLI."]

use anyhow::Result;

use oauth_flow_sim::cli::{Cli, Commands};
use oauth_flow_sim::commands;
use oauth_flow_sim::config::Config;
use oauth_flow_sim::logging::{init_logging, LoggingOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_logging(LoggingOptions {
        verbose: cli.verbose,
        json: cli.json,
    })?;

    // Load and validate configuration
    let config_path = cli.config.as_deref().unwrap_or("config/oauth-sim.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    match cli.command {
        Commands::Simulate { .. } => {
            tracing::info!("Starting simulated OAuth flow");
            let report = commands::simulate::run_simulate(&config).await?;
            print!("{}", commands::simulate::format_report(&report));
            if !report.passed() {
                anyhow::bail!("simulation failed");
            }
            Ok(())
        }
        Commands::Token {
            subject,
            email,
            ttl,
            scope,
        } => {
            println!("{}", commands::token::run_token(&subject, &email, ttl, scope)?);
            Ok(())
        }
        Commands::Pkce => {
            println!("{}", commands::pkce::run_pkce()?);
            Ok(())
        }
        Commands::Listen {
            port,
            state,
            timeout_ms,
        } => {
            println!("{}", commands::listen::run_listen(port, state, timeout_ms).await?);
            Ok(())
        }
    }
}
