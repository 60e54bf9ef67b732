//! Logging setup
//!
//! Human-readable or JSON output on stderr, filtered by `RUST_LOG` when
//! set. Stdout is left to command output so `token` and `pkce` can be
//! piped.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "oauth_flow_sim=info";

/// Filter used with `--verbose`.
pub const VERBOSE_FILTER: &str = "oauth_flow_sim=debug";

/// Logging options taken from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggingOptions {
    pub verbose: bool,
    pub json: bool,
}

impl LoggingOptions {
    /// Filter directive used when `RUST_LOG` is unset.
    pub fn default_directive(&self) -> &'static str {
        if self.verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if the filter cannot be parsed or a subscriber is already set.
pub fn init_logging(options: LoggingOptions) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(options.default_directive()))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if options.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
