//! Configuration for the simulator
//!
//! Loaded from YAML, then overridden by `OAUTH_SIM_*` environment
//! variables, then by command-line flags, then validated.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::callback::dispatcher;
use crate::cli::{Cli, Commands};
use crate::error::{Result, SimError};
use crate::flow::poller::PollerConfig;
use crate::flow::simulator::{SimulatorOptions, TriggerCall, DEFAULT_CLIENT_NAME, DEFAULT_SCOPE};
use crate::mcp::types::CONNECT_PROVIDER;
use crate::server;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server under test
    #[serde(default)]
    pub server: ServerConfig,
    /// Callback delivery
    #[serde(default)]
    pub callback: CallbackConfig,
    /// Exchange-completion polling and the optional trigger
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Dynamic client registration
    #[serde(default)]
    pub registration: RegistrationConfig,
}

/// Server under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://localhost:8081`
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Bearer token for capability listing; a test token is minted when
    /// absent
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Per-request timeout for capability listing in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Try `/.well-known/oauth-authorization-server` before the
    /// conventional endpoints
    #[serde(default = "default_true")]
    pub discover: bool,
}

fn default_server_url() -> String {
    format!("http://{}:{}", server::DEFAULT_HOST, server::DEFAULT_PORT)
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            bearer_token: None,
            request_timeout_ms: default_request_timeout_ms(),
            discover: true,
        }
    }
}

/// Callback delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    #[serde(default = "default_callback_host")]
    pub host: String,
    #[serde(default = "default_callback_port")]
    pub port: u16,
    /// Delivery timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_callback_host() -> String {
    "localhost".to_string()
}

fn default_callback_port() -> u16 {
    dispatcher::DEFAULT_CALLBACK_PORT
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            host: default_callback_host(),
            port: default_callback_port(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Exchange-completion polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_exchange_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Completion requires more capabilities than this
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    #[serde(default = "default_required_capability")]
    pub required_capability: String,
    /// Tool called (without awaiting) before the callback is delivered
    #[serde(default)]
    pub trigger_tool: Option<String>,
    #[serde(default = "default_trigger_arguments")]
    pub trigger_arguments: serde_json::Value,
}

fn default_exchange_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_threshold() -> usize {
    5
}

fn default_required_capability() -> String {
    CONNECT_PROVIDER.to_string()
}

fn default_trigger_arguments() -> serde_json::Value {
    serde_json::json!({})
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_exchange_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            threshold: default_threshold(),
            required_capability: default_required_capability(),
            trigger_tool: None,
            trigger_arguments: default_trigger_arguments(),
        }
    }
}

/// Dynamic client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_client_uri")]
    pub client_uri: String,
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

fn default_client_uri() -> String {
    "http://localhost".to_string()
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            client_name: default_client_name(),
            client_uri: default_client_uri(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, the environment, and `cli`.
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the file exists but cannot be read
    /// or parsed.
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SimError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var(server::SERVER_URL_ENV) {
            self.server.url = url;
        } else if std::env::var(server::HOST_ENV).is_ok() || std::env::var(server::PORT_ENV).is_ok()
        {
            match server::base_url_from_env() {
                Ok(url) => self.server.url = url.as_str().trim_end_matches('/').to_string(),
                Err(e) => tracing::warn!("Ignoring server address from environment: {}", e),
            }
        }

        if let Ok(port) = std::env::var("OAUTH_SIM_CALLBACK_PORT") {
            if let Ok(value) = port.parse() {
                self.callback.port = value;
            } else {
                tracing::warn!("Invalid OAUTH_SIM_CALLBACK_PORT: {}", port);
            }
        }

        if let Ok(timeout) = std::env::var("OAUTH_SIM_EXCHANGE_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse() {
                self.exchange.timeout_ms = value;
            } else {
                tracing::warn!("Invalid OAUTH_SIM_EXCHANGE_TIMEOUT_MS: {}", timeout);
            }
        }

        if let Ok(interval) = std::env::var("OAUTH_SIM_POLL_INTERVAL_MS") {
            if let Ok(value) = interval.parse() {
                self.exchange.poll_interval_ms = value;
            } else {
                tracing::warn!("Invalid OAUTH_SIM_POLL_INTERVAL_MS: {}", interval);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Commands::Simulate {
            server_url,
            callback_port,
            token,
            trigger_tool,
            timeout_ms,
            no_discovery,
        } = &cli.command
        {
            if let Some(url) = server_url {
                self.server.url = url.clone();
            }
            if let Some(port) = callback_port {
                self.callback.port = *port;
            }
            if let Some(token) = token {
                self.server.bearer_token = Some(token.clone());
            }
            if let Some(tool) = trigger_tool {
                self.exchange.trigger_tool = Some(tool.clone());
            }
            if let Some(timeout) = timeout_ms {
                self.exchange.timeout_ms = *timeout;
            }
            if *no_discovery {
                self.server.discover = false;
            }
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.server.url).map_err(|e| {
            SimError::Config(format!("Invalid server.url `{}`: {}", self.server.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SimError::Config(format!(
                "server.url must be http or https, got `{}`",
                url.scheme()
            ))
            .into());
        }

        if self.callback.host.is_empty() {
            return Err(SimError::Config("callback.host cannot be empty".to_string()).into());
        }
        dispatcher::callback_url(&self.callback.host, self.callback.port)
            .map_err(|e| SimError::Config(format!("Invalid callback address: {}", e)))?;

        for (name, value) in [
            ("server.request_timeout_ms", self.server.request_timeout_ms),
            ("callback.timeout_ms", self.callback.timeout_ms),
            ("exchange.timeout_ms", self.exchange.timeout_ms),
            ("exchange.poll_interval_ms", self.exchange.poll_interval_ms),
            ("registration.timeout_ms", self.registration.timeout_ms),
        ] {
            if value == 0 {
                return Err(SimError::Config(format!("{} must be greater than 0", name)).into());
            }
        }

        if self.exchange.poll_interval_ms > self.exchange.timeout_ms {
            return Err(SimError::Config(
                "exchange.poll_interval_ms must not exceed exchange.timeout_ms".to_string(),
            )
            .into());
        }

        if self.exchange.required_capability.is_empty() {
            return Err(SimError::Config(
                "exchange.required_capability cannot be empty".to_string(),
            )
            .into());
        }

        if self.registration.scope.trim().is_empty() {
            return Err(SimError::Config("registration.scope cannot be empty".to_string()).into());
        }

        Ok(())
    }

    /// Server base URL.
    pub fn server_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.server.url)?)
    }

    /// Poller settings.
    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            timeout: Duration::from_millis(self.exchange.timeout_ms),
            interval: Duration::from_millis(self.exchange.poll_interval_ms),
            threshold: self.exchange.threshold,
            required_capability: self.exchange.required_capability.clone(),
        }
    }

    /// Everything a simulator run needs.
    pub fn simulator_options(&self) -> Result<SimulatorOptions> {
        Ok(SimulatorOptions {
            server_url: self.server_url()?,
            callback_url: dispatcher::callback_url(&self.callback.host, self.callback.port)?,
            scope: self.registration.scope.clone(),
            client_name: self.registration.client_name.clone(),
            client_uri: self.registration.client_uri.clone(),
            discover: self.server.discover,
            registration_timeout: Duration::from_millis(self.registration.timeout_ms),
            callback_timeout: Duration::from_millis(self.callback.timeout_ms),
            poller: self.poller(),
            trigger: self.exchange.trigger_tool.as_ref().map(|tool| TriggerCall {
                tool: tool.clone(),
                arguments: self.exchange.trigger_arguments.clone(),
            }),
        })
    }
}
