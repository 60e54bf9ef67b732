//! Server process helper
//!
//! Starts the server (or a stand-in such as `mock_coach_server`) as a child
//! process, forwards its output to the log, and waits for its health
//! endpoint. The child is killed when the [`ServerProcess`] is dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use url::Url;

use crate::error::{Result, SimError};

/// Overrides the full server URL.
pub const SERVER_URL_ENV: &str = "OAUTH_SIM_SERVER_URL";

/// Host used when no full URL is given.
pub const HOST_ENV: &str = "OAUTH_SIM_HOST";

/// Port used when no full URL is given.
pub const PORT_ENV: &str = "OAUTH_SIM_PORT";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8081;

/// Path polled by [`wait_until_healthy`].
pub const HEALTH_PATH: &str = "/health";

/// Server base URL from the environment.
///
/// `OAUTH_SIM_SERVER_URL` wins; otherwise
/// `http://{OAUTH_SIM_HOST}:{OAUTH_SIM_PORT}` with `localhost:8081` as the
/// fallback.
///
/// # Errors
///
/// Returns [`SimError::Config`] for an unparsable URL or port.
pub fn base_url_from_env() -> Result<Url> {
    if let Ok(url) = std::env::var(SERVER_URL_ENV) {
        return Url::parse(&url)
            .map_err(|e| SimError::Config(format!("invalid {SERVER_URL_ENV} `{url}`: {e}")).into());
    }

    let host = std::env::var(HOST_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = match std::env::var(PORT_ENV) {
        Ok(raw) => raw
            .parse::<u16>()
            .map_err(|e| SimError::Config(format!("invalid {PORT_ENV} `{raw}`: {e}")))?,
        Err(_) => DEFAULT_PORT,
    };
    Url::parse(&format!("http://{host}:{port}"))
        .map_err(|e| SimError::Config(format!("invalid server address {host}:{port}: {e}")).into())
}

/// A running child process.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    program: PathBuf,
}

impl ServerProcess {
    /// Spawns `program` with `args` and extra `env` on top of the inherited
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Server`] if the process cannot be started.
    pub fn spawn(
        program: impl AsRef<Path>,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self> {
        let program = program.as_ref().to_path_buf();
        let mut cmd = Command::new(&program);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            SimError::Server(format!("failed to spawn `{}`: {}", program.display(), e))
        })?;

        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "server".to_string());

        if let Some(stdout) = child.stdout.take() {
            let name = name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(process = %name, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(process = %name, "stderr: {}", line);
                }
            });
        }

        tracing::info!(program = %program.display(), pid = ?child.id(), "Server process started");
        Ok(Self { child, program })
    }

    /// OS process id, if still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process has exited.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Kills the process and reaps it.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(program = %self.program.display(), "kill failed: {}", e);
        }
        Ok(())
    }
}

/// Polls `GET {base}/health` until it answers 2xx.
///
/// # Errors
///
/// Returns [`SimError::Server`] if the server is not healthy within
/// `timeout`.
pub async fn wait_until_healthy(
    base_url: &Url,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let health = base_url.join(HEALTH_PATH)?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
        .map_err(|e| SimError::Server(format!("failed to build HTTP client: {e}")))?;

    let deadline = Instant::now() + timeout;
    loop {
        match http.get(health.clone()).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(url = %health, "Server healthy");
                return Ok(());
            }
            Ok(resp) => tracing::debug!(status = resp.status().as_u16(), "Health check not ready"),
            Err(e) => tracing::debug!("Health check failed: {}", e),
        }

        if Instant::now() + interval > deadline {
            return Err(SimError::Server(format!(
                "{} not healthy within {}ms",
                health,
                timeout.as_millis()
            ))
            .into());
        }
        tokio::time::sleep(interval).await;
    }
}
