//! Callback delivery
//!
//! Stands in for the browser redirect that ends an authorization: a single
//! `GET {callback}?code=…&state=…` with redirects disabled. A refused
//! connection is not an error. The receiver belongs to the client under
//! test and may legitimately be absent in fully automated runs, so that
//! case is logged and reported as [`DispatchOutcome::ReceiverUnavailable`].

use std::time::Duration;

use url::Url;

use crate::auth::approval::AuthorizationCode;
use crate::error::{Result, SimError};

/// Port the client under test listens on by default.
pub const DEFAULT_CALLBACK_PORT: u16 = 35535;

/// Path of the callback endpoint.
pub const CALLBACK_PATH: &str = "/oauth/callback";

/// Default per-request timeout for delivery.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds `http://{host}:{port}/oauth/callback`.
pub fn callback_url(host: &str, port: u16) -> Result<Url> {
    Ok(Url::parse(&format!("http://{host}:{port}{CALLBACK_PATH}"))?)
}

/// What happened when the callback was pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The receiver answered with this HTTP status.
    Delivered {
        /// Status code of the receiver's response
        status: u16,
    },
    /// Nothing was listening on the callback port.
    ReceiverUnavailable,
}

impl DispatchOutcome {
    /// Whether the receiver answered at all.
    pub fn delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Delivers authorization codes to a fixed callback URL.
#[derive(Debug, Clone)]
pub struct CallbackDispatcher {
    http: reqwest::Client,
    callback_url: Url,
}

impl CallbackDispatcher {
    /// Creates a dispatcher targeting `callback_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Callback`] if the HTTP client cannot be built.
    pub fn new(callback_url: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| SimError::Callback(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, callback_url })
    }

    /// The URL callbacks are sent to.
    pub fn callback_url(&self) -> &Url {
        &self.callback_url
    }

    /// The full URL for one callback.
    pub fn url_for(&self, code: &AuthorizationCode, state: &str) -> Url {
        let mut url = self.callback_url.clone();
        url.query_pairs_mut()
            .append_pair("code", code.as_str())
            .append_pair("state", state);
        url
    }

    /// Sends the callback once.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Callback`] for transport failures other than a
    /// refused connection (timeouts, malformed responses).
    pub async fn dispatch(&self, code: &AuthorizationCode, state: &str) -> Result<DispatchOutcome> {
        let url = self.url_for(code, state);
        tracing::info!(url = %self.callback_url, "Delivering OAuth callback");

        match self.http.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() || status.is_redirection() {
                    tracing::info!(status = status.as_u16(), "Callback delivered");
                } else {
                    tracing::warn!(
                        status = status.as_u16(),
                        "Callback receiver answered with an error status"
                    );
                }
                Ok(DispatchOutcome::Delivered {
                    status: status.as_u16(),
                })
            }
            Err(e) if e.is_connect() => {
                tracing::warn!(
                    url = %self.callback_url,
                    "Callback receiver not listening, continuing: {}",
                    e
                );
                Ok(DispatchOutcome::ReceiverUnavailable)
            }
            Err(e) => Err(SimError::Callback(format!("callback delivery failed: {e}")).into()),
        }
    }
}
