//! Dynamic client registration (RFC 7591)
//!
//! The simulator registers a throwaway OAuth client with the backend once
//! per run. The request proposes its own `client_id`/`client_secret`; the
//! backend may echo them or assign new ones, and whatever it returns wins.
//!
//! A single attempt is made. Any non-2xx answer aborts the flow with
//! [`SimError::Registration`], whose message carries the HTTP status.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SimError};

/// Prefix of simulator-proposed client ids.
pub const CLIENT_ID_PREFIX: &str = "test_simulator_";

/// Default per-request timeout for registration.
pub const DEFAULT_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Body POSTed to the registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Proposed client id
    pub client_id: String,
    /// Proposed client secret
    pub client_secret: String,
    /// Redirect URIs the client will use
    pub redirect_uris: Vec<String>,
    /// Requested grant types
    pub grant_types: Vec<String>,
    /// Requested response types
    pub response_types: Vec<String>,
    /// Space-separated scope
    pub scope: String,
    /// Display name shown on the consent screen
    pub client_name: String,
    /// Homepage of the client
    pub client_uri: String,
}

impl RegistrationRequest {
    /// Builds the simulator's registration request.
    ///
    /// The proposed id is `test_simulator_<issued_at_millis>` and the
    /// proposed secret is 32 random bytes in hex.
    pub fn for_simulator(
        redirect_uri: &str,
        scope: &str,
        client_name: &str,
        client_uri: &str,
        issued_at_millis: i64,
    ) -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);

        Self {
            client_id: format!("{CLIENT_ID_PREFIX}{issued_at_millis}"),
            client_secret: hex::encode(secret),
            redirect_uris: vec![redirect_uri.to_string()],
            grant_types: vec!["authorization_code".to_string()],
            response_types: vec!["code".to_string()],
            scope: scope.to_string(),
            client_name: client_name.to_string(),
            client_uri: client_uri.to_string(),
        }
    }
}

/// Registration response; every field is optional because the backend
/// may echo only part of the request.
#[derive(Debug, Default, Deserialize)]
struct RegistrationResponse {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    grant_types: Option<Vec<String>>,
    #[serde(default)]
    response_types: Option<Vec<String>>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    client_uri: Option<String>,
}

/// A registered OAuth client, owned by one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    /// Client id in effect
    pub client_id: String,
    /// Client secret in effect
    pub client_secret: String,
    /// Registered redirect URIs
    pub redirect_uris: Vec<String>,
    /// Registered grant types
    pub grant_types: Vec<String>,
    /// Registered response types
    pub response_types: Vec<String>,
    /// Registered scope
    pub scope: String,
    /// Display name
    pub client_name: String,
    /// Client homepage
    pub client_uri: String,
}

impl ClientRegistration {
    /// Merges the server response over the request, field by field.
    fn merge(request: &RegistrationRequest, response: RegistrationResponse) -> Self {
        Self {
            client_id: response
                .client_id
                .unwrap_or_else(|| request.client_id.clone()),
            client_secret: response
                .client_secret
                .unwrap_or_else(|| request.client_secret.clone()),
            redirect_uris: response
                .redirect_uris
                .unwrap_or_else(|| request.redirect_uris.clone()),
            grant_types: response
                .grant_types
                .unwrap_or_else(|| request.grant_types.clone()),
            response_types: response
                .response_types
                .unwrap_or_else(|| request.response_types.clone()),
            scope: response.scope.unwrap_or_else(|| request.scope.clone()),
            client_name: response
                .client_name
                .unwrap_or_else(|| request.client_name.clone()),
            client_uri: response
                .client_uri
                .unwrap_or_else(|| request.client_uri.clone()),
        }
    }

    /// The first registered redirect URI.
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.first().map(String::as_str)
    }
}

/// Performs dynamic client registration against one endpoint.
#[derive(Debug, Clone)]
pub struct ClientRegistrar {
    http: Arc<reqwest::Client>,
    endpoint: Url,
    timeout: Duration,
}

impl ClientRegistrar {
    /// Creates a registrar POSTing to `endpoint`.
    pub fn new(http: Arc<reqwest::Client>, endpoint: Url) -> Self {
        Self {
            http,
            endpoint,
            timeout: DEFAULT_REGISTRATION_TIMEOUT,
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint registrations are POSTed to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Registers the client described by `request`.
    ///
    /// # Errors
    ///
    /// - [`SimError::Registration`] on any non-2xx status.
    /// - [`SimError::Http`] when the request cannot be sent.
    /// - [`SimError::Serialization`] when a 2xx body is not JSON.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<ClientRegistration> {
        tracing::info!(
            endpoint = %self.endpoint,
            client_id = %request.client_id,
            "Registering OAuth client"
        );

        let resp = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(SimError::Http)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Client registration rejected");
            return Err(SimError::Registration {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let text = resp.text().await.map_err(SimError::Http)?;
        let response: RegistrationResponse = if text.trim().is_empty() {
            RegistrationResponse::default()
        } else {
            serde_json::from_str(&text).map_err(SimError::Serialization)?
        };

        let registration = ClientRegistration::merge(request, response);
        tracing::info!(client_id = %registration.client_id, "OAuth client registered");
        Ok(registration)
    }
}
