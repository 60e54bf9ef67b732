//! Authorization server metadata discovery (RFC 8414)
//!
//! The backend publishes its OAuth endpoints at
//! `/.well-known/oauth-authorization-server`. The simulator reads that
//! document when it is available so registration and the logged
//! authorization URL follow whatever the server advertises. When discovery
//! fails the conventional `/oauth2/register` and `/oauth2/authorize` paths
//! under the server base URL are used instead.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::pkce;
use crate::error::{Result, SimError};

/// Conventional registration path on the backend.
pub const REGISTRATION_PATH: &str = "/oauth2/register";

/// Conventional authorization path on the backend.
pub const AUTHORIZATION_PATH: &str = "/oauth2/authorize";

/// Per-request timeout for metadata fetches.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata document describing an OAuth 2.0 authorization server.
///
/// # Examples
///
/// ```
/// use oauth_flow_sim::auth::discovery::AuthorizationServerMetadata;
///
/// let json = r#"{
///     "issuer": "http://localhost:8081",
///     "authorization_endpoint": "http://localhost:8081/oauth2/authorize",
///     "token_endpoint": "http://localhost:8081/oauth2/token",
///     "response_types_supported": ["code"]
/// }"#;
///
/// let meta: AuthorizationServerMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.issuer, "http://localhost:8081");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// The issuer identifier URI.
    pub issuer: String,

    /// Authorization endpoint URL.
    pub authorization_endpoint: String,

    /// Token endpoint URL.
    pub token_endpoint: String,

    /// Dynamic Client Registration endpoint (RFC 7591), if offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// Scopes the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// `response_type` values the server supports.
    #[serde(default)]
    pub response_types_supported: Vec<String>,

    /// `grant_type` values the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    /// PKCE challenge methods the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// The two endpoints the simulated flow touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    /// Where dynamic client registration is POSTed.
    pub registration: Url,
    /// Base of the (logged, never called) authorization URL.
    pub authorization: Url,
}

impl OAuthEndpoints {
    /// Conventional endpoints under `base_url`.
    pub fn from_base(base_url: &Url) -> Result<Self> {
        Ok(Self {
            registration: base_url.join(REGISTRATION_PATH)?,
            authorization: base_url.join(AUTHORIZATION_PATH)?,
        })
    }

    /// Endpoints advertised by `metadata`, with the conventional
    /// registration path when the server does not list one.
    pub fn from_metadata(base_url: &Url, metadata: &AuthorizationServerMetadata) -> Result<Self> {
        let registration = match metadata.registration_endpoint {
            Some(ref endpoint) => Url::parse(endpoint)?,
            None => base_url.join(REGISTRATION_PATH)?,
        };
        Ok(Self {
            registration,
            authorization: Url::parse(&metadata.authorization_endpoint)?,
        })
    }
}

/// Candidate well-known locations, tried in order.
fn candidate_urls(base_url: &Url) -> Vec<Url> {
    [
        "/.well-known/oauth-authorization-server",
        "/.well-known/openid-configuration",
    ]
    .iter()
    .filter_map(|path| base_url.join(path).ok())
    .collect()
}

/// Fetches the authorization server metadata document for `base_url`.
///
/// Returns the first candidate that answers 2xx with a parseable document.
///
/// # Errors
///
/// Returns [`SimError::Discovery`] when no candidate yields a document.
pub async fn fetch_authorization_server_metadata(
    http: &reqwest::Client,
    base_url: &Url,
) -> Result<AuthorizationServerMetadata> {
    let mut last_error = String::from("no candidate URLs");

    for candidate in candidate_urls(base_url) {
        let resp = match http.get(candidate.clone()).timeout(DISCOVERY_TIMEOUT).send().await {
            Ok(resp) => resp,
            Err(e) => {
                last_error = format!("{candidate}: {e}");
                continue;
            }
        };

        if !resp.status().is_success() {
            last_error = format!("{candidate}: HTTP {}", resp.status());
            continue;
        }

        match resp.json::<AuthorizationServerMetadata>().await {
            Ok(meta) => {
                tracing::debug!(
                    url = %candidate,
                    issuer = %meta.issuer,
                    "discovered authorization server"
                );
                return Ok(meta);
            }
            Err(e) => last_error = format!("{candidate}: invalid metadata: {e}"),
        }
    }

    Err(SimError::Discovery(format!(
        "authorization server metadata not found for {base_url} ({last_error})"
    ))
    .into())
}

/// Resolves the endpoints for a flow.
///
/// With `discover` set, the metadata document is fetched and must advertise
/// PKCE `S256`. A missing document falls back to the conventional paths;
/// a document without `S256` is an error.
pub async fn resolve_endpoints(
    http: &reqwest::Client,
    base_url: &Url,
    discover: bool,
) -> Result<OAuthEndpoints> {
    if !discover {
        return OAuthEndpoints::from_base(base_url);
    }

    match fetch_authorization_server_metadata(http, base_url).await {
        Ok(metadata) => {
            pkce::verify_s256_support(&metadata)?;
            OAuthEndpoints::from_metadata(base_url, &metadata)
        }
        Err(e) => {
            tracing::warn!("Discovery failed, using conventional endpoints: {}", e);
            OAuthEndpoints::from_base(base_url)
        }
    }
}
