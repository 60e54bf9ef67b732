//! Simulated user approval
//!
//! A real flow sends the user's browser to the authorization endpoint and
//! receives a server-issued code after consent. The simulator only builds
//! the URL that would be opened (for the log) and fabricates the code
//! locally. The authorization endpoint is never called, so the server's
//! consent logic is not exercised here.

use std::fmt;

use rand::RngCore as _;
use url::Url;

use crate::auth::pkce::PkceMaterial;
use crate::auth::registration::ClientRegistration;

/// Opaque stand-in for a server-issued authorization grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    /// Generates a 32-character lowercase hex code from 16 random bytes.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The code as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorizationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AuthorizationCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Result of the approval step.
#[derive(Debug, Clone)]
pub struct SimulatedApproval {
    /// The URL a user would have been sent to.
    pub authorization_url: Url,
    /// The fabricated code.
    pub code: AuthorizationCode,
}

/// Builds the authorization request URL.
///
/// Includes `client_id`, `redirect_uri`, `response_type=code`, `scope`,
/// `state`, `code_challenge`, and `code_challenge_method`.
pub fn build_authorization_url(
    authorize_endpoint: &Url,
    registration: &ClientRegistration,
    redirect_uri: &str,
    pkce: &PkceMaterial,
) -> Url {
    let mut url = authorize_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &registration.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &registration.scope)
        .append_pair("state", &pkce.state)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", &pkce.method);
    url
}

/// Builds and logs the authorization URL, then fabricates a code.
pub fn simulate_approval(
    authorize_endpoint: &Url,
    registration: &ClientRegistration,
    redirect_uri: &str,
    pkce: &PkceMaterial,
) -> SimulatedApproval {
    let authorization_url =
        build_authorization_url(authorize_endpoint, registration, redirect_uri, pkce);
    tracing::info!(url = %authorization_url, "Authorization URL (not opened)");

    let code = AuthorizationCode::generate();
    tracing::debug!(code = %code, "Fabricated authorization code");

    SimulatedApproval {
        authorization_url,
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::pkce;
    use std::collections::HashMap;

    fn registration() -> ClientRegistration {
        ClientRegistration {
            client_id: "test_simulator_1".to_string(),
            client_secret: "secret".to_string(),
            redirect_uris: vec!["http://localhost:35535/oauth/callback".to_string()],
            grant_types: vec!["authorization_code".to_string()],
            response_types: vec!["code".to_string()],
            scope: "fitness:read activities:read".to_string(),
            client_name: "sim".to_string(),
            client_uri: "http://localhost".to_string(),
        }
    }

    #[test]
    fn test_code_is_32_hex_chars() {
        let code = AuthorizationCode::generate();
        assert_eq!(code.as_str().len(), 32);
        assert!(code.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_codes_are_unique() {
        assert_ne!(AuthorizationCode::generate(), AuthorizationCode::generate());
    }

    #[test]
    fn test_authorization_url_carries_every_parameter() {
        let endpoint = Url::parse("http://localhost:8081/oauth2/authorize").unwrap();
        let material = pkce::generate().unwrap();
        let url = build_authorization_url(
            &endpoint,
            &registration(),
            "http://localhost:35535/oauth/callback",
            &material,
        );

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "test_simulator_1");
        assert_eq!(params["redirect_uri"], "http://localhost:35535/oauth/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "fitness:read activities:read");
        assert_eq!(params["state"], material.state);
        assert_eq!(params["code_challenge"], material.challenge);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(url.path(), "/oauth2/authorize");
    }

    #[test]
    fn test_authorization_url_never_contains_verifier() {
        let endpoint = Url::parse("http://localhost:8081/oauth2/authorize").unwrap();
        let material = pkce::generate().unwrap();
        let approval = simulate_approval(
            &endpoint,
            &registration(),
            "http://localhost:35535/oauth/callback",
            &material,
        );
        assert!(!approval
            .authorization_url
            .as_str()
            .contains(&material.verifier));
    }
}
