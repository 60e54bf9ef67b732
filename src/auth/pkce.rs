//! PKCE S256 material generation
//!
//! Implements the Proof Key for Code Exchange (PKCE) extension to OAuth 2.0
//! as defined in RFC 7636, restricted to the `S256` challenge method, plus
//! the CSRF `state` nonce that travels with the authorization request.
//!
//! # How PKCE works
//!
//! 1. The client generates a high-entropy random string called the `code_verifier`.
//! 2. The client computes a SHA-256 hash of the verifier and base64url-encodes
//!    it to produce the `code_challenge`.
//! 3. The authorization request includes `code_challenge` and
//!    `code_challenge_method=S256`.
//! 4. The token exchange request includes the original `code_verifier`.
//! 5. The authorization server recomputes the challenge and compares it to
//!    the value sent in step 3, proving possession of the verifier.
//!
//! In the simulated flow the exchange happens inside the client under test,
//! so the verifier never leaves this process.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use rand::RngCore as _;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::auth::discovery::AuthorizationServerMetadata;
use crate::error::{Result, SimError};

/// The only challenge method produced here.
pub const S256: &str = "S256";

/// PKCE verifier/challenge pair plus the CSRF `state` for one flow.
///
/// # Examples
///
/// ```
/// use oauth_flow_sim::auth::pkce::generate;
///
/// let pkce = generate().expect("PKCE generation must not fail");
/// assert_eq!(pkce.method, "S256");
/// assert_eq!(pkce.verifier.len(), 43);
/// assert_eq!(pkce.state.len(), 32);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct PkceMaterial {
    /// The code verifier: 32 random bytes, base64url without padding
    /// (43 characters). Only ever sent in the token exchange.
    pub verifier: String,

    /// `base64url(sha256(verifier))`, sent with the authorization request.
    pub challenge: String,

    /// The challenge method. Always `"S256"`.
    pub method: String,

    /// CSRF correlation nonce: 16 random bytes, lowercase hex (32 characters).
    pub state: String,
}

impl PkceMaterial {
    /// Whether `challenge` is the S256 digest of `verifier`.
    pub fn is_consistent(&self) -> bool {
        challenge_for(&self.verifier) == self.challenge
    }
}

/// Generates a fresh verifier, its S256 challenge, and an independent state.
///
/// # Errors
///
/// Infallible in practice; returns a `Result` so callers can use `?`
/// uniformly with the other flow steps.
pub fn generate() -> Result<PkceMaterial> {
    let mut random_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut random_bytes);

    let verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);
    let challenge = challenge_for(&verifier);

    Ok(PkceMaterial {
        verifier,
        challenge,
        method: S256.to_string(),
        state: generate_state(),
    })
}

/// Computes the S256 challenge for `verifier`.
///
/// RFC 7636 section 4.2: `BASE64URL(SHA256(ASCII(code_verifier)))`.
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

/// Generates a 32-character lowercase hex nonce from 16 random bytes.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Verifies that the authorization server supports the PKCE `S256` method.
///
/// # Errors
///
/// Returns [`SimError::Discovery`] when `S256` is absent from
/// `code_challenge_methods_supported` or the field is missing entirely.
pub fn verify_s256_support(metadata: &AuthorizationServerMetadata) -> Result<()> {
    let supported = metadata
        .code_challenge_methods_supported
        .as_deref()
        .unwrap_or(&[]);

    if supported.iter().any(|m| m == S256) {
        Ok(())
    } else {
        Err(
            SimError::Discovery("PKCE S256 not supported by authorization server".to_string())
                .into(),
        )
    }
}
