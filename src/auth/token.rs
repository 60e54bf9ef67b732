//! HS256 test token generation
//!
//! Produces three-segment `header.payload.signature` tokens in JWT shape,
//! signed with HMAC-SHA256 over a shared test secret. The backend under test
//! accepts these as bearer credentials when it is started with the same
//! secret. They are not meant for any production trust boundary.
//!
//! # Token layout
//!
//! - header: `{"alg":"HS256","typ":"JWT"}`
//! - payload: `sub`, `email`, `iat`, `exp = iat + ttl`, `providers: []`,
//!   and an optional `scope`
//! - signature: `HMAC-SHA256(secret, base64url(header) + "." + base64url(payload))`
//!
//! All segments are base64url without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Result, SimError};

type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding the shared signing secret.
pub const JWT_SECRET_ENV: &str = "OAUTH_SIM_JWT_SECRET";

/// Secret used when [`JWT_SECRET_ENV`] is unset. Matches the backend's
/// test-mode default so a freshly spawned server accepts the tokens.
pub const DEFAULT_TEST_SECRET: &str = "test_jwt_secret_for_automated_tests_only";

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,
    /// User email
    pub email: String,
    /// Issued-at, Unix seconds
    pub iat: i64,
    /// Expiry, Unix seconds
    pub exp: i64,
    /// Connected fitness providers; always empty for generated tokens
    #[serde(default)]
    pub providers: Vec<String>,
    /// Optional space-separated scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// A generated, immutable test token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestToken {
    /// Subject the token was issued for
    pub subject: String,
    /// Email embedded in the claims
    pub email: String,
    /// Issue instant
    pub issued_at: DateTime<Utc>,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Scope claim, when one was stamped
    pub scope: Option<String>,
    /// The encoded `header.payload.signature` string
    pub raw: String,
}

impl TestToken {
    /// The encoded token string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Value for an `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.raw)
    }
}

/// Signs test tokens with a shared HMAC secret.
///
/// # Examples
///
/// ```
/// use oauth_flow_sim::auth::token::TokenGenerator;
///
/// let generator = TokenGenerator::new("secret");
/// let token = generator.generate("user-1", "user@example.com", 3600).unwrap();
/// let claims = generator.verify(token.as_str()).unwrap();
/// assert_eq!(claims.exp, claims.iat + 3600);
/// ```
#[derive(Clone)]
pub struct TokenGenerator {
    secret: Vec<u8>,
    scope: Option<String>,
}

impl std::fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

impl TokenGenerator {
    /// Creates a generator keyed by `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            scope: None,
        }
    }

    /// Creates a generator keyed by `OAUTH_SIM_JWT_SECRET`, or by
    /// [`DEFAULT_TEST_SECRET`] when the variable is unset or empty.
    pub fn from_env() -> Self {
        match std::env::var(JWT_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => Self::new(secret),
            _ => {
                tracing::debug!("{} not set, using built-in test secret", JWT_SECRET_ENV);
                Self::new(DEFAULT_TEST_SECRET)
            }
        }
    }

    /// Stamps a `scope` claim onto every token generated afterwards.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Generates a token issued now that lives for `ttl_secs` seconds.
    pub fn generate(&self, subject: &str, email: &str, ttl_secs: u64) -> Result<TestToken> {
        self.generate_at(subject, email, ttl_secs, Utc::now())
    }

    /// Generates a token as if issued at `issued_at`.
    ///
    /// Two calls with identical arguments produce identical tokens.
    pub fn generate_at(
        &self,
        subject: &str,
        email: &str,
        ttl_secs: u64,
        issued_at: DateTime<Utc>,
    ) -> Result<TestToken> {
        let iat = issued_at.timestamp();
        let ttl = i64::try_from(ttl_secs)
            .map_err(|_| SimError::Token(format!("ttl {ttl_secs} is out of range")))?;
        let exp = iat
            .checked_add(ttl)
            .ok_or_else(|| SimError::Token(format!("ttl {ttl_secs} overflows expiry")))?;

        let claims = TokenClaims {
            sub: subject.to_string(),
            email: email.to_string(),
            iat,
            exp,
            providers: Vec::new(),
            scope: self.scope.clone(),
        };

        let header = URL_SAFE_NO_PAD.encode(HEADER_JSON.as_bytes());
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| SimError::Token(format!("expiry {exp} is not a valid timestamp")))?;

        tracing::debug!(sub = %subject, iat, exp, "generated test token");

        Ok(TestToken {
            subject: subject.to_string(),
            email: email.to_string(),
            issued_at: Utc
                .timestamp_opt(iat, 0)
                .single()
                .unwrap_or(issued_at),
            expires_at,
            scope: self.scope.clone(),
            raw: format!("{signing_input}.{signature}"),
        })
    }

    /// Verifies the signature and expiry of `raw` and returns its claims.
    pub fn verify(&self, raw: &str) -> Result<TokenClaims> {
        self.verify_at(raw, Utc::now())
    }

    /// Verifies `raw` as of the instant `now`.
    pub fn verify_at(&self, raw: &str, now: DateTime<Utc>) -> Result<TokenClaims> {
        let (signing_input, signature) = raw
            .rsplit_once('.')
            .ok_or_else(|| SimError::Token("token must have three segments".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| SimError::Token(format!("signature is not base64url: {e}")))?;

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SimError::Token("signature mismatch".to_string()))?;

        let claims = decode_claims(raw)?;
        if claims.exp <= now.timestamp() {
            return Err(SimError::Token(format!("token expired at {}", claims.exp)).into());
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SimError::Token(format!("HMAC key rejected: {e}")).into())
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Decodes the payload segment of `raw` without checking the signature.
pub fn decode_claims(raw: &str) -> Result<TokenClaims> {
    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() != 3 {
        return Err(SimError::Token(format!(
            "token must have three segments, found {}",
            segments.len()
        ))
        .into());
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|e| SimError::Token(format!("payload is not base64url: {e}")))?;
    Ok(serde_json::from_slice(&payload)?)
}
