/*!
Command handlers for the CLI

- `simulate`: run the full simulated authorization flow
- `listen`: wait for one OAuth callback
- `token`: print a signed test token
- `pkce`: print fresh PKCE material

Handlers write their results to stdout; diagnostics go through `tracing`.
*/

pub mod listen;
pub mod simulate;

// Token command handler
pub mod token {
    //! Prints a signed test token.

    use crate::auth::token::TokenGenerator;
    use crate::error::Result;

    /// Mints a token with the secret from `OAUTH_SIM_JWT_SECRET` and
    /// returns the encoded string.
    pub fn run_token(
        subject: &str,
        email: &str,
        ttl: u64,
        scope: Option<String>,
    ) -> Result<String> {
        let mut generator = TokenGenerator::from_env();
        if let Some(scope) = scope {
            generator = generator.with_scope(scope);
        }
        let token = generator.generate(subject, email, ttl)?;
        tracing::info!(
            subject = %token.subject,
            expires_at = %token.expires_at,
            "Generated test token"
        );
        Ok(token.raw)
    }

}

// PKCE command handler
pub mod pkce {
    //! Prints fresh PKCE material as JSON.

    use crate::auth::pkce;
    use crate::error::Result;

    /// Generates a verifier, challenge, and state and renders them as
    /// pretty JSON.
    pub fn run_pkce() -> Result<String> {
        let material = pkce::generate()?;
        Ok(serde_json::to_string_pretty(&material)?)
    }

}
