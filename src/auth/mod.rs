//! OAuth 2.0 authorization-code + PKCE building blocks
//!
//! # Module Layout
//!
//! - [`token`]        -- HS256 test tokens used as bearer credentials
//! - [`pkce`]         -- PKCE `S256` material and the CSRF state nonce
//! - [`discovery`]    -- RFC 8414 authorization server metadata
//! - [`registration`] -- RFC 7591 dynamic client registration
//! - [`approval`]     -- authorization URL assembly and code fabrication

pub mod approval;
pub mod discovery;
pub mod pkce;
pub mod registration;
pub mod token;
