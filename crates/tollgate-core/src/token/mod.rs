//! Bearer token handling.
//!
//! - [`TokenCodec`] performs structural and temporal checks only. It never
//!   verifies signatures and is what the authenticator runs before consulting
//!   the blacklist.
//! - [`JwtVerifier`] is the standard, signature-verifying bearer verifier that
//!   produces the final bearer identity.
//! - [`TokenIssuer`] mints access tokens for the refresh exchange.
//!
//! # Claims
//!
//! ```json
//! {
//!   "sub": "user-123",
//!   "name": "Alice",
//!   "email": "alice@example.com",
//!   "sid": "3f0c…",
//!   "exp": 1735689600,
//!   "iat": 1735603200,
//!   "iss": "tollgate",
//!   "jti": "6d1e…"
//! }
//! ```

mod codec;
mod issuer;
mod verifier;

pub use codec::TokenCodec;
pub use issuer::{IssuedToken, TokenIssuer};
pub use verifier::{JwtConfig, JwtVerifier};

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// Claims carried by access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user identifier).
    #[serde(default)]
    pub sub: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Session id the token was issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Expiration time (Unix timestamp).
    #[serde(default)]
    pub exp: Option<u64>,

    /// Issued at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Token id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl TokenClaims {
    /// Bearer identity described by these claims.
    pub fn to_identity(&self) -> Identity {
        let display_name = self.name.clone().unwrap_or_else(|| self.sub.clone());
        let identity = Identity::bearer(self.sub.clone(), display_name, self.email.clone());
        match &self.sid {
            Some(sid) => identity.with_session_id(sid.clone()),
            None => identity,
        }
    }
}

/// Current Unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
