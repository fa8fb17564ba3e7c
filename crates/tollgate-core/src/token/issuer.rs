//! Access token minting.

use std::time::Duration;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

use super::{unix_now, TokenClaims};
use crate::error::TokenError;
use crate::records::UserRecord;

/// An access token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded token.
    pub token: String,
    /// Claims encoded into the token.
    pub claims: TokenClaims,
}

/// Mints HMAC-signed access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    algorithm: Algorithm,
    issuer: Option<String>,
    audience: Option<String>,
    access_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Default access token lifetime.
    pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

    /// Create an issuer with an HMAC secret.
    pub fn with_secret(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            issuer: None,
            audience: None,
            access_ttl: Self::DEFAULT_ACCESS_TTL,
        }
    }

    /// Load the HMAC secret from `TOLLGATE_JWT_SECRET`.
    pub fn from_env() -> Result<Self, TokenError> {
        std::env::var("TOLLGATE_JWT_SECRET")
            .map(|secret| Self::with_secret(secret.as_bytes()))
            .map_err(|_| TokenError::KeyNotConfigured("TOLLGATE_JWT_SECRET is not set".to_string()))
    }

    /// Set the `iss` claim.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the `aud` claim.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set the access token lifetime.
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Mint an access token for `user`, optionally bound to a session.
    pub fn issue_access_token(
        &self,
        user: &UserRecord,
        session_id: Option<&str>,
    ) -> Result<IssuedToken, TokenError> {
        let now = unix_now();
        let claims = TokenClaims {
            sub: user.id.clone(),
            name: Some(user.username.clone()),
            email: user.email.clone(),
            sid: session_id.map(str::to_string),
            exp: Some(now + self.access_ttl.as_secs()),
            iat: Some(now),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Some(Uuid::new_v4().to_string()),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{JwtVerifier, TokenCodec};

    #[test]
    fn test_issued_token_verifies() {
        let issuer = TokenIssuer::with_secret(b"secret")
            .with_issuer("tollgate")
            .with_audience("api");
        let verifier = JwtVerifier::with_secret(b"secret")
            .with_issuer("tollgate")
            .with_audience("api");

        let user = UserRecord::new("user-1", "alice", Some("alice@example.com".into()));
        let issued = issuer.issue_access_token(&user, Some("sess-1")).unwrap();

        let claims = verifier.verify_token(&issued.token).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sid.as_deref(), Some("sess-1"));
        assert!(TokenCodec::default().inspect(&issued.token).is_ok());
    }

    #[test]
    fn test_each_token_is_unique() {
        let issuer = TokenIssuer::with_secret(b"secret");
        let user = UserRecord::new("user-1", "alice", None);
        let a = issuer.issue_access_token(&user, None).unwrap();
        let b = issuer.issue_access_token(&user, None).unwrap();
        assert_ne!(a.token, b.token);
    }
}
