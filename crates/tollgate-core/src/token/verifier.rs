//! Bearer token signature checks.
//!
//! The verifier runs after the authenticator has found a structurally
//! sound, unrevoked bearer token, and is the only place its signature is
//! checked. Keys come from one of:
//!
//! | Variable                       | Key                   | Algorithm |
//! |--------------------------------|-----------------------|-----------|
//! | `TOLLGATE_JWT_SECRET`          | shared HMAC secret    | HS256     |
//! | `TOLLGATE_JWT_RSA_PUBLIC_KEY`  | RSA public key, PEM   | RS256     |
//! | `TOLLGATE_JWT_EC_PUBLIC_KEY`   | P-256 public key, PEM | ES256     |
//!
//! The first variable set wins.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::TokenClaims;
use crate::error::TokenError;
use crate::identity::Identity;

const KEY_VARS: [(&str, Algorithm); 3] = [
    ("TOLLGATE_JWT_SECRET", Algorithm::HS256),
    ("TOLLGATE_JWT_RSA_PUBLIC_KEY", Algorithm::RS256),
    ("TOLLGATE_JWT_EC_PUBLIC_KEY", Algorithm::ES256),
];

/// What a token must satisfy besides its signature.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub algorithm: Algorithm,
    /// `iss` must equal this when set.
    pub issuer: Option<String>,
    /// `aud` must contain this when set. Otherwise `aud` is ignored.
    pub audience: Option<String>,
    /// Clock skew tolerated on `exp`.
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            issuer: None,
            audience: None,
            leeway_secs: 60,
        }
    }
}

impl JwtConfig {
    fn validation(&self) -> Validation {
        // `exp` stays a required claim.
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = self.leeway_secs;
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

/// Checks bearer token signatures and turns the claims into an [`Identity`].
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    config: JwtConfig,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// HS256 with a shared secret.
    pub fn with_secret(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            config: JwtConfig::default(),
        }
    }

    /// RS256 or ES256 with a PEM public key. Any other algorithm is refused.
    pub fn with_public_key_pem(pem: &[u8], algorithm: Algorithm) -> Result<Self, TokenError> {
        let key = match algorithm {
            Algorithm::RS256 => DecodingKey::from_rsa_pem(pem),
            Algorithm::ES256 => DecodingKey::from_ec_pem(pem),
            other => {
                return Err(TokenError::KeyNotConfigured(format!(
                    "{other:?} is not a supported public key algorithm"
                )))
            }
        }
        .map_err(|e| TokenError::KeyNotConfigured(format!("bad {algorithm:?} public key: {e}")))?;

        Ok(Self {
            key,
            config: JwtConfig {
                algorithm,
                ..JwtConfig::default()
            },
        })
    }

    /// Build from the first key variable that is set.
    pub fn from_env() -> Result<Self, TokenError> {
        for (var, algorithm) in KEY_VARS {
            let Ok(value) = std::env::var(var) else {
                continue;
            };
            return match algorithm {
                Algorithm::HS256 => Ok(Self::with_secret(value.as_bytes())),
                _ => Self::with_public_key_pem(value.as_bytes(), algorithm),
            };
        }
        Err(TokenError::KeyNotConfigured(
            "none of TOLLGATE_JWT_SECRET, TOLLGATE_JWT_RSA_PUBLIC_KEY, TOLLGATE_JWT_EC_PUBLIC_KEY is set"
                .to_string(),
        ))
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.config.audience = Some(audience.into());
        self
    }

    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.config.leeway_secs = secs;
        self
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Claims of `token` once its signature, `exp`, `iss` and `aud` hold and
    /// `sub` is non-empty.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.key, &self.config.validation())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Verification(e.to_string()),
            })?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(TokenError::MissingSubject);
        }
        Ok(claims)
    }

    /// The bearer identity `token` asserts.
    pub fn authenticate(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_token(token).map(|claims| claims.to_identity())
    }
}
