//! Structural and temporal token inspection.

use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

use super::{unix_now, TokenClaims};
use crate::error::TokenError;

/// Parses bearer tokens without verifying their signature.
///
/// A token passes inspection iff it is a parseable JWT, its `exp` claim is
/// present and not in the past (allowing for leeway), and its `sub` claim
/// is non-empty.
#[derive(Debug, Clone, Copy)]
pub struct TokenCodec {
    leeway_secs: u64,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TokenCodec {
    /// Create a codec with the given expiration leeway.
    pub fn new(leeway_secs: u64) -> Self {
        Self { leeway_secs }
    }

    /// Inspect `token` against the current time.
    pub fn inspect(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.inspect_at(token, unix_now())
    }

    /// Inspect `token` against `now` (Unix seconds).
    pub fn inspect_at(&self, token: &str, now: u64) -> Result<TokenClaims, TokenError> {
        let claims = Self::decode_unverified(token)?;

        let exp = claims
            .exp
            .ok_or_else(|| TokenError::Malformed("missing exp claim".to_string()))?;
        if exp.saturating_add(self.leeway_secs) <= now {
            return Err(TokenError::Expired);
        }

        if claims.sub.trim().is_empty() {
            return Err(TokenError::MissingSubject);
        }

        Ok(claims)
    }

    /// Decode the claims of `token` with no signature or claim validation.
    pub fn decode_unverified(token: &str) -> Result<TokenClaims, TokenError> {
        decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Malformed(e.to_string()))
    }
}
