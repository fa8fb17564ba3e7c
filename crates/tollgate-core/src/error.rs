//! Error types for the security pipeline.

use thiserror::Error;

/// Faults raised by a credential store or counter backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint was violated on insert.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Any other backend failure.
    #[error("store error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced while parsing, verifying or minting bearer tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The value is not a structurally valid token.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The token's `exp` claim is in the past.
    #[error("token expired")]
    Expired,

    /// The token carries no usable subject claim.
    #[error("token has no subject")]
    MissingSubject,

    /// Signature, issuer or audience verification failed.
    #[error("token verification failed: {0}")]
    Verification(String),

    /// Token could not be encoded.
    #[error("token encoding failed: {0}")]
    Encoding(String),

    /// No signing or verification key is configured.
    #[error("token key not configured: {0}")]
    KeyNotConfigured(String),
}

/// Rejections raised by pipeline stages.
///
/// Every variant maps to exactly one HTTP outcome in the gateway. Internal
/// faults are carried separately from credential rejections so the stage can
/// decide whether to fail open or closed.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// API key unknown, inactive, expired or revoked.
    #[error("invalid or expired API key")]
    InvalidApiKey,

    /// Bearer token is structurally invalid, expired or failed verification.
    #[error("invalid bearer token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Presented credential is on the blacklist.
    #[error("token has been revoked")]
    TokenRevoked,

    /// Presented session is unknown, inactive or expired.
    #[error("session has expired or is invalid")]
    SessionInvalid,

    /// The operation requires an identity and none was established.
    #[error("authentication required")]
    Unauthenticated,

    /// The identity lacks the operation's required scope.
    #[error("insufficient scope: requires {required}")]
    InsufficientScope {
        /// Scope the operation declared.
        required: String,
    },

    /// Store fault during a check.
    #[error("credential store failure: {0}")]
    Store(#[from] StoreError),
}

/// Result type for pipeline stages.
pub type SecurityResult<T> = Result<T, SecurityError>;

impl SecurityError {
    /// Whether the error is an internal fault rather than a caller mistake.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SecurityError::Store(_)
                | SecurityError::InvalidToken(TokenError::KeyNotConfigured(_))
                | SecurityError::InvalidToken(TokenError::Encoding(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SecurityError::InsufficientScope {
            required: "write".to_string(),
        };
        assert!(err.to_string().contains("write"));

        let err: SecurityError = TokenError::Expired.into();
        assert_eq!(err.to_string(), "invalid bearer token: token expired");
    }

    #[test]
    fn test_internal_classification() {
        let err: SecurityError = StoreError::Unavailable("timeout".into()).into();
        assert!(err.is_internal());
        assert!(!SecurityError::InvalidApiKey.is_internal());
        assert!(!SecurityError::TokenRevoked.is_internal());
        assert!(!SecurityError::from(TokenError::Malformed("x".into())).is_internal());
    }
}
