//! Tollgate core: the request security pipeline.
//!
//! This crate holds every decision the gateway makes about a request before it
//! reaches a handler:
//!
//! - [`Authenticator`]: dispatches to exactly one strategy (API key or bearer)
//! - [`RevocationChecker`]: blacklist lookups by credential hash
//! - [`SessionValidator`]: session liveness and anomaly flagging
//! - [`scope::authorize`]: per-operation scope decisions
//! - [`RateLimiter`]: tiered, fixed-window request budgets
//!
//! Persistent state lives behind the [`store::CredentialStore`] and
//! [`rate_limit::CounterStore`] traits.

pub mod authenticator;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod rate_limit;
pub mod records;
pub mod request;
pub mod revocation;
pub mod scope;
pub mod session;
pub mod store;
pub mod token;

pub use authenticator::{AuthOutcome, Authenticator};
pub use error::{SecurityError, SecurityResult, StoreError, StoreResult, TokenError};
pub use identity::{AuthKind, Identity};
pub use rate_limit::{
    AuthLevel, CounterStore, MemoryCounterStore, RateLimitPolicy, RateLimitResult, RateLimiter,
    TierBudget,
};
pub use records::{
    ApiKeyRecord, BlacklistedTokenRecord, RefreshTokenRecord, SessionRecord, TokenKind, UserRecord,
};
pub use request::{Credential, InboundRequest};
pub use revocation::RevocationChecker;
pub use scope::{Scope, ScopeDecision, ScopeSet};
pub use session::{SessionOutcome, SessionValidator};
pub use store::{CredentialStore, MemoryCredentialStore};
pub use token::{IssuedToken, JwtConfig, JwtVerifier, TokenClaims, TokenCodec, TokenIssuer};
