//! Credential store interfaces.
//!
//! The store owns every persistent record. The pipeline calls the narrow
//! query/command methods below and never deletes records itself. Each
//! command must be atomic on its own (row-level), so concurrent requests
//! never serialize on a pipeline-wide lock and a cancelled request never
//! leaves a half-written record.
//!
//! Timeouts are the store's responsibility; the pipeline treats any
//! [`StoreError`](crate::error::StoreError) as a generic internal failure.

mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryCredentialStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::records::{
    ApiKeyRecord, BlacklistedTokenRecord, RefreshTokenRecord, SessionRecord, TokenKind, UserRecord,
};

/// API key lookups and commands.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Find the key whose secret hashes to the stored hash of `secret`.
    async fn find_api_key_by_secret(&self, secret: &str) -> StoreResult<Option<ApiKeyRecord>>;

    /// Record a use of the key: last-used timestamp and, when known, origin
    /// IP. An unknown IP keeps the previously recorded one.
    async fn touch_api_key_usage(&self, id: Uuid, ip: Option<&str>) -> StoreResult<()>;

    /// Insert a new key. Fails with `Duplicate` if the secret hash exists.
    async fn insert_api_key(&self, record: ApiKeyRecord) -> StoreResult<()>;

    /// Revoke a key. Returns `false` if the key does not exist.
    async fn revoke_api_key(&self, id: Uuid, reason: &str, ip: Option<&str>) -> StoreResult<bool>;
}

/// Blacklist and refresh token lookups and commands.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Whether a non-expired blacklist row of `kind` matches `token_hash`.
    async fn is_blacklisted(&self, token_hash: &str, kind: TokenKind) -> StoreResult<bool>;

    /// Insert (or refresh) a blacklist row.
    async fn blacklist_token(&self, record: BlacklistedTokenRecord) -> StoreResult<()>;

    /// Find a refresh token by value.
    async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Save a newly issued refresh token.
    async fn save_refresh_token(&self, record: RefreshTokenRecord) -> StoreResult<()>;

    /// Mark a refresh token revoked. Returns `false` if it does not exist or
    /// was already revoked.
    async fn revoke_refresh_token(
        &self,
        token: &str,
        reason: &str,
        ip: Option<&str>,
    ) -> StoreResult<bool>;

    /// The user's current token version (0 for unknown users).
    async fn current_token_version(&self, user_id: &str) -> StoreResult<u64>;

    /// Increment the user's token version, returning the new value.
    async fn bump_token_version(&self, user_id: &str) -> StoreResult<u64>;
}

/// Session lookups and commands.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Find a session by id.
    async fn find_session(&self, id: &str) -> StoreResult<Option<SessionRecord>>;

    /// Bump last-activity to now. Never moves it backwards.
    async fn touch_session_activity(&self, id: &str) -> StoreResult<()>;

    /// Append a suspicious-activity reason. A reason already on the session
    /// is not appended again.
    async fn append_session_suspicion(&self, id: &str, reason: &str) -> StoreResult<()>;

    /// Insert a new session.
    async fn insert_session(&self, record: SessionRecord) -> StoreResult<()>;
}

/// User lookups.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by subject id.
    async fn find_user(&self, id: &str) -> StoreResult<Option<UserRecord>>;

    /// Insert or replace a user.
    async fn upsert_user(&self, record: UserRecord) -> StoreResult<()>;
}

/// Everything the pipeline needs from persistent storage.
pub trait CredentialStore: ApiKeyStore + TokenStore + SessionStore + UserStore {}

impl<T> CredentialStore for T where T: ApiKeyStore + TokenStore + SessionStore + UserStore {}
