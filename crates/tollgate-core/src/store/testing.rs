//! Store doubles for failure injection.

use async_trait::async_trait;
use uuid::Uuid;

use super::{ApiKeyStore, SessionStore, TokenStore, UserStore};
use crate::error::{StoreError, StoreResult};
use crate::records::{
    ApiKeyRecord, BlacklistedTokenRecord, RefreshTokenRecord, SessionRecord, TokenKind, UserRecord,
};

/// A store whose every call fails as unavailable.
#[derive(Debug, Default)]
pub(crate) struct UnavailableStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl ApiKeyStore for UnavailableStore {
    async fn find_api_key_by_secret(&self, _secret: &str) -> StoreResult<Option<ApiKeyRecord>> {
        down()
    }

    async fn touch_api_key_usage(&self, _id: Uuid, _ip: Option<&str>) -> StoreResult<()> {
        down()
    }

    async fn insert_api_key(&self, _record: ApiKeyRecord) -> StoreResult<()> {
        down()
    }

    async fn revoke_api_key(&self, _id: Uuid, _reason: &str, _ip: Option<&str>) -> StoreResult<bool> {
        down()
    }
}

#[async_trait]
impl TokenStore for UnavailableStore {
    async fn is_blacklisted(&self, _token_hash: &str, _kind: TokenKind) -> StoreResult<bool> {
        down()
    }

    async fn blacklist_token(&self, _record: BlacklistedTokenRecord) -> StoreResult<()> {
        down()
    }

    async fn find_refresh_token(&self, _token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        down()
    }

    async fn save_refresh_token(&self, _record: RefreshTokenRecord) -> StoreResult<()> {
        down()
    }

    async fn revoke_refresh_token(
        &self,
        _token: &str,
        _reason: &str,
        _ip: Option<&str>,
    ) -> StoreResult<bool> {
        down()
    }

    async fn current_token_version(&self, _user_id: &str) -> StoreResult<u64> {
        down()
    }

    async fn bump_token_version(&self, _user_id: &str) -> StoreResult<u64> {
        down()
    }
}

#[async_trait]
impl SessionStore for UnavailableStore {
    async fn find_session(&self, _id: &str) -> StoreResult<Option<SessionRecord>> {
        down()
    }

    async fn touch_session_activity(&self, _id: &str) -> StoreResult<()> {
        down()
    }

    async fn append_session_suspicion(&self, _id: &str, _reason: &str) -> StoreResult<()> {
        down()
    }

    async fn insert_session(&self, _record: SessionRecord) -> StoreResult<()> {
        down()
    }
}

#[async_trait]
impl UserStore for UnavailableStore {
    async fn find_user(&self, _id: &str) -> StoreResult<Option<UserRecord>> {
        down()
    }

    async fn upsert_user(&self, _record: UserRecord) -> StoreResult<()> {
        down()
    }
}
