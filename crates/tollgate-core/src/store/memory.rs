//! In-process credential store backed by sharded concurrent maps.
//!
//! Each command touches a single entry under that entry's shard lock, which
//! gives row-level atomicity without serializing unrelated requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ApiKeyStore, SessionStore, TokenStore, UserStore};
use crate::crypto::hash_credential;
use crate::error::{StoreError, StoreResult};
use crate::records::{
    ApiKeyRecord, BlacklistedTokenRecord, RefreshTokenRecord, SessionRecord, TokenKind, UserRecord,
};

/// Credential store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    api_keys: DashMap<Uuid, ApiKeyRecord>,
    /// Unique index: secret hash -> key id.
    api_key_hashes: DashMap<String, Uuid>,
    blacklist: DashMap<String, BlacklistedTokenRecord>,
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
    token_versions: DashMap<String, u64>,
    sessions: DashMap<String, SessionRecord>,
    users: DashMap<String, UserRecord>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a key by id.
    pub fn api_key(&self, id: Uuid) -> Option<ApiKeyRecord> {
        self.api_keys.get(&id).map(|entry| entry.clone())
    }

    /// Snapshot of a session by id.
    pub fn session(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    /// Drop blacklist rows whose token has naturally expired. Returns the
    /// number of rows removed.
    pub fn prune_expired_blacklist(&self, now: DateTime<Utc>) -> usize {
        let before = self.blacklist.len();
        self.blacklist.retain(|_, row| row.is_in_force_at(now));
        before - self.blacklist.len()
    }

    /// Number of blacklist rows, including inert ones not yet pruned.
    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }
}

#[async_trait]
impl ApiKeyStore for MemoryCredentialStore {
    async fn find_api_key_by_secret(&self, secret: &str) -> StoreResult<Option<ApiKeyRecord>> {
        let hash = hash_credential(secret);
        let Some(id) = self.api_key_hashes.get(&hash).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self.api_keys.get(&id).map(|entry| entry.clone()))
    }

    async fn touch_api_key_usage(&self, id: Uuid, ip: Option<&str>) -> StoreResult<()> {
        if let Some(mut key) = self.api_keys.get_mut(&id) {
            let now = Utc::now();
            key.last_used_at = Some(key.last_used_at.map_or(now, |prev| prev.max(now)));
            if let Some(ip) = ip {
                key.last_used_ip = Some(ip.to_string());
            }
        }
        Ok(())
    }

    async fn insert_api_key(&self, record: ApiKeyRecord) -> StoreResult<()> {
        match self.api_key_hashes.entry(record.secret_hash.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!(
                "api key with prefix {}",
                record.prefix
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.id);
                self.api_keys.insert(record.id, record);
                Ok(())
            }
        }
    }

    async fn revoke_api_key(&self, id: Uuid, reason: &str, ip: Option<&str>) -> StoreResult<bool> {
        let Some(mut key) = self.api_keys.get_mut(&id) else {
            return Ok(false);
        };
        if key.revoked_at.is_none() {
            key.revoked_at = Some(Utc::now());
        }
        key.revoked_reason = Some(reason.to_string());
        key.revoked_by_ip = ip.map(str::to_string);
        Ok(true)
    }
}

#[async_trait]
impl TokenStore for MemoryCredentialStore {
    async fn is_blacklisted(&self, token_hash: &str, kind: TokenKind) -> StoreResult<bool> {
        let now = Utc::now();
        Ok(self
            .blacklist
            .get(token_hash)
            .is_some_and(|row| row.kind == kind && row.is_in_force_at(now)))
    }

    async fn blacklist_token(&self, record: BlacklistedTokenRecord) -> StoreResult<()> {
        self.blacklist.insert(record.token_hash.clone(), record);
        Ok(())
    }

    async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(self.refresh_tokens.get(token).map(|entry| entry.clone()))
    }

    async fn save_refresh_token(&self, record: RefreshTokenRecord) -> StoreResult<()> {
        match self.refresh_tokens.entry(record.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate("refresh token".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn revoke_refresh_token(
        &self,
        token: &str,
        reason: &str,
        ip: Option<&str>,
    ) -> StoreResult<bool> {
        let Some(mut record) = self.refresh_tokens.get_mut(token) else {
            return Ok(false);
        };
        if record.is_revoked {
            return Ok(false);
        }
        record.is_revoked = true;
        record.revoked_reason = Some(reason.to_string());
        record.revoked_by_ip = ip.map(str::to_string);
        Ok(true)
    }

    async fn current_token_version(&self, user_id: &str) -> StoreResult<u64> {
        Ok(self.token_versions.get(user_id).map_or(0, |v| *v))
    }

    async fn bump_token_version(&self, user_id: &str) -> StoreResult<u64> {
        let mut version = self.token_versions.entry(user_id.to_string()).or_insert(0);
        *version += 1;
        Ok(*version)
    }
}

#[async_trait]
impl SessionStore for MemoryCredentialStore {
    async fn find_session(&self, id: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn touch_session_activity(&self, id: &str) -> StoreResult<()> {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.last_activity_at = session.last_activity_at.max(Utc::now());
        }
        Ok(())
    }

    async fn append_session_suspicion(&self, id: &str, reason: &str) -> StoreResult<()> {
        if let Some(mut session) = self.sessions.get_mut(id) {
            if !session.suspicious_activity.iter().any(|r| r == reason) {
                session.suspicious_activity.push(reason.to_string());
            }
        }
        Ok(())
    }

    async fn insert_session(&self, record: SessionRecord) -> StoreResult<()> {
        match self.sessions.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("session {}", record.id))),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl UserStore for MemoryCredentialStore {
    async fn find_user(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.get(id).map(|entry| entry.clone()))
    }

    async fn upsert_user(&self, record: UserRecord) -> StoreResult<()> {
        self.users.insert(record.id.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeSet;
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_find_api_key_by_secret() {
        let store = MemoryCredentialStore::new();
        let (record, secret) = ApiKeyRecord::generate("u1", "ci", &ScopeSet::parse("read"), None);
        let id = record.id;
        store.insert_api_key(record).await.unwrap();

        let found = store.find_api_key_by_secret(&secret).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.find_api_key_by_secret("tg_wrong").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_secret_rejected() {
        let store = MemoryCredentialStore::new();
        let scopes = ScopeSet::parse("read");
        let first = ApiKeyRecord::from_secret("tg_same", "u1", "a", &scopes, None);
        let second = ApiKeyRecord::from_secret("tg_same", "u2", "b", &scopes, None);
        store.insert_api_key(first).await.unwrap();
        assert!(matches!(
            store.insert_api_key(second).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_touch_usage_is_idempotent_in_effect() {
        let store = MemoryCredentialStore::new();
        let (record, secret) = ApiKeyRecord::generate("u1", "ci", &ScopeSet::parse("read"), None);
        let id = record.id;
        store.insert_api_key(record).await.unwrap();

        store.touch_api_key_usage(id, Some("10.0.0.1")).await.unwrap();
        let first = store.api_key(id).unwrap();
        store.touch_api_key_usage(id, Some("10.0.0.1")).await.unwrap();
        let second = store.api_key(id).unwrap();

        assert!(second.last_used_at >= first.last_used_at);
        assert_eq!(second.last_used_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(second.user_id, first.user_id);
        assert_eq!(second.secret_hash, first.secret_hash);
        assert_eq!(second.is_usable_at(Utc::now()), first.is_usable_at(Utc::now()));
        assert!(store.find_api_key_by_secret(&secret).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_touch_without_ip_keeps_last_known_ip() {
        let store = MemoryCredentialStore::new();
        let (record, _) = ApiKeyRecord::generate("u1", "ci", &ScopeSet::parse("read"), None);
        let id = record.id;
        store.insert_api_key(record).await.unwrap();

        store.touch_api_key_usage(id, Some("10.0.0.1")).await.unwrap();
        store.touch_api_key_usage(id, None).await.unwrap();
        assert_eq!(store.api_key(id).unwrap().last_used_ip.as_deref(), Some("10.0.0.1"));

        store.touch_api_key_usage(id, Some("10.0.0.9")).await.unwrap();
        assert_eq!(store.api_key(id).unwrap().last_used_ip.as_deref(), Some("10.0.0.9"));
    }

    #[tokio::test]
    async fn test_blacklist_respects_kind_and_expiry() {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        store
            .blacklist_token(BlacklistedTokenRecord::for_token(
                "live",
                TokenKind::Access,
                now + Duration::hours(1),
            ))
            .await
            .unwrap();
        store
            .blacklist_token(BlacklistedTokenRecord::for_token(
                "stale",
                TokenKind::Access,
                now - Duration::hours(1),
            ))
            .await
            .unwrap();

        let live = hash_credential("live");
        assert!(store.is_blacklisted(&live, TokenKind::Access).await.unwrap());
        assert!(!store.is_blacklisted(&live, TokenKind::Refresh).await.unwrap());
        assert!(!store
            .is_blacklisted(&hash_credential("stale"), TokenKind::Access)
            .await
            .unwrap());

        assert_eq!(store.prune_expired_blacklist(now), 1);
        assert_eq!(store.blacklist_len(), 1);
    }

    #[tokio::test]
    async fn test_session_touch_is_monotonic() {
        let store = MemoryCredentialStore::new();
        let mut session = SessionRecord::new("s1", "u1", "github", Utc::now() + Duration::hours(1));
        // Recorded activity slightly in the future must not move backwards.
        session.last_activity_at = Utc::now() + Duration::minutes(5);
        let before = session.last_activity_at;
        store.insert_session(session).await.unwrap();

        store.touch_session_activity("s1").await.unwrap();
        assert!(store.session("s1").unwrap().last_activity_at >= before);
    }

    #[tokio::test]
    async fn test_suspicion_append_keeps_session_valid() {
        let store = MemoryCredentialStore::new();
        let session = SessionRecord::new("s1", "u1", "github", Utc::now() + Duration::hours(1));
        store.insert_session(session).await.unwrap();

        store.append_session_suspicion("s1", "ip changed").await.unwrap();
        store.append_session_suspicion("s1", "ua changed").await.unwrap();
        store.append_session_suspicion("s1", "ip changed").await.unwrap();
        let stored = store.session("s1").unwrap();
        assert_eq!(stored.suspicious_activity, vec!["ip changed", "ua changed"]);
        assert!(stored.is_valid_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_token_versions() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.current_token_version("u1").await.unwrap(), 0);
        assert_eq!(store.bump_token_version("u1").await.unwrap(), 1);
        assert_eq!(store.bump_token_version("u1").await.unwrap(), 2);
        assert_eq!(store.current_token_version("u1").await.unwrap(), 2);
        assert_eq!(store.current_token_version("u2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_revocation_only_once() {
        let store = MemoryCredentialStore::new();
        let record = RefreshTokenRecord::new("r1", "u1", 0, Utc::now() + Duration::days(1));
        store.save_refresh_token(record).await.unwrap();
        assert!(store.revoke_refresh_token("r1", "logout", None).await.unwrap());
        assert!(!store.revoke_refresh_token("r1", "logout", None).await.unwrap());
        assert!(!store.revoke_refresh_token("missing", "logout", None).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_suspicion_appends_are_not_lost() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = SessionRecord::new("s1", "u1", "github", Utc::now() + Duration::hours(1));
        store.insert_session(session).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_session_suspicion("s1", &format!("reason {}", i))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.session("s1").unwrap().suspicious_activity.len(), 32);
    }
}
