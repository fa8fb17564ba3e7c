//! Blacklist lookups for presented credentials.

use std::sync::Arc;

use tracing::debug;

use crate::crypto::hash_credential;
use crate::error::SecurityResult;
use crate::records::TokenKind;
use crate::store::{CredentialStore, TokenStore};

/// Checks raw credentials against the blacklist.
#[derive(Clone)]
pub struct RevocationChecker {
    store: Arc<dyn CredentialStore>,
}

impl RevocationChecker {
    /// Create a checker over `store`.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Whether `raw` is blacklisted as `kind`. Only rows that have not reached
    /// their natural expiry count.
    pub async fn is_blacklisted(&self, raw: &str, kind: TokenKind) -> SecurityResult<bool> {
        let token_hash = hash_credential(raw);
        let listed = self.store.is_blacklisted(&token_hash, kind).await?;
        if listed {
            debug!(kind = %kind, hash_prefix = &token_hash[..8], "Credential is blacklisted");
        }
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::BlacklistedTokenRecord;
    use crate::store::MemoryCredentialStore;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_blacklisted_until_expiry() {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .blacklist_token(BlacklistedTokenRecord::for_token(
                "token-a",
                TokenKind::Access,
                Utc::now() + Duration::hours(1),
            ))
            .await
            .unwrap();
        store
            .blacklist_token(BlacklistedTokenRecord::for_token(
                "token-b",
                TokenKind::Access,
                Utc::now() - Duration::seconds(1),
            ))
            .await
            .unwrap();

        let checker = RevocationChecker::new(store);
        assert!(checker.is_blacklisted("token-a", TokenKind::Access).await.unwrap());
        assert!(!checker.is_blacklisted("token-b", TokenKind::Access).await.unwrap());
        assert!(!checker.is_blacklisted("token-c", TokenKind::Access).await.unwrap());
    }

    #[tokio::test]
    async fn test_kind_must_match() {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .blacklist_token(BlacklistedTokenRecord::for_token(
                "refresh-1",
                TokenKind::Refresh,
                Utc::now() + Duration::hours(1),
            ))
            .await
            .unwrap();

        let checker = RevocationChecker::new(store);
        assert!(checker.is_blacklisted("refresh-1", TokenKind::Refresh).await.unwrap());
        assert!(!checker.is_blacklisted("refresh-1", TokenKind::Access).await.unwrap());
    }
}
