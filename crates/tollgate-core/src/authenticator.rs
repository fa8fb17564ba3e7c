//! Credential dispatch.
//!
//! Each request is routed to exactly one strategy. An API key, when present,
//! is resolved fully here and either authenticates or rejects; it never falls
//! through to bearer handling. A bearer token only gets structural, temporal
//! and blacklist checks here. When those pass the outcome is
//! [`AuthOutcome::NotAttempted`] and the signature-verifying
//! [`JwtVerifier`](crate::token::JwtVerifier) attaches the principal.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::error::SecurityError;
use crate::identity::Identity;
use crate::records::{ApiKeyRecord, TokenKind};
use crate::request::{Credential, InboundRequest};
use crate::revocation::RevocationChecker;
use crate::store::{ApiKeyStore, CredentialStore, UserStore};
use crate::token::TokenCodec;

/// Result of the authentication stage.
#[derive(Debug)]
pub enum AuthOutcome {
    /// A usable API key established the identity.
    Authenticated(Identity),
    /// A credential was presented and is definitively invalid.
    Rejected(SecurityError),
    /// Nothing decided here: no credential, or a bearer token that passed
    /// the pre-checks and still needs verification.
    NotAttempted,
}

impl AuthOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, AuthOutcome::Rejected(_))
    }
}

/// Authentication stage.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    revocation: RevocationChecker,
    codec: TokenCodec,
}

impl Authenticator {
    /// Create an authenticator over `store`.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            revocation: RevocationChecker::new(store.clone()),
            store,
            codec: TokenCodec::default(),
        }
    }

    /// Use `codec` for bearer pre-checks.
    pub fn with_codec(mut self, codec: TokenCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Authenticate `request`.
    pub async fn authenticate(&self, request: &InboundRequest) -> AuthOutcome {
        match request.credential() {
            None => {
                debug!(path = %request.path, "No credential presented");
                AuthOutcome::NotAttempted
            }
            Some(Credential::ApiKey(secret)) => {
                self.authenticate_api_key(&secret, request.client_ip.as_deref())
                    .await
            }
            Some(Credential::Bearer(token)) => self.precheck_bearer(&token).await,
        }
    }

    async fn authenticate_api_key(&self, secret: &str, client_ip: Option<&str>) -> AuthOutcome {
        let record = match self.store.find_api_key_by_secret(secret).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("Unknown API key presented");
                return AuthOutcome::Rejected(SecurityError::InvalidApiKey);
            }
            Err(e) => {
                error!(error = %e, "API key lookup failed");
                return AuthOutcome::Rejected(SecurityError::InvalidApiKey);
            }
        };

        if !record.is_usable_at(Utc::now()) {
            warn!(
                key_id = %record.id,
                prefix = %record.prefix,
                active = record.is_active,
                revoked = record.is_revoked(),
                "Unusable API key presented"
            );
            return AuthOutcome::Rejected(SecurityError::InvalidApiKey);
        }

        let identity = match self.identity_for_key(&record).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                warn!(key_id = %record.id, user_id = %record.user_id, "API key owner is disabled");
                return AuthOutcome::Rejected(SecurityError::InvalidApiKey);
            }
            Err(e) => {
                error!(key_id = %record.id, error = %e, "API key owner lookup failed");
                return AuthOutcome::Rejected(SecurityError::InvalidApiKey);
            }
        };

        if let Err(e) = self.store.touch_api_key_usage(record.id, client_ip).await {
            warn!(key_id = %record.id, error = %e, "Failed to record API key usage");
        }

        debug!(
            key_id = %record.id,
            user_id = %identity.subject_id,
            scopes = %record.scopes,
            "API key authenticated"
        );
        AuthOutcome::Authenticated(identity)
    }

    /// Identity for a usable key. `None` when the owning user is disabled.
    async fn identity_for_key(
        &self,
        record: &ApiKeyRecord,
    ) -> Result<Option<Identity>, SecurityError> {
        let user = self.store.find_user(&record.user_id).await?;
        if user.as_ref().is_some_and(|u| !u.is_active) {
            return Ok(None);
        }

        let (display_name, email) = match user {
            Some(user) => (user.username, user.email),
            None => (record.user_id.clone(), None),
        };

        Ok(Some(
            Identity::api_key(record.user_id.clone(), display_name, email, record.scope_set())
                .with_api_key_id(record.id),
        ))
    }

    async fn precheck_bearer(&self, token: &str) -> AuthOutcome {
        let claims = match self.codec.inspect(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Bearer token failed structural checks");
                return AuthOutcome::Rejected(e.into());
            }
        };

        match self.revocation.is_blacklisted(token, TokenKind::Access).await {
            Ok(false) => {
                debug!(sub = %claims.sub, "Bearer token passed pre-checks");
                AuthOutcome::NotAttempted
            }
            Ok(true) => {
                warn!(sub = %claims.sub, "Revoked bearer token presented");
                AuthOutcome::Rejected(SecurityError::TokenRevoked)
            }
            Err(e) => {
                error!(sub = %claims.sub, error = %e, "Blacklist lookup failed");
                AuthOutcome::Rejected(e)
            }
        }
    }
}
