//! Persistent credential records.
//!
//! These records are owned by a [`CredentialStore`](crate::store::CredentialStore).
//! The pipeline only reads them and issues narrow update commands; expiry is
//! always evaluated lazily at read time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{display_prefix, generate_api_key_secret, hash_credential};
use crate::scope::ScopeSet;

/// Kind of a blacklisted bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived access token.
    Access,
    /// Long-lived refresh token.
    Refresh,
}

impl TokenKind {
    /// Lowercase string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Subject identifier.
    pub id: String,
    /// Login/display name.
    pub username: String,
    /// Email address.
    pub email: Option<String>,
    /// Disabled users cannot authenticate with API keys or refresh tokens.
    pub is_active: bool,
}

impl UserRecord {
    /// Create an active user.
    pub fn new(id: impl Into<String>, username: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email,
            is_active: true,
        }
    }
}

/// A stored API key. The raw secret is never kept, only its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Hex SHA-256 of the secret; unique across keys.
    pub secret_hash: String,
    /// Non-secret leading characters, for lookup and display.
    pub prefix: String,
    pub name: String,
    pub description: Option<String>,
    /// Comma-delimited scope list.
    pub scopes: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_used_ip: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub revoked_by_ip: Option<String>,
}

impl ApiKeyRecord {
    /// Generate a new key for `user_id`. Returns the record and the plaintext
    /// secret, which is only available at this point.
    pub fn generate(
        user_id: impl Into<String>,
        name: impl Into<String>,
        scopes: &ScopeSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> (Self, String) {
        let secret = generate_api_key_secret();
        let record = Self::from_secret(&secret, user_id, name, scopes, expires_at);
        (record, secret)
    }

    /// Build a record for an existing secret.
    pub fn from_secret(
        secret: &str,
        user_id: impl Into<String>,
        name: impl Into<String>,
        scopes: &ScopeSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            secret_hash: hash_credential(secret),
            prefix: display_prefix(secret),
            name: name.into(),
            description: None,
            scopes: scopes.to_delimited(),
            is_active: true,
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
            last_used_ip: None,
            revoked_at: None,
            revoked_reason: None,
            revoked_by_ip: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parsed scope set.
    pub fn scope_set(&self) -> ScopeSet {
        ScopeSet::parse(&self.scopes)
    }

    /// Whether the key has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Whether the key has expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// A key is usable iff active, not expired and not revoked.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now) && !self.is_revoked()
    }
}

/// A revoked bearer credential, identified by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistedTokenRecord {
    /// Hex SHA-256 of the raw token; unique.
    pub token_hash: String,
    pub kind: TokenKind,
    pub user_id: Option<String>,
    /// Natural expiry of the revoked token; the row is inert afterwards.
    pub expires_at: DateTime<Utc>,
    pub revoked_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub revoked_by_ip: Option<String>,
}

impl BlacklistedTokenRecord {
    /// Blacklist `raw_token` until `expires_at`.
    pub fn for_token(raw_token: &str, kind: TokenKind, expires_at: DateTime<Utc>) -> Self {
        Self {
            token_hash: hash_credential(raw_token),
            kind,
            user_id: None,
            expires_at,
            revoked_at: Utc::now(),
            reason: None,
            revoked_by_ip: None,
        }
    }

    /// Set the owning user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the revocation reason and origin IP.
    pub fn with_reason(mut self, reason: impl Into<String>, ip: Option<String>) -> Self {
        self.reason = Some(reason.into());
        self.revoked_by_ip = ip;
        self
    }

    /// Whether the row still rejects its token as of `now`.
    pub fn is_in_force_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// A stored refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Opaque token value; unique.
    pub token: String,
    pub user_id: String,
    /// Token version at issue time. Versions below the user's current
    /// version are invalid.
    pub version: u64,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_reason: Option<String>,
    pub revoked_by_ip: Option<String>,
}

impl RefreshTokenRecord {
    /// Create a record for a freshly generated token.
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        version: u64,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            version,
            session_id: None,
            created_at: Utc::now(),
            expires_at,
            is_revoked: false,
            revoked_reason: None,
            revoked_by_ip: None,
        }
    }

    /// Bind the token to a session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Usable iff not revoked, not expired and not below `current_version`.
    pub fn is_usable_at(&self, now: DateTime<Utc>, current_version: u64) -> bool {
        !self.is_revoked && self.expires_at > now && self.version >= current_version
    }
}

/// A server-tracked login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque session identifier; unique.
    pub id: String,
    pub user_id: String,
    /// Coarse device class recorded at login (e.g. "windows", "ios").
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub login_method: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Reasons appended by anomaly detection. Informational only.
    pub suspicious_activity: Vec<String>,
    pub revoked_reason: Option<String>,
    pub revoked_by_ip: Option<String>,
}

impl SessionRecord {
    /// Create an active session.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        login_method: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            device_info: None,
            ip_address: None,
            user_agent: None,
            login_method: login_method.into(),
            location: None,
            is_active: true,
            created_at: now,
            expires_at,
            last_activity_at: now,
            suspicious_activity: Vec::new(),
            revoked_reason: None,
            revoked_by_ip: None,
        }
    }

    /// Record the client the session was opened from. The device class is
    /// derived from the user agent.
    pub fn with_client(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.device_info = user_agent
            .as_deref()
            .map(|ua| crate::session::device_class(ua).to_string());
        self.ip_address = ip;
        self.user_agent = user_agent;
        self
    }

    /// Set the geolocation hint.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Valid iff active and unexpired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}
