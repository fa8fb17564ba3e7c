//! Request-scoped caller identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::ScopeSet;

/// How the caller proved their identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// Signed, time-bounded bearer token from an interactive login.
    Bearer,
    /// Long-lived, scope-restricted API key.
    ApiKey,
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthKind::Bearer => write!(f, "bearer"),
            AuthKind::ApiKey => write!(f, "api_key"),
        }
    }
}

/// Identity established for a single request.
///
/// Created once by the authenticator (API keys) or the bearer verifier
/// (tokens), owned by the request context and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Owning user's subject identifier.
    pub subject_id: String,
    /// Display name.
    pub display_name: String,
    /// Email address, when known.
    pub email: Option<String>,
    /// Authentication strategy that produced this identity.
    pub kind: AuthKind,
    /// Granted scopes. Empty for bearer identities, which are not scope-limited.
    pub scopes: ScopeSet,
    /// Session id claim carried by a bearer token (`sid`).
    pub session_id: Option<String>,
    /// Id of the API key used, for API key identities.
    pub api_key_id: Option<Uuid>,
}

impl Identity {
    /// Identity for a verified bearer token.
    pub fn bearer(
        subject_id: impl Into<String>,
        display_name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            display_name: display_name.into(),
            email,
            kind: AuthKind::Bearer,
            scopes: ScopeSet::new(),
            session_id: None,
            api_key_id: None,
        }
    }

    /// Identity for a usable API key.
    pub fn api_key(
        subject_id: impl Into<String>,
        display_name: impl Into<String>,
        email: Option<String>,
        scopes: ScopeSet,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            display_name: display_name.into(),
            email,
            kind: AuthKind::ApiKey,
            scopes,
            session_id: None,
            api_key_id: None,
        }
    }

    /// Attach the session id claim.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach the API key id.
    pub fn with_api_key_id(mut self, id: Uuid) -> Self {
        self.api_key_id = Some(id);
        self
    }

    /// Whether this is an API key identity holding the `admin` scope.
    pub fn is_admin_key(&self) -> bool {
        self.kind == AuthKind::ApiKey && self.scopes.has_admin()
    }
}
