//! JSON request and response bodies.

use serde::{Deserialize, Serialize};
use tollgate_core::{AuthKind, Identity};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// `POST /api/auth/refresh` and `POST /api/auth/logout-all` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// New credentials from a refresh exchange.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub refresh_token: String,
}

/// `POST /api/auth/logout` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Logout result.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub access_token_revoked: bool,
    pub refresh_token_revoked: bool,
}

/// Logout-all result.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutAllResponse {
    pub user_id: String,
    /// Refresh tokens issued below this version are no longer accepted.
    pub token_version: u64,
}

/// The caller as the pipeline established it.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub subject_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub auth_kind: AuthKind,
    pub scopes: Vec<String>,
    pub session_id: Option<String>,
}

impl MeResponse {
    pub fn new(identity: &Identity, session_id: Option<String>) -> Self {
        Self {
            subject_id: identity.subject_id.clone(),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
            auth_kind: identity.kind,
            scopes: identity.scopes.to_strings(),
            session_id,
        }
    }
}

/// An organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// Organization listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrganizationList {
    pub organizations: Vec<Organization>,
}

/// `POST /api/organizations` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
}

/// `POST /api/api-keys/{id}/revoke` body.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RevokeApiKeyRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// API key revocation result.
#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeApiKeyResponse {
    pub id: String,
    pub revoked: bool,
    pub reason: String,
}
