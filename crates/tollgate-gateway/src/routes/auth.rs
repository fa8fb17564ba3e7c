//! Token lifecycle endpoints.
//!
//! These live under `/api/auth`, which the security pipeline bypasses, so
//! every handler here does its own credential checks.

use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use tollgate_core::crypto::generate_refresh_token;
use tollgate_core::store::{TokenStore, UserStore};
use tollgate_core::{BlacklistedTokenRecord, RefreshTokenRecord, TokenCodec, TokenKind};
use tracing::{info, warn};

use crate::error::{AppError, TOKEN_REVOKED};
use crate::json::{
    LogoutAllResponse, LogoutRequest, LogoutResponse, RefreshRequest, TokenResponse,
};
use crate::pipeline::ClientIp;
use crate::AppState;

const INVALID_REFRESH: &str = "Invalid or expired refresh token";

/// Token lifecycle routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/logout-all", post(logout_all))
}

/// Exchange a refresh token for a new access token, rotating the refresh
/// token.
async fn refresh(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let presented = body.refresh_token.trim();
    let record = usable_refresh_token(&state, presented).await?;

    let user = match state.store.find_user(&record.user_id).await? {
        Some(user) if user.is_active => user,
        _ => {
            warn!(user_id = %record.user_id, "Refresh for unknown or disabled user");
            return Err(AppError::Unauthorized(INVALID_REFRESH));
        }
    };

    // Losing this race means another request already rotated the token.
    let rotated = state
        .store
        .revoke_refresh_token(presented, "rotated", client_ip.as_deref())
        .await?;
    if !rotated {
        warn!(user_id = %user.id, "Refresh token reused during rotation");
        return Err(AppError::Unauthorized(INVALID_REFRESH));
    }

    let next_token = generate_refresh_token();
    let mut next = RefreshTokenRecord::new(
        next_token.clone(),
        user.id.clone(),
        record.version,
        expiry_after(state.config.refresh_ttl)?,
    );
    if let Some(session_id) = &record.session_id {
        next = next.with_session(session_id.clone());
    }
    state.store.save_refresh_token(next).await?;

    let issued = state
        .issuer
        .issue_access_token(&user, record.session_id.as_deref())?;

    info!(user_id = %user.id, session_id = ?record.session_id, "Refresh token rotated");
    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "Bearer".to_string(),
        expires_in: state.issuer.access_ttl().as_secs(),
        refresh_token: next_token,
    }))
}

/// Revoke the presented access token and, optionally, its refresh token.
async fn logout(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AppError> {
    let access_token = body.access_token.trim();
    let claims = TokenCodec::decode_unverified(access_token)
        .map_err(|_| AppError::BadRequest("access_token is not a valid token".to_string()))?;

    let expires_at = match claims.exp.and_then(|exp| Utc.timestamp_opt(exp as i64, 0).single()) {
        Some(exp) => exp,
        None => expiry_after(state.config.access_ttl)?,
    };
    let mut row = BlacklistedTokenRecord::for_token(access_token, TokenKind::Access, expires_at)
        .with_reason("logout", client_ip.clone());
    if !claims.sub.trim().is_empty() {
        row = row.with_user(claims.sub.clone());
    }
    state.store.blacklist_token(row).await?;

    let mut refresh_token_revoked = false;
    let refresh_token = body
        .refresh_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(refresh_token) = refresh_token {
        let record = state.store.find_refresh_token(refresh_token).await?;
        refresh_token_revoked = state
            .store
            .revoke_refresh_token(refresh_token, "logout", client_ip.as_deref())
            .await?;

        let expires_at = match &record {
            Some(record) => record.expires_at,
            None => expiry_after(state.config.refresh_ttl)?,
        };
        let mut row =
            BlacklistedTokenRecord::for_token(refresh_token, TokenKind::Refresh, expires_at)
                .with_reason("logout", client_ip.clone());
        if let Some(record) = record {
            row = row.with_user(record.user_id);
        }
        state.store.blacklist_token(row).await?;
    }

    info!(sub = %claims.sub, refresh_token_revoked, "Logged out");
    Ok(Json(LogoutResponse {
        access_token_revoked: true,
        refresh_token_revoked,
    }))
}

/// Invalidate every refresh token of the presented token's user.
async fn logout_all(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<LogoutAllResponse>, AppError> {
    let record = usable_refresh_token(&state, body.refresh_token.trim()).await?;
    let token_version = state.store.bump_token_version(&record.user_id).await?;

    info!(user_id = %record.user_id, token_version, "Logged out everywhere");
    Ok(Json(LogoutAllResponse {
        user_id: record.user_id,
        token_version,
    }))
}

/// Look up `token` and check it is neither blacklisted, revoked, expired nor
/// below its user's token version.
async fn usable_refresh_token(
    state: &AppState,
    token: &str,
) -> Result<RefreshTokenRecord, AppError> {
    if token.is_empty() {
        return Err(AppError::Unauthorized(INVALID_REFRESH));
    }

    if state
        .revocation
        .is_blacklisted(token, TokenKind::Refresh)
        .await?
    {
        warn!("Blacklisted refresh token presented");
        return Err(AppError::Unauthorized(TOKEN_REVOKED));
    }

    let Some(record) = state.store.find_refresh_token(token).await? else {
        warn!("Unknown refresh token presented");
        return Err(AppError::Unauthorized(INVALID_REFRESH));
    };

    let current_version = state.store.current_token_version(&record.user_id).await?;
    if !record.is_usable_at(Utc::now(), current_version) {
        warn!(
            user_id = %record.user_id,
            revoked = record.is_revoked,
            version = record.version,
            current_version,
            "Unusable refresh token presented"
        );
        return Err(AppError::Unauthorized(INVALID_REFRESH));
    }

    Ok(record)
}

fn expiry_after(ttl: Duration) -> Result<DateTime<Utc>, AppError> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::Internal("token lifetime out of range".to_string()))
}
