//! API key administration.

use axum::{
    extract::{Path, State},
    routing::post,
    Extension, Json, Router,
};
use tollgate_core::store::ApiKeyStore;
use tollgate_core::Identity;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::json::{RevokeApiKeyRequest, RevokeApiKeyResponse};
use crate::pipeline::ClientIp;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/api-keys/:id/revoke", post(revoke_api_key))
}

async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ClientIp(client_ip): ClientIp,
    Path(id): Path<Uuid>,
    body: Option<Json<RevokeApiKeyRequest>>,
) -> Result<Json<RevokeApiKeyResponse>, AppError> {
    let Json(body) = body.unwrap_or_default();
    let reason = body
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "revoked by administrator".to_string());

    let revoked = state
        .store
        .revoke_api_key(id, &reason, client_ip.as_deref())
        .await?;
    if !revoked {
        return Err(AppError::NotFound(format!("API key {id}")));
    }

    info!(key_id = %id, revoked_by = %identity.subject_id, reason = %reason, "API key revoked");
    Ok(Json(RevokeApiKeyResponse {
        id: id.to_string(),
        revoked: true,
        reason,
    }))
}
