//! The authenticated caller.

use axum::{routing::get, Extension, Json, Router};
use tollgate_core::Identity;

use crate::json::MeResponse;
use crate::pipeline::ValidatedSession;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/me", get(me))
}

async fn me(
    Extension(identity): Extension<Identity>,
    session: Option<Extension<ValidatedSession>>,
) -> Json<MeResponse> {
    let session_id = session.map(|Extension(ValidatedSession(id))| id);
    Json(MeResponse::new(&identity, session_id))
}
