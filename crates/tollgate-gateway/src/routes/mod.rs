//! HTTP route handlers.

pub mod api_keys;
pub mod auth;
pub mod docs;
pub mod health;
pub mod me;
pub mod organizations;

use axum::http::Uri;

use crate::error::AppError;

/// Fallback for unrouted paths. Registered before the security layer so
/// unknown paths are still authenticated and rate limited.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
