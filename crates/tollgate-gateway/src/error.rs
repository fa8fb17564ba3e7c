//! Error handling for the gateway.
//!
//! Credential and scope failures answer with a plain text body so nothing
//! about the internals leaks. Rate limit denials answer with a structured
//! JSON body. Handler errors use the JSON [`ErrorResponse`] shape.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tollgate_core::{RateLimitResult, SecurityError};

use crate::pipeline::apply_rate_limit_headers;

pub const INVALID_API_KEY: &str = "Invalid or expired API key";
pub const TOKEN_REVOKED: &str = "Token has been revoked";
pub const SESSION_INVALID: &str = "Session has expired or is invalid";
pub const SESSION_CHECK_FAILED: &str = "Session validation failed";
pub const INVALID_BEARER: &str = "Invalid bearer token";
pub const AUTH_REQUIRED: &str = "Authentication required";
pub const AUTH_FAILED: &str = "Authentication failed";
pub const INSUFFICIENT_SCOPE: &str = "Insufficient scope";

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// 401 with a plain text message.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    /// 403 with a plain text message.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    /// 429 with rate limit headers and details.
    #[error("rate limit exceeded for {}", .0.client_id)]
    RateLimited(RateLimitResult),
    /// Bad request.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

/// 429 response body.
#[derive(Debug, Serialize)]
pub struct RateLimitBody {
    pub error: &'static str,
    pub message: String,
    pub details: RateLimitDetails,
}

/// Budget state reported with a 429.
#[derive(Debug, Serialize)]
pub struct RateLimitDetails {
    pub limit: u64,
    pub remaining: u64,
    /// RFC 3339, UTC.
    pub reset_time: String,
    pub retry_after_seconds: u64,
    pub client_id: String,
    pub endpoint: String,
    pub auth_level: String,
}

impl From<&RateLimitResult> for RateLimitBody {
    fn from(result: &RateLimitResult) -> Self {
        Self {
            error: "rate_limit_exceeded",
            message: format!(
                "Rate limit of {} requests per {} seconds exceeded. Retry in {} seconds.",
                result.limit,
                result.window.as_secs(),
                result.retry_after_secs
            ),
            details: RateLimitDetails {
                limit: result.limit,
                remaining: result.remaining,
                reset_time: result
                    .reset_at
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                retry_after_seconds: result.retry_after_secs,
                client_id: result.client_id.clone(),
                endpoint: result.endpoint.clone(),
                auth_level: result.auth_level.as_str().to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Unauthorized(msg) => return (StatusCode::UNAUTHORIZED, msg).into_response(),
            AppError::Forbidden(msg) => return (StatusCode::FORBIDDEN, msg).into_response(),
            AppError::RateLimited(result) => {
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(RateLimitBody::from(&result)))
                        .into_response();
                apply_rate_limit_headers(response.headers_mut(), &result);
                return response;
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::InvalidApiKey => AppError::Unauthorized(INVALID_API_KEY),
            SecurityError::InvalidToken(_) => AppError::Unauthorized(INVALID_BEARER),
            SecurityError::TokenRevoked => AppError::Unauthorized(TOKEN_REVOKED),
            SecurityError::SessionInvalid => AppError::Unauthorized(SESSION_INVALID),
            SecurityError::Unauthenticated => AppError::Unauthorized(AUTH_REQUIRED),
            SecurityError::InsufficientScope { .. } => AppError::Forbidden(INSUFFICIENT_SCOPE),
            SecurityError::Store(_) => AppError::Unauthorized(AUTH_FAILED),
        }
    }
}

impl From<tollgate_core::StoreError> for AppError {
    fn from(err: tollgate_core::StoreError) -> Self {
        tracing::error!(error = %err, "Credential store failure");
        AppError::Internal("credential store unavailable".to_string())
    }
}

impl From<tollgate_core::TokenError> for AppError {
    fn from(err: tollgate_core::TokenError) -> Self {
        tracing::error!(error = %err, "Token minting failed");
        AppError::Internal("token issuance failed".to_string())
    }
}
