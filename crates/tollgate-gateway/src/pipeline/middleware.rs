//! Axum glue for the security pipeline.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tollgate_core::request::{API_KEY_HEADER, SESSION_HEADER};
use tollgate_core::{InboundRequest, RateLimitResult};
use tracing::debug;

use super::{bypass_for, Bypass, RequestContext};
use crate::AppState;

/// Validated session id, attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSession(pub String);

#[derive(Debug, Deserialize)]
struct ApiKeyQuery {
    api_key: Option<String>,
}

/// Middleware running the security pipeline before every routed handler.
pub async fn security_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let bypass = bypass_for(req.uri().path());
    if bypass == Bypass::All {
        debug!(path = %req.uri().path(), "Security pipeline bypassed");
        return next.run(req).await;
    }

    let client_ip = resolve_client_ip(
        req.headers(),
        req.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.config.trust_forwarded_for,
    );
    let mut ctx = RequestContext::new(inbound_request(&req, client_ip));

    if let Err(err) = state.pipeline.run(&mut ctx, bypass).await {
        return err.into_response();
    }

    if let Some(identity) = ctx.identity.take() {
        req.extensions_mut().insert(identity);
    }
    if let Some(session_id) = ctx.session_id.take() {
        req.extensions_mut().insert(ValidatedSession(session_id));
    }

    let mut response = next.run(req).await;
    if let Some(result) = &ctx.rate_limit {
        apply_rate_limit_headers(response.headers_mut(), result);
    }
    response
}

/// Build the pipeline's view of `req`.
fn inbound_request(req: &Request, client_ip: Option<String>) -> InboundRequest {
    let headers = req.headers();
    let api_key_param = Query::<ApiKeyQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.api_key);

    InboundRequest {
        method: req.method().as_str().to_string(),
        path: req.uri().path().to_string(),
        authorization: header_string(headers, header::AUTHORIZATION.as_str()),
        api_key_header: header_string(headers, API_KEY_HEADER),
        api_key_param,
        session_header: header_string(headers, SESSION_HEADER),
        cookie: header_string(headers, header::COOKIE.as_str()),
        client_ip,
        user_agent: header_string(headers, header::USER_AGENT.as_str()),
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Client IP: the first `X-Forwarded-For` entry when trusted, else the
/// socket peer address.
fn resolve_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_forwarded_for: bool,
) -> Option<String> {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }
    connect_info.map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Client IP extractor for handlers, resolved the same way as the pipeline.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(resolve_client_ip(
            &parts.headers,
            parts.extensions.get::<ConnectInfo<SocketAddr>>(),
            state.config.trust_forwarded_for,
        )))
    }
}

/// Write the `X-RateLimit-*` headers, plus `Retry-After` when denied.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    let mut set = |name: &'static str, value: String| {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    };

    set("x-ratelimit-limit", result.limit.to_string());
    set("x-ratelimit-remaining", result.remaining.to_string());
    set("x-ratelimit-reset", result.reset_epoch().to_string());
    set("x-ratelimit-policy", result.policy());
    if !result.allowed {
        set("retry-after", result.retry_after_secs.to_string());
    }
}
