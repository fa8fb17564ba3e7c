//! Tollgate HTTP gateway.
//!
//! Runs every routed request through the security pipeline (sessions,
//! authentication, revocation, scopes, rate limits) before it reaches a
//! handler, and serves the token lifecycle endpoints under `/api/auth`.

pub mod config;
pub mod error;
pub mod json;
pub mod pipeline;
pub mod routes;

pub use config::{Args, GatewayConfig};
pub use error::AppError;
pub use pipeline::{EndpointPolicy, SecurityPipeline};

use std::sync::Arc;

use axum::{middleware, Router};
use tollgate_core::{
    Authenticator, CounterStore, CredentialStore, JwtVerifier, RateLimiter, RevocationChecker,
    SessionValidator, TokenCodec, TokenIssuer,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Credential store.
    pub store: Arc<dyn CredentialStore>,
    /// Security stages.
    pub pipeline: Arc<SecurityPipeline>,
    /// Blacklist checks for the lifecycle endpoints.
    pub revocation: RevocationChecker,
    /// Access token minting.
    pub issuer: Arc<TokenIssuer>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        counters: Arc<dyn CounterStore>,
        verifier: JwtVerifier,
        issuer: TokenIssuer,
        config: GatewayConfig,
    ) -> Self {
        let pipeline = SecurityPipeline {
            sessions: SessionValidator::new(store.clone()),
            authenticator: Authenticator::new(store.clone())
                .with_codec(TokenCodec::new(config.jwt_leeway_secs)),
            verifier,
            rate_limiter: RateLimiter::new(counters, config.rate_limits.clone()),
            policy: EndpointPolicy::standard(),
        };

        Self {
            revocation: RevocationChecker::new(store.clone()),
            store,
            pipeline: Arc::new(pipeline),
            issuer: Arc::new(issuer.with_access_ttl(config.access_ttl)),
            config,
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::auth::routes())
        .merge(routes::me::routes())
        .merge(routes::organizations::routes())
        .merge(routes::api_keys::routes())
        .merge(routes::docs::routes())
        .fallback(routes::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            pipeline::security_layer,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
