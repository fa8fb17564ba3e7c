//! Tollgate gateway binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tollgate_core::{JwtVerifier, MemoryCounterStore, MemoryCredentialStore, TokenIssuer};
use tollgate_gateway::{create_router, AppState, Args, GatewayConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line args
    let args = Args::parse();
    let config = GatewayConfig::from(&args);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "tollgate_gateway={level},tollgate_core={level},tower_http=info",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        listen = %config.listen_addr,
        trust_forwarded_for = config.trust_forwarded_for,
        "Starting Tollgate gateway"
    );

    let mut verifier = JwtVerifier::from_env()?.with_leeway(config.jwt_leeway_secs);
    let mut issuer = TokenIssuer::from_env()?;
    if let Some(iss) = &config.jwt_issuer {
        verifier = verifier.with_issuer(iss.clone());
        issuer = issuer.with_issuer(iss.clone());
    }
    if let Some(aud) = &config.jwt_audience {
        verifier = verifier.with_audience(aud.clone());
        issuer = issuer.with_audience(aud.clone());
    }

    let store = Arc::new(MemoryCredentialStore::new());
    let counters = Arc::new(MemoryCounterStore::new());

    // Start housekeeping background task
    let interval = config.housekeeping_interval.max(Duration::from_secs(1));
    let (cleanup_store, cleanup_counters) = (store.clone(), counters.clone());
    tokio::spawn(async move {
        housekeeping_task(cleanup_store, cleanup_counters, interval).await;
    });

    // Create application state
    let state = AppState::new(store, counters, verifier, issuer, config.clone());

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically drop inert blacklist rows and finished rate limit windows.
async fn housekeeping_task(
    store: Arc<MemoryCredentialStore>,
    counters: Arc<MemoryCounterStore>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = Utc::now();
        let blacklist = store.prune_expired_blacklist(now);
        let windows = counters.prune_expired(now.timestamp());
        if blacklist > 0 || windows > 0 {
            info!(blacklist, windows, "Pruned expired security records");
        }
    }
}
