//! Gateway configuration.

use std::time::Duration;

use clap::Parser;
use tollgate_core::{RateLimitPolicy, TierBudget};

/// Tollgate gateway command line arguments.
///
/// The JWT secret is not a flag; it is read from `TOLLGATE_JWT_SECRET`.
#[derive(Debug, Parser)]
#[command(name = "tollgate-gateway")]
#[command(about = "HTTP gateway enforcing authentication, sessions, scopes and rate limits")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Requests per window for unauthenticated callers.
    #[arg(long, default_value_t = 30)]
    pub unauthenticated_limit: u64,

    /// Requests per window for bearer token callers.
    #[arg(long, default_value_t = 300)]
    pub bearer_limit: u64,

    /// Requests per window for API key callers.
    #[arg(long, default_value_t = 100)]
    pub api_key_limit: u64,

    /// Requests per window for API keys holding the admin scope.
    #[arg(long, default_value_t = 1000)]
    pub admin_limit: u64,

    /// Rate limit window length in seconds, shared by every tier.
    #[arg(long, default_value_t = 60)]
    pub rate_window_secs: u64,

    /// Take the client IP from the first `X-Forwarded-For` entry.
    #[arg(long)]
    pub trust_forwarded_for: bool,

    /// Required `iss` claim on bearer tokens; also stamped on issued tokens.
    #[arg(long)]
    pub jwt_issuer: Option<String>,

    /// Required `aud` claim on bearer tokens; also stamped on issued tokens.
    #[arg(long)]
    pub jwt_audience: Option<String>,

    /// Clock skew tolerated when verifying `exp` (seconds).
    #[arg(long, default_value_t = 60)]
    pub jwt_leeway_secs: u64,

    /// Lifetime of issued access tokens (seconds).
    #[arg(long, default_value_t = 900)]
    pub access_ttl_secs: u64,

    /// Lifetime of issued refresh tokens (seconds).
    #[arg(long, default_value_t = 30 * 24 * 3600)]
    pub refresh_ttl_secs: u64,

    /// Interval between blacklist and counter pruning runs (seconds).
    #[arg(long, default_value_t = 60)]
    pub housekeeping_interval_secs: u64,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Per-tier request budgets.
    pub rate_limits: RateLimitPolicy,
    /// Whether `X-Forwarded-For` is trusted for the client IP.
    pub trust_forwarded_for: bool,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub jwt_leeway_secs: u64,
    /// Lifetime of issued access tokens.
    pub access_ttl: Duration,
    /// Lifetime of issued refresh tokens.
    pub refresh_ttl: Duration,
    /// Interval between pruning runs.
    pub housekeeping_interval: Duration,
    pub log_level: String,
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        let window = Duration::from_secs(args.rate_window_secs);

        Self {
            listen_addr: args.listen.clone(),
            rate_limits: RateLimitPolicy {
                unauthenticated: TierBudget::new(args.unauthenticated_limit, window),
                bearer: TierBudget::new(args.bearer_limit, window),
                api_key: TierBudget::new(args.api_key_limit, window),
                admin: TierBudget::new(args.admin_limit, window),
            },
            trust_forwarded_for: args.trust_forwarded_for,
            jwt_issuer: args.jwt_issuer.clone(),
            jwt_audience: args.jwt_audience.clone(),
            jwt_leeway_secs: args.jwt_leeway_secs,
            access_ttl: Duration::from_secs(args.access_ttl_secs),
            refresh_ttl: Duration::from_secs(args.refresh_ttl_secs),
            housekeeping_interval: Duration::from_secs(args.housekeeping_interval_secs),
            log_level: args.log_level.clone(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            rate_limits: RateLimitPolicy::default(),
            trust_forwarded_for: false,
            jwt_issuer: None,
            jwt_audience: None,
            jwt_leeway_secs: 60,
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(30 * 24 * 3600),
            housekeeping_interval: Duration::from_secs(60),
            log_level: "info".to_string(),
        }
    }
}
