//! Tiered request budgets.
//!
//! Every caller falls into one [`AuthLevel`] tier, and each tier has a
//! request limit per fixed, epoch-aligned window. Budgets are tracked per
//! client, tier and endpoint, so one noisy endpoint does not starve the rest
//! and a user's bearer traffic does not spend their API key budget.
//!
//! # Default budgets
//!
//! | Tier            | Limit | Window |
//! |-----------------|-------|--------|
//! | unauthenticated | 30    | 60s    |
//! | bearer          | 300   | 60s    |
//! | api_key         | 100   | 60s    |
//! | admin           | 1000  | 60s    |

mod counter;

pub use counter::{CounterStore, MemoryCounterStore};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::identity::{AuthKind, Identity};

/// Trust tier used to pick a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthLevel {
    /// No identity established.
    Unauthenticated,
    /// Bearer token identity.
    Bearer,
    /// API key identity without `admin`.
    ApiKey,
    /// API key identity holding `admin`.
    Admin,
}

impl Default for AuthLevel {
    fn default() -> Self {
        AuthLevel::Unauthenticated
    }
}

impl AuthLevel {
    /// Tier for an optional identity.
    pub fn for_identity(identity: Option<&Identity>) -> Self {
        match identity {
            None => AuthLevel::Unauthenticated,
            Some(id) if id.is_admin_key() => AuthLevel::Admin,
            Some(id) => match id.kind {
                AuthKind::Bearer => AuthLevel::Bearer,
                AuthKind::ApiKey => AuthLevel::ApiKey,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthLevel::Unauthenticated => "unauthenticated",
            AuthLevel::Bearer => "bearer",
            AuthLevel::ApiKey => "api_key",
            AuthLevel::Admin => "admin",
        }
    }
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request limit per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierBudget {
    pub limit: u64,
    pub window: Duration,
}

impl TierBudget {
    pub const fn new(limit: u64, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Shorthand for a per-minute budget.
    pub const fn per_minute(limit: u64) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Window length in whole seconds, never zero.
    pub fn window_secs(&self) -> i64 {
        self.window.as_secs().max(1) as i64
    }
}

/// Budgets for every tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub unauthenticated: TierBudget,
    pub bearer: TierBudget,
    pub api_key: TierBudget,
    pub admin: TierBudget,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            unauthenticated: TierBudget::per_minute(30),
            bearer: TierBudget::per_minute(300),
            api_key: TierBudget::per_minute(100),
            admin: TierBudget::per_minute(1000),
        }
    }
}

impl RateLimitPolicy {
    /// Budget for `level`.
    pub fn budget(&self, level: AuthLevel) -> TierBudget {
        match level {
            AuthLevel::Unauthenticated => self.unauthenticated,
            AuthLevel::Bearer => self.bearer,
            AuthLevel::ApiKey => self.api_key,
            AuthLevel::Admin => self.admin,
        }
    }
}

/// Outcome of one rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// `user:<subject>` or `ip:<address>`.
    pub client_id: String,
    /// Endpoint the budget applies to.
    pub endpoint: String,
    pub auth_level: AuthLevel,
    pub limit: u64,
    pub remaining: u64,
    /// End of the current window.
    pub reset_at: DateTime<Utc>,
    /// Seconds until the window resets. Zero when allowed.
    pub retry_after_secs: u64,
    pub window: Duration,
    pub allowed: bool,
}

impl RateLimitResult {
    /// Reset time as Unix seconds.
    pub fn reset_epoch(&self) -> i64 {
        self.reset_at.timestamp()
    }

    /// `<limit>;w=<window_secs>`.
    pub fn policy(&self) -> String {
        format!("{};w={}", self.limit, self.window.as_secs())
    }
}

/// Client identifier used in the budget key: the subject when an identity is
/// known, else the client IP.
pub fn client_id(identity: Option<&Identity>, client_ip: Option<&str>) -> String {
    match identity {
        Some(identity) => format!("user:{}", identity.subject_id),
        None => format!("ip:{}", client_ip.unwrap_or("unknown")),
    }
}

/// Rate limit stage.
#[derive(Clone)]
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(counters: Arc<dyn CounterStore>, policy: RateLimitPolicy) -> Self {
        Self { counters, policy }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Count the request and report the budget state.
    ///
    /// Returns `None` when the counter backend fails; the request should then
    /// be allowed without rate limit metadata.
    pub async fn check(
        &self,
        identity: Option<&Identity>,
        client_ip: Option<&str>,
        endpoint: &str,
    ) -> Option<RateLimitResult> {
        match self.check_at(identity, client_ip, endpoint, Utc::now()).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Rate limit check failed, allowing request");
                None
            }
        }
    }

    /// [`check`](Self::check) against an explicit clock, surfacing backend
    /// errors.
    pub async fn check_at(
        &self,
        identity: Option<&Identity>,
        client_ip: Option<&str>,
        endpoint: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult, StoreError> {
        let auth_level = AuthLevel::for_identity(identity);
        let budget = self.policy.budget(auth_level);
        let client_id = client_id(identity, client_ip);

        let window_secs = budget.window_secs();
        let now_secs = now.timestamp();
        let window_start = now_secs - now_secs.rem_euclid(window_secs);
        let reset_secs = window_start + window_secs;

        let key = format!("{client_id}|{auth_level}|{endpoint}");
        let count = self
            .counters
            .increment(&key, window_start, budget.window)
            .await?;

        let allowed = count <= budget.limit;
        let retry_after_secs = if allowed {
            0
        } else {
            (reset_secs - now_secs).max(1) as u64
        };
        let reset_at = Utc
            .timestamp_opt(reset_secs, 0)
            .single()
            .ok_or_else(|| StoreError::Backend(format!("window end {reset_secs} out of range")))?;

        let result = RateLimitResult {
            client_id,
            endpoint: endpoint.to_string(),
            auth_level,
            limit: budget.limit,
            remaining: budget.limit.saturating_sub(count),
            reset_at,
            retry_after_secs,
            window: budget.window,
            allowed,
        };

        if allowed {
            debug!(
                client_id = %result.client_id,
                endpoint = %endpoint,
                remaining = result.remaining,
                "Rate limit check passed"
            );
        } else {
            warn!(
                client_id = %result.client_id,
                endpoint = %endpoint,
                auth_level = %auth_level,
                limit = budget.limit,
                retry_after = retry_after_secs,
                "Rate limit exceeded"
            );
        }

        Ok(result)
    }
}
