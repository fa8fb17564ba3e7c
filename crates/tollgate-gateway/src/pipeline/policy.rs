//! Endpoint policy table.
//!
//! Declares the scope each protected operation requires and which paths
//! skip pipeline stages. Route templates use `{name}` for a single path
//! segment.

use tollgate_core::Scope;

/// Stages a path skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    /// Every stage runs.
    None,
    /// Only the rate limiter is skipped.
    RateLimit,
    /// The pipeline is skipped entirely.
    All,
}

const BYPASS_ALL: &[&str] = &["/api/auth", "/api/health"];
const BYPASS_RATE_LIMIT: &[&str] = &["/docs", "/swagger", "/static", "/favicon.ico"];

/// Which stages `path` skips.
pub fn bypass_for(path: &str) -> Bypass {
    if BYPASS_ALL.iter().any(|prefix| starts_with_segments(path, prefix)) {
        Bypass::All
    } else if BYPASS_RATE_LIMIT
        .iter()
        .any(|prefix| starts_with_segments(path, prefix))
    {
        Bypass::RateLimit
    } else {
        Bypass::None
    }
}

/// Whether `path` is `prefix` or lies below it. `/api/authors` is not
/// below `/api/auth`.
fn starts_with_segments(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// One protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRule {
    pub method: &'static str,
    pub template: &'static str,
    pub required: Scope,
}

impl EndpointRule {
    /// Endpoint identifier used for rate limit keys, e.g.
    /// `GET /api/organizations`.
    pub fn endpoint_id(&self) -> String {
        format!("{} {}", self.method, self.template)
    }

    fn matches(&self, method: &str, path: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && template_matches(self.template, path)
    }
}

/// Scope requirements by route.
#[derive(Debug, Clone, Default)]
pub struct EndpointPolicy {
    rules: Vec<EndpointRule>,
}

impl EndpointPolicy {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule.
    pub fn route(mut self, method: &'static str, template: &'static str, required: Scope) -> Self {
        self.rules.push(EndpointRule {
            method,
            template,
            required,
        });
        self
    }

    /// Table for the routes the gateway serves.
    pub fn standard() -> Self {
        Self::new()
            .route("GET", "/api/me", Scope::Read)
            .route("GET", "/api/organizations", Scope::Read)
            .route("POST", "/api/organizations", Scope::Write)
            .route("POST", "/api/api-keys/{id}/revoke", Scope::Admin)
    }

    /// The first rule matching `method` and `path`.
    pub fn resolve(&self, method: &str, path: &str) -> Option<&EndpointRule> {
        self.rules.iter().find(|rule| rule.matches(method, path))
    }

    pub fn rules(&self) -> &[EndpointRule] {
        &self.rules
    }
}

fn template_matches(template: &str, path: &str) -> bool {
    let mut expected = template.trim_end_matches('/').split('/');
    let mut actual = path.trim_end_matches('/').split('/');
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some(want), Some(got)) => {
                let is_param = want.starts_with('{') && want.ends_with('}');
                if is_param {
                    if got.is_empty() {
                        return false;
                    }
                } else if want != got {
                    return false;
                }
            }
            _ => return false,
        }
    }
}
