//! The request security pipeline.
//!
//! Stages run in a fixed order over a per-request [`RequestContext`]:
//!
//! 1. session (header or cookie)
//! 2. authenticator (API key or bearer pre-checks, including revocation)
//! 3. bearer verification and principal attachment, then the session named
//!    by the principal's `sid` claim when no session was presented directly
//! 4. scope authorization from the [`EndpointPolicy`]
//! 5. rate limiting
//!
//! Each stage either continues or ends the request with an [`AppError`].

mod middleware;
pub mod policy;

pub use middleware::{apply_rate_limit_headers, security_layer, ClientIp, ValidatedSession};
pub use policy::{bypass_for, Bypass, EndpointPolicy, EndpointRule};

use tollgate_core::scope::authorize;
use tollgate_core::{
    AuthOutcome, Authenticator, Identity, InboundRequest, JwtVerifier, RateLimitResult,
    RateLimiter, ScopeDecision, SecurityError, SessionOutcome, SessionValidator,
};
use tracing::{debug, warn};

use crate::error::{AppError, INVALID_BEARER, SESSION_CHECK_FAILED};

/// State carried through the stages of one request.
#[derive(Debug)]
pub struct RequestContext {
    pub request: InboundRequest,
    pub identity: Option<Identity>,
    /// Id of the validated session, if one was presented.
    pub session_id: Option<String>,
    pub anomalies: Vec<String>,
    /// Budget state, absent when rate limiting was skipped or failed open.
    pub rate_limit: Option<RateLimitResult>,
}

impl RequestContext {
    pub fn new(request: InboundRequest) -> Self {
        Self {
            request,
            identity: None,
            session_id: None,
            anomalies: Vec::new(),
            rate_limit: None,
        }
    }
}

/// The ordered security stages.
#[derive(Clone)]
pub struct SecurityPipeline {
    pub sessions: SessionValidator,
    pub authenticator: Authenticator,
    pub verifier: JwtVerifier,
    pub rate_limiter: RateLimiter,
    pub policy: EndpointPolicy,
}

impl SecurityPipeline {
    /// Run every stage `bypass` does not skip.
    pub async fn run(&self, ctx: &mut RequestContext, bypass: Bypass) -> Result<(), AppError> {
        if bypass == Bypass::All {
            return Ok(());
        }

        self.session_stage(ctx, None).await?;
        self.authentication_stage(ctx).await?;
        if ctx.session_id.is_none() {
            let claimed = ctx.identity.as_ref().and_then(|id| id.session_id.clone());
            if let Some(sid) = claimed {
                self.session_stage(ctx, Some(&sid)).await?;
            }
        }

        let rule = self.policy.resolve(&ctx.request.method, &ctx.request.path);
        if let Some(rule) = rule {
            self.scope_stage(ctx, rule)?;
        }

        if bypass != Bypass::RateLimit {
            let endpoint = rule
                .map(EndpointRule::endpoint_id)
                .unwrap_or_else(|| ctx.request.path.clone());
            self.rate_limit_stage(ctx, &endpoint).await?;
        }

        Ok(())
    }

    async fn session_stage(
        &self,
        ctx: &mut RequestContext,
        principal_sid: Option<&str>,
    ) -> Result<(), AppError> {
        match self.sessions.validate_request(&ctx.request, principal_sid).await {
            SessionOutcome::NotPresent => Ok(()),
            SessionOutcome::Valid {
                session_id,
                anomalies,
            } => {
                ctx.session_id = Some(session_id);
                ctx.anomalies.extend(anomalies);
                Ok(())
            }
            SessionOutcome::Rejected(err) if err.is_internal() => {
                Err(AppError::Unauthorized(SESSION_CHECK_FAILED))
            }
            SessionOutcome::Rejected(err) => Err(err.into()),
        }
    }

    async fn authentication_stage(&self, ctx: &mut RequestContext) -> Result<(), AppError> {
        match self.authenticator.authenticate(&ctx.request).await {
            AuthOutcome::Authenticated(identity) => {
                ctx.identity = Some(identity);
                Ok(())
            }
            AuthOutcome::Rejected(err) => Err(err.into()),
            AuthOutcome::NotAttempted => {
                let Some(token) = ctx.request.bearer_token() else {
                    return Ok(());
                };
                match self.verifier.authenticate(token) {
                    Ok(identity) => {
                        debug!(sub = %identity.subject_id, "Bearer principal attached");
                        ctx.identity = Some(identity);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, "Bearer token verification failed");
                        Err(AppError::Unauthorized(INVALID_BEARER))
                    }
                }
            }
        }
    }

    fn scope_stage(&self, ctx: &RequestContext, rule: &EndpointRule) -> Result<(), AppError> {
        let Some(identity) = ctx.identity.as_ref() else {
            debug!(endpoint = %rule.endpoint_id(), "Protected endpoint called without identity");
            return Err(SecurityError::Unauthenticated.into());
        };

        match authorize(identity, &rule.required) {
            ScopeDecision::Granted => Ok(()),
            ScopeDecision::Denied { required } => {
                warn!(
                    sub = %identity.subject_id,
                    required = %required,
                    available = %identity.scopes.to_delimited(),
                    endpoint = %rule.endpoint_id(),
                    "API key lacks required scope"
                );
                Err(SecurityError::InsufficientScope {
                    required: required.to_string(),
                }
                .into())
            }
        }
    }

    async fn rate_limit_stage(
        &self,
        ctx: &mut RequestContext,
        endpoint: &str,
    ) -> Result<(), AppError> {
        let result = self
            .rate_limiter
            .check(
                ctx.identity.as_ref(),
                ctx.request.client_ip.as_deref(),
                endpoint,
            )
            .await;

        match result {
            Some(result) if !result.allowed => Err(AppError::RateLimited(result)),
            other => {
                ctx.rate_limit = other;
                Ok(())
            }
        }
    }
}
