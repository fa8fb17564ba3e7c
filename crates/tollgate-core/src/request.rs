//! Transport-independent view of an inbound request.
//!
//! The gateway fills an [`InboundRequest`] from the HTTP request parts; every
//! pipeline stage reads credentials and client metadata from it.

/// Header carrying an API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying an API key.
pub const API_KEY_QUERY_PARAM: &str = "api_key";

/// Header carrying a session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Cookie carrying a session id.
pub const SESSION_COOKIE: &str = "SessionId";

/// A credential found on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// API key secret.
    ApiKey(String),
    /// Bearer token.
    Bearer(String),
}

/// Request metadata the security pipeline inspects.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
    /// Raw `X-API-Key` header value.
    pub api_key_header: Option<String>,
    /// Decoded `api_key` query parameter.
    pub api_key_param: Option<String>,
    /// Raw `X-Session-Id` header value.
    pub session_header: Option<String>,
    /// Raw `Cookie` header value.
    pub cookie: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl InboundRequest {
    /// Create a request view for `method` and `path`.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn with_api_key_header(mut self, value: impl Into<String>) -> Self {
        self.api_key_header = Some(value.into());
        self
    }

    pub fn with_api_key_param(mut self, value: impl Into<String>) -> Self {
        self.api_key_param = Some(value.into());
        self
    }

    pub fn with_session_header(mut self, value: impl Into<String>) -> Self {
        self.session_header = Some(value.into());
        self
    }

    pub fn with_cookie(mut self, value: impl Into<String>) -> Self {
        self.cookie = Some(value.into());
        self
    }

    pub fn with_client_ip(mut self, value: impl Into<String>) -> Self {
        self.client_ip = Some(value.into());
        self
    }

    pub fn with_user_agent(mut self, value: impl Into<String>) -> Self {
        self.user_agent = Some(value.into());
        self
    }

    /// API key value, checked in order: `Authorization: ApiKey <v>`,
    /// `X-API-Key`, `api_key` query parameter. First non-empty match wins.
    pub fn api_key(&self) -> Option<&str> {
        self.authorization
            .as_deref()
            .and_then(|h| scheme_value(h, "ApiKey"))
            .or_else(|| non_empty(self.api_key_header.as_deref()))
            .or_else(|| non_empty(self.api_key_param.as_deref()))
    }

    /// Bearer value from `Authorization: Bearer <v>`.
    pub fn bearer_token(&self) -> Option<&str> {
        self.authorization
            .as_deref()
            .and_then(|h| scheme_value(h, "Bearer"))
    }

    /// The single credential the authenticator evaluates. An API key always
    /// takes precedence; a bearer token is only considered when no API key
    /// is present.
    pub fn credential(&self) -> Option<Credential> {
        if let Some(key) = self.api_key() {
            return Some(Credential::ApiKey(key.to_string()));
        }
        self.bearer_token()
            .map(|token| Credential::Bearer(token.to_string()))
    }

    /// Value of the cookie called `name`.
    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookie.as_deref()?.split(';').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key.trim() == name {
                non_empty(Some(value.trim().trim_matches('"')))
            } else {
                None
            }
        })
    }

    /// Session id from the `X-Session-Id` header, then the `SessionId`
    /// cookie, then `principal_claim`. First non-empty match wins.
    pub fn session_id<'a>(&'a self, principal_claim: Option<&'a str>) -> Option<&'a str> {
        non_empty(self.session_header.as_deref())
            .or_else(|| self.cookie_value(SESSION_COOKIE))
            .or_else(|| non_empty(principal_claim))
    }
}

/// Value of an `Authorization` header for `scheme`, matched
/// case-insensitively.
fn scheme_value<'a>(header: &'a str, scheme: &str) -> Option<&'a str> {
    let (name, value) = header.trim().split_once(' ')?;
    if name.eq_ignore_ascii_case(scheme) {
        non_empty(Some(value))
    } else {
        None
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
