//! Session liveness and anomaly detection.
//!
//! A presented session must exist, be active and be unexpired. Every
//! successful validation bumps last-activity. The request's client is then
//! compared against the one recorded at login; any drift is appended to the
//! session's suspicious-activity list, once per distinct reason, but never
//! invalidates the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::error::SecurityError;
use crate::records::SessionRecord;
use crate::request::InboundRequest;
use crate::store::{CredentialStore, SessionStore};

/// Coarse device class for a user agent.
///
/// Order matters: mobile user agents also mention desktop platforms
/// (Android UAs contain "Linux", iOS UAs contain "Mac OS X").
pub fn device_class(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();
    if ua.contains("android") {
        "android"
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        "ios"
    } else if ua.contains("windows") {
        "windows"
    } else if ua.contains("cros") {
        "chromeos"
    } else if ua.contains("macintosh") || ua.contains("mac os") {
        "mac"
    } else if ua.contains("linux") {
        "linux"
    } else if ua.contains("curl") || ua.contains("python") || ua.contains("bot") {
        "automation"
    } else {
        "unknown"
    }
}

/// Compare the request's client with the one recorded on `record`.
///
/// Only fields known on both sides are compared. Returns one reason per
/// mismatch.
pub fn detect_anomalies(
    record: &SessionRecord,
    client_ip: Option<&str>,
    user_agent: Option<&str>,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if let (Some(recorded), Some(current)) = (record.ip_address.as_deref(), client_ip) {
        if recorded != current {
            reasons.push(format!("ip_changed: {recorded} -> {current}"));
        }
    }

    if let (Some(recorded), Some(current)) = (record.device_info.as_deref(), user_agent) {
        let current = device_class(current);
        if recorded != current {
            reasons.push(format!("device_changed: {recorded} -> {current}"));
        }
    }

    if let (Some(recorded), Some(current)) = (record.user_agent.as_deref(), user_agent) {
        if recorded != current {
            reasons.push("user_agent_changed".to_string());
        }
    }

    reasons
}

/// Result of the session stage.
#[derive(Debug)]
pub enum SessionOutcome {
    /// No session id on the request.
    NotPresent,
    /// The session is live.
    Valid {
        session_id: String,
        /// Drift detected on this request. Each distinct reason is stored
        /// on the session once.
        anomalies: Vec<String>,
    },
    /// Unknown, inactive or expired session, or an internal fault.
    Rejected(SecurityError),
}

/// Session stage.
#[derive(Clone)]
pub struct SessionValidator {
    store: Arc<dyn CredentialStore>,
}

impl SessionValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Validate the session referenced by `request`, if any. `principal_sid`
    /// is the `sid` claim of an already-attached principal.
    pub async fn validate_request(
        &self,
        request: &InboundRequest,
        principal_sid: Option<&str>,
    ) -> SessionOutcome {
        match request.session_id(principal_sid) {
            Some(id) => {
                self.validate(id, request.client_ip.as_deref(), request.user_agent.as_deref())
                    .await
            }
            None => SessionOutcome::NotPresent,
        }
    }

    /// Validate session `id` for a request from `client_ip` / `user_agent`.
    pub async fn validate(
        &self,
        id: &str,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> SessionOutcome {
        self.validate_at(id, client_ip, user_agent, Utc::now()).await
    }

    async fn validate_at(
        &self,
        id: &str,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> SessionOutcome {
        let record = match self.store.find_session(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(session_id = %id, "Unknown session presented");
                return SessionOutcome::Rejected(SecurityError::SessionInvalid);
            }
            Err(e) => {
                error!(session_id = %id, error = %e, "Session lookup failed");
                return SessionOutcome::Rejected(e.into());
            }
        };

        if !record.is_valid_at(now) {
            warn!(
                session_id = %id,
                active = record.is_active,
                expires_at = %record.expires_at,
                "Inactive or expired session presented"
            );
            return SessionOutcome::Rejected(SecurityError::SessionInvalid);
        }

        if let Err(e) = self.store.touch_session_activity(id).await {
            error!(session_id = %id, error = %e, "Failed to touch session activity");
            return SessionOutcome::Rejected(e.into());
        }

        let anomalies = detect_anomalies(&record, client_ip, user_agent);
        for reason in &anomalies {
            if record.suspicious_activity.contains(reason) {
                debug!(session_id = %id, reason = %reason, "Session anomaly already recorded");
                continue;
            }
            warn!(session_id = %id, user_id = %record.user_id, reason = %reason, "Session anomaly");
            if let Err(e) = self.store.append_session_suspicion(id, reason).await {
                error!(session_id = %id, error = %e, "Failed to record session anomaly");
            }
        }

        debug!(session_id = %id, user_id = %record.user_id, "Session validated");
        SessionOutcome::Valid {
            session_id: record.id,
            anomalies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::UnavailableStore;
    use crate::store::MemoryCredentialStore;
    use chrono::Duration;

    const WINDOWS_UA: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";
    const IPHONE_UA: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";

    async fn store_with_session(expires_in: Duration) -> Arc<MemoryCredentialStore> {
        let store = Arc::new(MemoryCredentialStore::new());
        let record = SessionRecord::new("sess-1", "user-1", "password", Utc::now() + expires_in)
            .with_client(Some("10.0.0.1".into()), Some(WINDOWS_UA.into()));
        store.insert_session(record).await.unwrap();
        store
    }

    #[test]
    fn test_device_class() {
        assert_eq!(device_class(WINDOWS_UA), "windows");
        assert_eq!(device_class(IPHONE_UA), "ios");
        assert_eq!(
            device_class("Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36"),
            "android"
        );
        assert_eq!(
            device_class("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_1) AppleWebKit/605.1.15"),
            "mac"
        );
        assert_eq!(device_class("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0"), "linux");
        assert_eq!(device_class("curl/8.4.0"), "automation");
        assert_eq!(device_class(""), "unknown");
    }

    #[test]
    fn test_detect_anomalies() {
        let record = SessionRecord::new("s", "u", "password", Utc::now())
            .with_client(Some("10.0.0.1".into()), Some(WINDOWS_UA.into()));

        assert!(detect_anomalies(&record, Some("10.0.0.1"), Some(WINDOWS_UA)).is_empty());
        assert!(detect_anomalies(&record, None, None).is_empty());

        let reasons = detect_anomalies(&record, Some("192.168.1.5"), Some(IPHONE_UA));
        assert_eq!(reasons.len(), 3);
        assert_eq!(reasons[0], "ip_changed: 10.0.0.1 -> 192.168.1.5");
        assert_eq!(reasons[1], "device_changed: windows -> ios");
        assert_eq!(reasons[2], "user_agent_changed");
    }

    #[tokio::test]
    async fn test_valid_session_touches_activity() {
        let store = store_with_session(Duration::hours(1)).await;
        let before = store.session("sess-1").unwrap().last_activity_at;
        let validator = SessionValidator::new(store.clone());

        let outcome = validator
            .validate("sess-1", Some("10.0.0.1"), Some(WINDOWS_UA))
            .await;
        assert!(matches!(
            outcome,
            SessionOutcome::Valid { ref anomalies, .. } if anomalies.is_empty()
        ));

        let after = store.session("sess-1").unwrap().last_activity_at;
        assert!(after >= before);
    }

    #[tokio::test]
    async fn test_anomaly_flags_without_invalidating() {
        let store = store_with_session(Duration::hours(1)).await;
        let validator = SessionValidator::new(store.clone());

        let outcome = validator
            .validate("sess-1", Some("203.0.113.7"), Some(IPHONE_UA))
            .await;
        let SessionOutcome::Valid { anomalies, .. } = outcome else {
            panic!("anomalies must not invalidate the session");
        };
        assert_eq!(anomalies.len(), 3);

        let record = store.session("sess-1").unwrap();
        assert!(record.is_active);
        assert_eq!(record.suspicious_activity, anomalies);

        // The session stays usable after being flagged.
        assert!(matches!(
            validator.validate("sess-1", Some("10.0.0.1"), Some(WINDOWS_UA)).await,
            SessionOutcome::Valid { .. }
        ));
    }

    #[tokio::test]
    async fn test_repeated_drift_recorded_once() {
        let store = store_with_session(Duration::hours(1)).await;
        let validator = SessionValidator::new(store.clone());

        for _ in 0..100 {
            let outcome = validator
                .validate("sess-1", Some("10.0.0.2"), Some(WINDOWS_UA))
                .await;
            let SessionOutcome::Valid { anomalies, .. } = outcome else {
                panic!("drift must not invalidate the session");
            };
            assert_eq!(anomalies, vec!["ip_changed: 10.0.0.1 -> 10.0.0.2".to_string()]);
        }

        let record = store.session("sess-1").unwrap();
        assert_eq!(
            record.suspicious_activity,
            vec!["ip_changed: 10.0.0.1 -> 10.0.0.2".to_string()]
        );

        // A different drift is still recorded.
        validator
            .validate("sess-1", Some("10.0.0.3"), Some(WINDOWS_UA))
            .await;
        assert_eq!(store.session("sess-1").unwrap().suspicious_activity.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_unknown_and_inactive_rejected() {
        let store = store_with_session(Duration::seconds(-1)).await;
        let mut inactive = SessionRecord::new("sess-2", "user-1", "password", Utc::now() + Duration::hours(1));
        inactive.is_active = false;
        store.insert_session(inactive).await.unwrap();
        let validator = SessionValidator::new(store);

        for id in ["sess-1", "sess-2", "missing"] {
            assert!(matches!(
                validator.validate(id, None, None).await,
                SessionOutcome::Rejected(SecurityError::SessionInvalid)
            ));
        }
    }

    #[tokio::test]
    async fn test_request_without_session_is_noop() {
        let validator = SessionValidator::new(Arc::new(UnavailableStore));
        let request = InboundRequest::new("GET", "/api/me");
        assert!(matches!(
            validator.validate_request(&request, None).await,
            SessionOutcome::NotPresent
        ));
    }

    #[tokio::test]
    async fn test_request_session_sources() {
        let store = store_with_session(Duration::hours(1)).await;
        let validator = SessionValidator::new(store);

        let via_cookie = InboundRequest::new("GET", "/api/me").with_cookie("SessionId=sess-1");
        assert!(matches!(
            validator.validate_request(&via_cookie, None).await,
            SessionOutcome::Valid { .. }
        ));

        let via_claim = InboundRequest::new("GET", "/api/me");
        assert!(matches!(
            validator.validate_request(&via_claim, Some("sess-1")).await,
            SessionOutcome::Valid { .. }
        ));
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let validator = SessionValidator::new(Arc::new(UnavailableStore));
        let outcome = validator.validate("sess-1", None, None).await;
        assert!(matches!(
            outcome,
            SessionOutcome::Rejected(SecurityError::Store(_))
        ));
    }
}
