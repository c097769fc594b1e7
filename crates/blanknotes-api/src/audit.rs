//! Security audit logging for authentication events
//!
//! Audit events are logged at INFO level on the `audit` target so they can
//! be filtered and routed separately from application logs, e.g.
//! `RUST_LOG=audit=info`.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess { user_id: Uuid, name: String },

    RegistrationFailure { email: String, reason: String },

    LoginSuccess { user_id: Uuid, email: String },

    LoginFailure { email: String, reason: String },

    Logout { user_id: Uuid },

    /// New access token minted from a refresh token; `silent` when it
    /// happened inside the auth guard rather than on `/auth/refresh`
    TokenRefresh { user_id: Uuid, silent: bool },

    /// Authenticated caller touched a resource they do not own
    AccessDenied { user_id: Uuid, resource: String },

    InvalidToken { reason: String },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }
}

/// Request metadata attached to every audit record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event with structured fields
pub fn audit_log(event: &AuditEvent, context: &AuditContext) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        event = %event_json,
        ip_address = ?context.ip_address,
        user_agent = ?context.user_agent,
        "{}",
        event.summary()
    );
}

/// Extract the client IP from proxy headers
///
/// Checks `X-Forwarded-For` (first hop) then `X-Real-IP`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return Some(first_ip.trim().to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            user_id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_success\""));
        assert!(json.contains("alice@example.com"));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(
            &AuditEvent::TokenRefresh {
                user_id: Uuid::new_v4(),
                silent: true,
            },
            &AuditContext::default(),
        );
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );
        headers.insert(
            axum::http::header::USER_AGENT,
            "Mozilla/5.0 (Test)".parse().unwrap(),
        );

        let context = AuditContext::from_headers(&headers);
        assert_eq!(context.ip_address.as_deref(), Some("203.0.113.1"));
        assert_eq!(context.user_agent.as_deref(), Some("Mozilla/5.0 (Test)"));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.7".parse().unwrap());
        assert_eq!(extract_ip_address(&headers), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn test_extract_missing_headers() {
        let headers = HeaderMap::new();
        assert_eq!(extract_ip_address(&headers), None);
        assert_eq!(extract_user_agent(&headers), None);
    }
}
