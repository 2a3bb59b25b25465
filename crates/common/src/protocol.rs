//! Request and response types for the JSON API surface.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx JSON status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"unauthorized"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Listener mode chosen at startup: `"plaintext"` or `"tls"`.
    pub mode: String,
    /// Crate version of the running binary.
    pub version: String,
    /// Number of monitored services in the current snapshot.
    pub services: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_from_service_error() {
        let e = ErrorResponse::from(&ServiceError::Unauthorized("api key required".into()));
        assert_eq!(e.code, "unauthorized");
        assert!(e.message.contains("api key required"));
    }

    #[test]
    fn health_response_field_names() {
        let h = HealthResponse {
            status: "ok".into(),
            mode: "tls".into(),
            version: "0.1.0".into(),
            services: 3,
        };
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["mode"], "tls");
        assert_eq!(json["services"], 3);
    }
}
