use std::time::Duration;

use thiserror::Error;

/// Why a single upstream attempt produced no completion. Absorbed by the
/// arbitrator; never shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum AttemptFailure {
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream status {status}")]
    UpstreamStatus { status: u16, body: String },
    #[error("malformed upstream response: {0}")]
    Malformed(String),
    #[error("cancelled")]
    Cancelled,
}

impl AttemptFailure {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::Network(_) | AttemptFailure::Timeout(_) => "network",
            AttemptFailure::UpstreamStatus { .. } => "status",
            AttemptFailure::Malformed(_) => "malformed",
            AttemptFailure::Cancelled => "cancelled",
        }
    }
}

/// Failures surfaced to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum GatewayError {
    #[error("no eligible credentials in group {group}")]
    NoEligibleCredentials { group: String },
    #[error("all {attempts} upstream attempts failed or were rejected")]
    AllAttemptsExhausted { attempts: usize },
    #[error("missing or invalid client api key")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub(crate) fn status_code(&self) -> u16 {
        match self {
            GatewayError::NoEligibleCredentials { .. } | GatewayError::AllAttemptsExhausted { .. } => 503,
            GatewayError::Unauthorized => 401,
            GatewayError::BadRequest(_) => 400,
            GatewayError::Internal(_) => 500,
        }
    }

    pub(crate) fn error_type(&self) -> &'static str {
        match self {
            GatewayError::NoEligibleCredentials { .. } | GatewayError::AllAttemptsExhausted { .. } => {
                "service_unavailable"
            }
            GatewayError::Unauthorized => "authentication_error",
            GatewayError::BadRequest(_) => "invalid_request_error",
            GatewayError::Internal(_) => "server_error",
        }
    }

    pub(crate) fn code(&self) -> &'static str {
        match self {
            GatewayError::NoEligibleCredentials { .. } => "no_eligible_credentials",
            GatewayError::AllAttemptsExhausted { .. } => "all_attempts_exhausted",
            GatewayError::Unauthorized => "invalid_api_key",
            GatewayError::BadRequest(_) => "invalid_request",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    /// Client-facing text. Upstream failures stay generic and retryable with
    /// no upstream detail; request errors echo only the parse problem.
    pub(crate) fn public_message(&self) -> String {
        match self {
            GatewayError::NoEligibleCredentials { .. } => {
                "no upstream credentials are configured for this route; service temporarily unavailable".to_string()
            }
            GatewayError::AllAttemptsExhausted { .. } => {
                "all upstream requests failed or returned responses that were too short; service temporarily unavailable".to_string()
            }
            GatewayError::Unauthorized => "invalid api key".to_string(),
            GatewayError::BadRequest(reason) => reason.clone(),
            GatewayError::Internal(_) => "internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_are_service_unavailable_without_detail() {
        let err = GatewayError::NoEligibleCredentials {
            group: "group2".to_string(),
        };
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.code(), "no_eligible_credentials");
        assert!(!err.public_message().contains("group2"));

        let err = GatewayError::AllAttemptsExhausted { attempts: 3 };
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.code(), "all_attempts_exhausted");
        assert_eq!(err.error_type(), "service_unavailable");
    }

    #[test]
    fn request_errors_map_to_client_statuses() {
        assert_eq!(GatewayError::Unauthorized.status_code(), 401);
        let err = GatewayError::BadRequest("field `messages` must be an array".to_string());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "field `messages` must be an array");
        let err = GatewayError::Internal("serialize failed".to_string());
        assert_eq!(err.status_code(), 500);
        assert!(!err.public_message().contains("serialize"));
    }

    #[test]
    fn attempt_failure_display_omits_body() {
        let failure = AttemptFailure::UpstreamStatus {
            status: 429,
            body: "quota exceeded for key sk-secret".to_string(),
        };
        assert_eq!(failure.to_string(), "upstream status 429");
        assert_eq!(failure.kind(), "status");
        assert_eq!(AttemptFailure::Timeout(Duration::from_secs(1)).kind(), "network");
    }
}
