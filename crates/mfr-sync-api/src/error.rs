//! API error types
//!
//! Error definitions with transient/permanent classification.

use thiserror::Error;

/// Error that can occur while talking to the target platform.
#[derive(Debug, Error)]
pub enum ApiError {
    // Connection errors (usually transient)
    /// Failed to reach the target platform.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request timed out.
    #[error("request timeout after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Target platform returned a 5xx status.
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },

    // Request errors (permanent)
    /// Credentials were rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Target platform rejected the request (4xx other than 401/404).
    #[error("request rejected with status {status}: {body}")]
    RequestRejected { status: u16, body: String },

    /// Requested resource or datastore key does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Client configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Response body could not be decoded.
    #[error("malformed response from {resource}: {message}")]
    MalformedResponse { resource: String, message: String },

    /// Payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Check if this error is transient and the call may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::ConnectionFailed { .. }
                | ApiError::Timeout { .. }
                | ApiError::ServerError { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ApiError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ApiError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(resource: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::MalformedResponse {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Map an HTTP status and body into the matching error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ApiError::AuthenticationFailed,
            404 => ApiError::NotFound { resource: body },
            500..=599 => ApiError::ServerError { status, body },
            _ => ApiError::RequestRejected { status, body },
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let transient = vec![
            ApiError::connection_failed("refused"),
            ApiError::Timeout { timeout_secs: 30 },
            ApiError::ServerError {
                status: 502,
                body: "bad gateway".to_string(),
            },
        ];
        for err in transient {
            assert!(err.is_transient(), "expected {err} to be transient");
            assert!(!err.is_permanent());
        }
    }

    #[test]
    fn test_permanent_errors() {
        let permanent = vec![
            ApiError::AuthenticationFailed,
            ApiError::not_found("organisationUnits"),
            ApiError::InvalidConfiguration {
                message: "missing base url".to_string(),
            },
        ];
        for err in permanent {
            assert!(err.is_permanent(), "expected {err} to be permanent");
        }
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ApiError::from_status(401, String::new()),
            ApiError::AuthenticationFailed
        ));
        assert!(matches!(
            ApiError::from_status(404, "x".to_string()),
            ApiError::NotFound { .. }
        ));
        assert!(matches!(
            ApiError::from_status(503, "x".to_string()),
            ApiError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            ApiError::from_status(409, "conflict".to_string()),
            ApiError::RequestRejected { status: 409, .. }
        ));
    }
}
