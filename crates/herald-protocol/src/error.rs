//! Error information returned by the push service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known error codes.
pub mod codes {
    /// Generic bad request.
    pub const BAD_REQUEST: u32 = 40000;
    /// Generic unauthorized request.
    pub const UNAUTHORIZED: u32 = 40100;
    /// Generic internal error.
    pub const INTERNAL: u32 = 50000;
    /// Connection to the service failed.
    pub const CONNECTION_FAILED: u32 = 80000;
}

/// An error reported by the push service, or synthesized locally in the
/// same shape.
///
/// Failure events carry an `ErrorInfo` as their reason. The activation
/// machinery never inspects it; it is handed to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message} (code {code}, status {status_code})")]
pub struct ErrorInfo {
    /// Service error code.
    pub code: u32,
    /// HTTP status code.
    pub status_code: u16,
    /// Human-readable message.
    pub message: String,
}

impl ErrorInfo {
    /// Create a new error.
    #[must_use]
    pub fn new(code: u32, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status_code,
            message: message.into(),
        }
    }

    /// A 400 with the generic bad request code.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(codes::BAD_REQUEST, 400, message)
    }

    /// A 500 with the generic internal error code.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, 500, message)
    }

    /// Build an error from a bare HTTP status, used when the response
    /// carried no error envelope.
    #[must_use]
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(u32::from(status_code) * 100, status_code, message)
    }
}

/// Error envelope wrapping an `ErrorInfo` in a response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The wrapped error.
    pub error: ErrorInfo,
}
