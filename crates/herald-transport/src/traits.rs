//! Transport abstraction traits for Herald.
//!
//! The activation state machine only talks to the remote service through
//! `PushTransport`, so it can be driven by the REST client, a custom
//! backend, or a test double.

use async_trait::async_trait;
use herald_protocol::{codes, DeviceDetails, ErrorInfo, ProtocolError, PublishRequest};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be completed.
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the request.
    #[error("Service error: {0}")]
    Api(ErrorInfo),

    /// A body could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The configured endpoint is not a usable base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A configured header name or value is not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for ErrorInfo {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Api(info) => info,
            TransportError::Http(e) => {
                let status = e.status().map_or(500, |s| s.as_u16());
                ErrorInfo::new(codes::CONNECTION_FAILED, status, e.to_string())
            }
            other => ErrorInfo::internal(other.to_string()),
        }
    }
}

/// Operations on the remote push service.
///
/// Each call is a single request; retry and timeout policy belong to the
/// implementation, not to the caller.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Register a device, returning the update token issued for it.
    async fn register(&self, device: &DeviceDetails) -> Result<String, TransportError>;

    /// Refresh an existing registration with new device details.
    async fn update_registration(
        &self,
        device: &DeviceDetails,
        update_token: &str,
    ) -> Result<(), TransportError>;

    /// Remove an existing registration.
    async fn deregister(
        &self,
        device: &DeviceDetails,
        update_token: &str,
    ) -> Result<(), TransportError>;

    /// Publish a notification directly to a recipient.
    async fn publish(&self, request: &PublishRequest) -> Result<(), TransportError>;

    /// Get the transport name (e.g., "rest").
    fn name(&self) -> &'static str;
}
