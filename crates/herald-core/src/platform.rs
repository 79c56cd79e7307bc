//! Platform collaborators: device detail acquisition and custom
//! registration strategies.

use async_trait::async_trait;
use herald_protocol::{DeviceDetails, ErrorInfo};
use serde_json::Value;

/// Supplies platform push details (push token, endpoint, ...).
#[async_trait]
pub trait PlatformPush: Send + Sync {
    /// Acquire the device's push recipient.
    ///
    /// # Errors
    ///
    /// Returns the reason the platform could not supply details.
    async fn get_push_device_details(&self) -> Result<Value, ErrorInfo>;

    /// Get the platform name for logging.
    fn name(&self) -> &'static str {
        "platform"
    }
}

/// Application-provided registration, used instead of the REST transport
/// when activation selects a custom registerer.
#[async_trait]
pub trait CustomRegisterer: Send + Sync {
    /// Register the device and return its update token.
    async fn register(&self, device: &DeviceDetails) -> Result<String, ErrorInfo>;

    /// Push new device details to an existing registration.
    async fn update_registration(
        &self,
        device: &DeviceDetails,
        update_token: &str,
    ) -> Result<(), ErrorInfo>;
}

/// Application-provided deregistration.
#[async_trait]
pub trait CustomDeregisterer: Send + Sync {
    /// Remove the device's registration.
    async fn deregister(&self, device: &DeviceDetails, update_token: &str)
        -> Result<(), ErrorInfo>;
}

/// A platform whose push details are fixed up front.
#[derive(Debug, Clone)]
pub struct StaticPlatform {
    result: Result<Value, ErrorInfo>,
}

impl StaticPlatform {
    /// Always supply `recipient`.
    #[must_use]
    pub fn new(recipient: Value) -> Self {
        Self {
            result: Ok(recipient),
        }
    }

    /// Always fail with `reason`.
    #[must_use]
    pub fn failing(reason: ErrorInfo) -> Self {
        Self { result: Err(reason) }
    }

    /// A platform with nothing to offer.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::failing(ErrorInfo::bad_request(
            "No push recipient configured for this device",
        ))
    }
}

#[async_trait]
impl PlatformPush for StaticPlatform {
    async fn get_push_device_details(&self) -> Result<Value, ErrorInfo> {
        self.result.clone()
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_platform() {
        let recipient = json!({"transportType": "web", "endpoint": "https://push.example"});
        let platform = StaticPlatform::new(recipient.clone());
        assert_eq!(platform.get_push_device_details().await, Ok(recipient));

        let err = StaticPlatform::unavailable()
            .get_push_device_details()
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 400);
    }
}
