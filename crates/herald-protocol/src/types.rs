//! Value types for the push REST API.
//!
//! Field names follow the service's camelCase convention on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::ProtocolError;
use crate::error::ErrorInfo;

/// Platform a device runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    Android,
    Ios,
    #[default]
    Browser,
}

/// Physical form factor of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    Phone,
    Tablet,
    #[default]
    Desktop,
    Tv,
    Watch,
    Car,
    Embedded,
    Other,
}

/// Delivery state of a registration, as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DevicePushState {
    Active,
    Failing,
    Failed,
}

/// Push-specific part of a device registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePushDetails {
    /// Platform recipient (push token, endpoint, ...). Opaque to the SDK.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Value>,
    /// Delivery state, only present in service responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DevicePushState>,
    /// Last delivery error, only present in service responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorInfo>,
}

/// A device registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetails {
    /// Device identifier.
    pub id: String,
    /// Client identity the device is bound to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Form factor.
    #[serde(default)]
    pub form_factor: FormFactor,
    /// Platform.
    #[serde(default)]
    pub platform: DevicePlatform,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Device secret, if one was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_secret: Option<String>,
    /// Push recipient details.
    #[serde(default)]
    pub push: DevicePushDetails,
}

impl DeviceDetails {
    /// Create a registration with no client id, metadata or recipient.
    #[must_use]
    pub fn new(id: impl Into<String>, platform: DevicePlatform, form_factor: FormFactor) -> Self {
        Self {
            id: id.into(),
            client_id: None,
            form_factor,
            platform,
            metadata: Map::new(),
            device_secret: None,
            push: DevicePushDetails::default(),
        }
    }

    /// Set the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the push recipient.
    #[must_use]
    pub fn with_recipient(mut self, recipient: Value) -> Self {
        self.push.recipient = Some(recipient);
        self
    }
}

/// Response body of a successful device registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistrationResponse {
    /// Token authorizing later updates and deregistration.
    pub update_token: String,
}

/// A channel subscription for either a device or a client id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushChannelSubscription {
    /// Channel name.
    pub channel: String,
    /// Subscribed device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Subscribed client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl PushChannelSubscription {
    /// Subscribe a single device.
    #[must_use]
    pub fn for_device(channel: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            device_id: Some(device_id.into()),
            client_id: None,
        }
    }

    /// Subscribe every device of a client id.
    #[must_use]
    pub fn for_client_id(channel: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            device_id: None,
            client_id: Some(client_id.into()),
        }
    }
}

/// A direct publish to a push recipient.
///
/// On the wire this is the payload object with a `recipient` member added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Target recipient.
    pub recipient: Value,
    /// Notification payload (`notification`, `data`, ...).
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl PublishRequest {
    /// Build a publish request.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Invalid` if the payload is not a JSON object.
    pub fn new(recipient: Value, payload: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut payload) = payload else {
            return Err(ProtocolError::Invalid(
                "push payload must be an object".to_string(),
            ));
        };
        payload.remove("recipient");

        Ok(Self { recipient, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_details_wire_shape() {
        let device = DeviceDetails::new("dev-1", DevicePlatform::Ios, FormFactor::Tablet)
            .with_client_id("alice")
            .with_recipient(json!({"transportType": "apns", "deviceToken": "t"}));

        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "dev-1",
                "clientId": "alice",
                "formFactor": "tablet",
                "platform": "ios",
                "push": {"recipient": {"transportType": "apns", "deviceToken": "t"}}
            })
        );
    }

    #[test]
    fn test_device_details_from_service_response() {
        let body = json!({
            "id": "dev-2",
            "platform": "android",
            "formFactor": "phone",
            "push": {
                "state": "FAILING",
                "errorReason": {"code": 40000, "statusCode": 400, "message": "bad token"}
            }
        });

        let device: DeviceDetails = serde_json::from_value(body).unwrap();
        assert_eq!(device.push.state, Some(DevicePushState::Failing));
        assert_eq!(device.push.error_reason.unwrap().message, "bad token");
        assert!(device.client_id.is_none());
    }

    #[test]
    fn test_publish_request_mixes_in_recipient() {
        let request = PublishRequest::new(
            json!({"clientId": "bob"}),
            json!({"notification": {"title": "Hi"}}),
        )
        .unwrap();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"recipient": {"clientId": "bob"}, "notification": {"title": "Hi"}})
        );
    }

    #[test]
    fn test_publish_request_rejects_non_object() {
        assert!(matches!(
            PublishRequest::new(json!({"clientId": "bob"}), json!("hello")),
            Err(ProtocolError::Invalid(_))
        ));
    }

    #[test]
    fn test_channel_subscription_constructors() {
        let by_client = PushChannelSubscription::for_client_id("alerts", "carol");
        assert_eq!(by_client.client_id.as_deref(), Some("carol"));
        assert!(by_client.device_id.is_none());
    }
}
