//! Admin accessors for device registrations and channel subscriptions.
//!
//! These are plain request/response wrappers with no state of their own.

use herald_protocol::{codec, DeviceDetails, PushChannelSubscription};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::rest::{PaginatedResult, RestClient};
use crate::traits::TransportError;

/// Entry point for the admin API.
#[derive(Debug, Clone)]
pub struct Admin {
    /// Device registration accessor.
    pub device_registrations: DeviceRegistrations,
    /// Channel subscription accessor.
    pub channel_subscriptions: ChannelSubscriptions,
}

impl Admin {
    /// Create the admin accessors over a shared client.
    #[must_use]
    pub fn new(client: Arc<RestClient>) -> Self {
        Self {
            device_registrations: DeviceRegistrations {
                client: Arc::clone(&client),
            },
            channel_subscriptions: ChannelSubscriptions { client },
        }
    }
}

/// `/push/deviceRegistrations`.
#[derive(Debug, Clone)]
pub struct DeviceRegistrations {
    client: Arc<RestClient>,
}

impl DeviceRegistrations {
    /// Create or replace a registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn save(&self, device: &DeviceDetails) -> Result<DeviceDetails, TransportError> {
        let url = self
            .client
            .url(&["push", "deviceRegistrations", device.id.as_str()])?;
        let body = codec::encode(self.client.format(), device)?;

        let response = self
            .client
            .send(Method::PUT, url, &[], Some(body), None)
            .await?;

        debug!(device = %device.id, "Saved device registration");
        self.client.decode_body(response).await
    }

    /// List registrations matching `params` (`deviceId`, `clientId`, `limit`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn get(
        &self,
        params: &[(&str, &str)],
    ) -> Result<PaginatedResult<DeviceDetails>, TransportError> {
        let url = self.client.url(&["push", "deviceRegistrations"])?;
        self.client.get_page(url, params).await
    }

    /// Fetch the page after `page`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn next_page(
        &self,
        page: &PaginatedResult<DeviceDetails>,
    ) -> Result<Option<PaginatedResult<DeviceDetails>>, TransportError> {
        self.client.next_page(page).await
    }

    /// Remove registrations matching `params`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn remove(&self, params: &[(&str, &str)]) -> Result<(), TransportError> {
        let url = self.client.url(&["push", "deviceRegistrations"])?;
        self.client
            .send(Method::DELETE, url, params, None, None)
            .await?;

        debug!(?params, "Removed device registrations");
        Ok(())
    }
}

/// `/push/channelSubscriptions` and `/push/channels`.
#[derive(Debug, Clone)]
pub struct ChannelSubscriptions {
    client: Arc<RestClient>,
}

impl ChannelSubscriptions {
    /// Create a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn save(
        &self,
        subscription: &PushChannelSubscription,
    ) -> Result<PushChannelSubscription, TransportError> {
        let url = self.client.url(&["push", "channelSubscriptions"])?;
        let body = codec::encode(self.client.format(), subscription)?;

        let response = self
            .client
            .send(Method::POST, url, &[], Some(body), None)
            .await?;

        debug!(channel = %subscription.channel, "Saved channel subscription");
        self.client.decode_body(response).await
    }

    /// List subscriptions matching `params` (`channel`, `deviceId`, `clientId`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn get(
        &self,
        params: &[(&str, &str)],
    ) -> Result<PaginatedResult<PushChannelSubscription>, TransportError> {
        let url = self.client.url(&["push", "channelSubscriptions"])?;
        self.client.get_page(url, params).await
    }

    /// Fetch the page after `page`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn next_page(
        &self,
        page: &PaginatedResult<PushChannelSubscription>,
    ) -> Result<Option<PaginatedResult<PushChannelSubscription>>, TransportError> {
        self.client.next_page(page).await
    }

    /// Remove subscriptions matching `params`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn remove(&self, params: &[(&str, &str)]) -> Result<(), TransportError> {
        let url = self.client.url(&["push", "channelSubscriptions"])?;
        self.client
            .send(Method::DELETE, url, params, None, None)
            .await?;

        debug!(?params, "Removed channel subscriptions");
        Ok(())
    }

    /// List channels that have at least one push subscription.
    ///
    /// Channel names come back as strings even if the service sent other
    /// scalar values.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn list_channels(
        &self,
        params: &[(&str, &str)],
    ) -> Result<PaginatedResult<String>, TransportError> {
        let url = self.client.url(&["push", "channels"])?;
        let page: PaginatedResult<Value> = self.client.get_page(url, params).await?;
        Ok(page.map(channel_name))
    }

    /// Fetch the page after a channel listing page.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn next_channels(
        &self,
        page: &PaginatedResult<String>,
    ) -> Result<Option<PaginatedResult<String>>, TransportError> {
        let Some(url) = page.next.clone() else {
            return Ok(None);
        };
        let page: PaginatedResult<Value> = self.client.get_page(url, &[]).await?;
        Ok(Some(page.map(channel_name)))
    }
}

fn channel_name(value: Value) -> String {
    match value {
        Value::String(name) => name,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_name_coercion() {
        assert_eq!(channel_name(json!("news")), "news");
        assert_eq!(channel_name(json!(42)), "42");
        assert_eq!(channel_name(json!(true)), "true");
    }
}
