//! The local device and its registration store.

use herald_protocol::{DeviceDetails, DevicePlatform, DevicePushDetails, FormFactor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

use crate::storage::{keys, Storage, StorageError};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a device identifier.
#[must_use]
pub fn generate_device_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{timestamp:016x}-{counter:04x}")
}

/// This device, as known to the SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDevice {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub platform: DevicePlatform,
    #[serde(default)]
    pub form_factor: FormFactor,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Platform push details, `None` until the platform supplies them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_secret: Option<String>,
    /// Issued by the service on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_token: Option<String>,
}

impl LocalDevice {
    /// Create an unregistered device.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_id: None,
            platform: DevicePlatform::default(),
            form_factor: FormFactor::default(),
            metadata: Map::new(),
            recipient: None,
            device_secret: None,
            update_token: None,
        }
    }

    /// Check if the service has issued an update token.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.update_token.is_some()
    }

    /// Project into the registration body sent to the service.
    #[must_use]
    pub fn details(&self) -> DeviceDetails {
        DeviceDetails {
            id: self.id.clone(),
            client_id: self.client_id.clone(),
            form_factor: self.form_factor,
            platform: self.platform,
            metadata: self.metadata.clone(),
            device_secret: self.device_secret.clone(),
            push: DevicePushDetails {
                recipient: self.recipient.clone(),
                ..Default::default()
            },
        }
    }
}

/// Attributes given to a device created on first load.
#[derive(Debug, Clone, Default)]
pub struct DeviceDefaults {
    pub client_id: Option<String>,
    pub platform: DevicePlatform,
    pub form_factor: FormFactor,
    pub metadata: Map<String, Value>,
}

impl DeviceDefaults {
    fn create(self) -> LocalDevice {
        LocalDevice {
            client_id: self.client_id,
            platform: self.platform,
            form_factor: self.form_factor,
            metadata: self.metadata,
            ..LocalDevice::new(generate_device_id())
        }
    }
}

/// Owns the local device and keeps it persisted.
pub struct DeviceRegistrationStore {
    storage: Arc<dyn Storage>,
    device: LocalDevice,
}

impl DeviceRegistrationStore {
    /// Load the device from storage, creating it from `defaults` if absent.
    ///
    /// An unreadable document is replaced by a fresh device.
    pub fn load(storage: Arc<dyn Storage>, defaults: DeviceDefaults) -> Self {
        let stored = storage.get(keys::LOCAL_DEVICE).and_then(|raw| {
            serde_json::from_str::<LocalDevice>(&raw)
                .map_err(|e| warn!(error = %e, "Discarding unreadable local device"))
                .ok()
        });

        let store = match stored {
            Some(device) => {
                debug!(device = %device.id, registered = device.is_registered(), "Loaded local device");
                Self { storage, device }
            }
            None => {
                let store = Self {
                    storage,
                    device: defaults.create(),
                };
                debug!(device = %store.device.id, "Created local device");
                if let Err(e) = store.persist() {
                    warn!(error = %e, "Failed to persist new local device");
                }
                store
            }
        };

        trace!(device = ?store.device, "Local device");
        store
    }

    /// The current device.
    #[must_use]
    pub fn device(&self) -> &LocalDevice {
        &self.device
    }

    /// Set or clear the update token and persist the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device could not be written.
    pub fn set_update_token(&mut self, update_token: Option<String>) -> Result<(), StorageError> {
        self.device.update_token = update_token;
        self.persist()
    }

    /// Replace the platform recipient and persist the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device could not be written.
    pub fn set_recipient(&mut self, recipient: Value) -> Result<(), StorageError> {
        trace!(recipient = %recipient, "Recording push recipient");
        self.device.recipient = Some(recipient);
        self.persist()
    }

    /// Write the device to storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage write fails.
    pub fn persist(&self) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&self.device)?;
        self.storage.set(keys::LOCAL_DEVICE, &raw)
    }
}

impl std::fmt::Debug for DeviceRegistrationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistrationStore")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
