//! CLI configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (HERALD_ENDPOINT, HERALD_KEY)
//! - TOML configuration file
//! - The `--config` flag

use anyhow::{Context, Result};
use herald_core::{DeviceDefaults, StaticPlatform};
use herald_protocol::{DevicePlatform, FormFactor};
use herald_transport::RestOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the push service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key (`name:secret`).
    #[serde(default = "default_key")]
    pub key: Option<String>,

    /// Bearer token, used instead of the key.
    #[serde(default)]
    pub token: Option<String>,

    /// Send MessagePack bodies instead of JSON.
    #[serde(default)]
    pub use_binary_protocol: bool,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Where activation state and the local device are kept.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    /// Extra HTTP headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// This device.
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Client identity to bind the device to.
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub platform: DevicePlatform,

    #[serde(default)]
    pub form_factor: FormFactor,

    /// Push recipient handed out when activation asks for device details.
    #[serde(default)]
    pub recipient: Option<serde_json::Value>,
}

fn default_endpoint() -> String {
    std::env::var("HERALD_ENDPOINT")
        .unwrap_or_else(|_| herald_transport::rest::DEFAULT_ENDPOINT.to_string())
}

fn default_key() -> Option<String> {
    std::env::var("HERALD_KEY").ok().filter(|k| !k.is_empty())
}

fn default_timeout() -> u64 {
    15_000 // 15 seconds
}

fn default_storage_path() -> String {
    "~/.config/herald/state.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            key: default_key(),
            token: None,
            use_binary_protocol: false,
            timeout_ms: default_timeout(),
            storage_path: default_storage_path(),
            headers: HashMap::new(),
            device: DeviceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `explicit`, or the first default path that
    /// exists, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let config_paths = ["herald.toml", "~/.config/herald/herald.toml"];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// REST client options.
    #[must_use]
    pub fn rest_options(&self) -> RestOptions {
        RestOptions {
            endpoint: self.endpoint.clone(),
            key: self.key.clone(),
            token: self.token.clone(),
            use_binary_protocol: self.use_binary_protocol,
            headers: self.headers.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    /// Storage file path with `~` expanded.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage_path).as_ref())
    }

    /// Attributes for a device created on first run.
    #[must_use]
    pub fn device_defaults(&self) -> DeviceDefaults {
        DeviceDefaults {
            client_id: self.device.client_id.clone(),
            platform: self.device.platform,
            form_factor: self.device.form_factor,
            ..Default::default()
        }
    }

    /// Platform handing out the configured recipient.
    #[must_use]
    pub fn platform(&self) -> StaticPlatform {
        match &self.device.recipient {
            Some(recipient) => StaticPlatform::new(recipient.clone()),
            None => StaticPlatform::unavailable(),
        }
    }
}
