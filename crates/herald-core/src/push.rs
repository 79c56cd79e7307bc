//! The push facade.

use herald_protocol::{ErrorInfo, PublishRequest};
use herald_transport::PushTransport;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::device::DeviceDefaults;
use crate::error::PushError;
use crate::event::Event;
use crate::machine::Collaborators;
use crate::platform::{CustomDeregisterer, CustomRegisterer, PlatformPush, StaticPlatform};
use crate::storage::{MemoryStorage, Storage};
use crate::worker::{Command, MachineHandle, MachineSnapshot};

/// Builder for [`Push`].
pub struct PushBuilder {
    transport: Arc<dyn PushTransport>,
    storage: Arc<dyn Storage>,
    platform: Arc<dyn PlatformPush>,
    registerer: Option<Arc<dyn CustomRegisterer>>,
    deregisterer: Option<Arc<dyn CustomDeregisterer>>,
    defaults: DeviceDefaults,
}

impl PushBuilder {
    /// Persist through `storage` instead of process memory.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    /// Acquire device details from `platform`.
    #[must_use]
    pub fn platform(mut self, platform: Arc<dyn PlatformPush>) -> Self {
        self.platform = platform;
        self
    }

    /// Install a custom registerer.
    #[must_use]
    pub fn registerer(mut self, registerer: Arc<dyn CustomRegisterer>) -> Self {
        self.registerer = Some(registerer);
        self
    }

    /// Install a custom deregisterer.
    #[must_use]
    pub fn deregisterer(mut self, deregisterer: Arc<dyn CustomDeregisterer>) -> Self {
        self.deregisterer = Some(deregisterer);
        self
    }

    /// Attributes for a device created on first use.
    #[must_use]
    pub fn device_defaults(mut self, defaults: DeviceDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Restore the activation machine and start it.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn build(self) -> Push {
        let transport = self.transport;
        let machine = MachineHandle::spawn(
            Collaborators {
                storage: self.storage,
                transport: Arc::clone(&transport),
                platform: self.platform,
                registerer: self.registerer,
                deregisterer: self.deregisterer,
            },
            self.defaults,
        );

        info!(transport = transport.name(), "Push initialized");
        Push { machine, transport }
    }
}

/// Push notifications for this device.
///
/// Owns one activation machine. Clones share it.
#[derive(Clone)]
pub struct Push {
    machine: MachineHandle,
    transport: Arc<dyn PushTransport>,
}

impl Push {
    /// Start building a facade over `transport`.
    ///
    /// Defaults to in-memory storage and a platform with no push details.
    #[must_use]
    pub fn builder(transport: Arc<dyn PushTransport>) -> PushBuilder {
        PushBuilder {
            transport,
            storage: Arc::new(MemoryStorage::new()),
            platform: Arc::new(StaticPlatform::unavailable()),
            registerer: None,
            deregisterer: None,
            defaults: DeviceDefaults::default(),
        }
    }

    /// Activate push, resolving through `callback`.
    ///
    /// `callback` receives `None` on success or the failure reason. It
    /// replaces the callback of any activate call still in progress.
    ///
    /// # Errors
    ///
    /// Returns `PushError::MachineStopped` if the machine is not running.
    pub fn activate_with<F>(&self, use_custom_registerer: bool, callback: F) -> Result<(), PushError>
    where
        F: FnOnce(Option<ErrorInfo>) + Send + 'static,
    {
        self.send(Command::Activate {
            use_custom_registerer,
            callback: Box::new(callback),
        })
    }

    /// Deactivate push, resolving through `callback`.
    ///
    /// # Errors
    ///
    /// Returns `PushError::MachineStopped` if the machine is not running.
    pub fn deactivate_with<F>(
        &self,
        use_custom_deregisterer: bool,
        callback: F,
    ) -> Result<(), PushError>
    where
        F: FnOnce(Option<ErrorInfo>) + Send + 'static,
    {
        self.send(Command::Deactivate {
            use_custom_deregisterer,
            callback: Box::new(callback),
        })
    }

    /// Activate push and wait for the outcome.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Rejected` with the failure reason,
    /// `PushError::Superseded` if a later activate call took over, or
    /// `PushError::MachineStopped`.
    pub async fn activate(&self, use_custom_registerer: bool) -> Result<(), PushError> {
        let (tx, rx) = oneshot::channel();
        self.activate_with(use_custom_registerer, move |reason| {
            let _ = tx.send(reason);
        })?;
        self.outcome(rx).await
    }

    /// Deactivate push and wait for the outcome.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Rejected` with the failure reason,
    /// `PushError::Superseded` if a later deactivate call took over, or
    /// `PushError::MachineStopped`.
    pub async fn deactivate(&self, use_custom_deregisterer: bool) -> Result<(), PushError> {
        let (tx, rx) = oneshot::channel();
        self.deactivate_with(use_custom_deregisterer, move |reason| {
            let _ = tx.send(reason);
        })?;
        self.outcome(rx).await
    }

    /// Get notified when refreshing an existing registration fails.
    ///
    /// # Errors
    ///
    /// Returns `PushError::MachineStopped` if the machine is not running.
    pub fn on_registration_update_failed<F>(&self, callback: F) -> Result<(), PushError>
    where
        F: Fn(ErrorInfo) + Send + Sync + 'static,
    {
        self.send(Command::SetUpdateFailedCallback(Arc::new(callback)))
    }

    /// Feed a platform event into the machine, such as a rotated push
    /// token arriving as `GotPushDeviceDetails`.
    ///
    /// # Errors
    ///
    /// Returns `PushError::MachineStopped` if the machine is not running.
    pub fn raise(&self, event: Event) -> Result<(), PushError> {
        debug!(event = event.name(), "Raising event");
        self.send(Command::Event(event))
    }

    /// Current state, pending events, device and custom flags.
    ///
    /// The snapshot is taken after every command sent before it.
    ///
    /// # Errors
    ///
    /// Returns `PushError::MachineStopped` if the machine is not running.
    pub async fn snapshot(&self) -> Result<MachineSnapshot, PushError> {
        self.machine
            .snapshot()
            .await
            .ok_or(PushError::MachineStopped)
    }

    /// Publish a notification straight to a recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if `payload` is not an object or the request fails.
    pub async fn publish(&self, recipient: Value, payload: Value) -> Result<(), PushError> {
        let request = PublishRequest::new(recipient, payload)?;
        self.transport.publish(&request).await?;
        Ok(())
    }

    /// The machine worker handle.
    #[must_use]
    pub fn machine(&self) -> &MachineHandle {
        &self.machine
    }

    fn send(&self, command: Command) -> Result<(), PushError> {
        if self.machine.send(command) {
            Ok(())
        } else {
            Err(PushError::MachineStopped)
        }
    }

    async fn outcome(
        &self,
        rx: oneshot::Receiver<Option<ErrorInfo>>,
    ) -> Result<(), PushError> {
        match rx.await {
            Ok(None) => Ok(()),
            Ok(Some(reason)) => Err(PushError::Rejected(reason)),
            Err(_) if self.machine.is_closed() => Err(PushError::MachineStopped),
            Err(_) => Err(PushError::Superseded),
        }
    }
}

impl std::fmt::Debug for Push {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Push")
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}
