//! The activation state machine engine.
//!
//! The engine owns the current state, the pending queue and the local
//! device. It is driven by a single worker (see [`crate::worker`]), so
//! nothing here needs a lock: every event, whether a caller intent or the
//! completion of a network call, arrives through the same command channel
//! and is handled to completion before the next one.

use herald_protocol::{DeviceDetails, ErrorInfo};
use herald_transport::PushTransport;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, WeakUnboundedSender};
use tracing::{debug, info, trace, warn};

use crate::device::{DeviceDefaults, DeviceRegistrationStore, LocalDevice};
use crate::event::Event;
use crate::metrics;
use crate::platform::{CustomDeregisterer, CustomRegisterer, PlatformPush};
use crate::state::ActivationState;
use crate::storage::{get_flag, keys, set_flag, Storage, StorageError};
use crate::transition::{transition, Action, Step};
use crate::worker::{ActivationCallback, Command, MachineSnapshot, UpdateFailedCallback};

/// Everything the machine talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Persistence for machine fields and the local device.
    pub storage: Arc<dyn Storage>,
    /// Registration service.
    pub transport: Arc<dyn PushTransport>,
    /// Device detail acquisition.
    pub platform: Arc<dyn PlatformPush>,
    /// Used when activation selects a custom registerer.
    pub registerer: Option<Arc<dyn CustomRegisterer>>,
    /// Used when deactivation selects a custom deregisterer.
    pub deregisterer: Option<Arc<dyn CustomDeregisterer>>,
}

/// The activation state machine.
pub struct ActivationStateMachine {
    current: ActivationState,
    pending: VecDeque<Event>,
    use_custom_registerer: bool,
    use_custom_deregisterer: bool,
    store: DeviceRegistrationStore,
    collaborators: Collaborators,
    events: WeakUnboundedSender<Command>,
    activated_callback: Option<ActivationCallback>,
    deactivated_callback: Option<ActivationCallback>,
    update_failed_callback: Option<UpdateFailedCallback>,
}

impl ActivationStateMachine {
    /// Restore a machine from storage.
    ///
    /// Completions of the work the machine starts are sent back on
    /// `events`.
    pub fn new(
        collaborators: Collaborators,
        defaults: DeviceDefaults,
        events: WeakUnboundedSender<Command>,
    ) -> Self {
        let storage = &collaborators.storage;

        let current = match storage.get(keys::ACTIVATION_STATE) {
            None => ActivationState::NotActivated,
            Some(name) => ActivationState::from_persisted(&name).unwrap_or_else(|| {
                warn!(state = %name, "Ignoring unknown persisted activation state");
                ActivationState::NotActivated
            }),
        };
        let use_custom_registerer = get_flag(storage.as_ref(), keys::USE_CUSTOM_REGISTERER);
        let use_custom_deregisterer = get_flag(storage.as_ref(), keys::USE_CUSTOM_DEREGISTERER);
        let store = DeviceRegistrationStore::load(Arc::clone(storage), defaults);

        debug!(
            state = %current,
            use_custom_registerer,
            use_custom_deregisterer,
            "Restored activation machine"
        );

        Self {
            current,
            pending: VecDeque::new(),
            use_custom_registerer,
            use_custom_deregisterer,
            store,
            collaborators,
            events,
            activated_callback: None,
            deactivated_callback: None,
            update_failed_callback: None,
        }
    }

    /// The current state.
    #[must_use]
    pub fn current(&self) -> ActivationState {
        self.current
    }

    /// The local device.
    #[must_use]
    pub fn device(&self) -> &LocalDevice {
        self.store.device()
    }

    /// Names of the deferred events, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<&'static str> {
        self.pending.iter().map(Event::name).collect()
    }

    /// Process commands until every sender is gone.
    pub async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        info!(state = %self.current, "Activation machine started");

        while let Some(command) = commands.recv().await {
            self.execute(command);
        }

        debug!(state = %self.current, "Activation machine stopped");
    }

    /// Execute one command.
    pub fn execute(&mut self, command: Command) {
        match command {
            Command::Activate {
                use_custom_registerer,
                callback,
            } => {
                if self.activated_callback.replace(callback).is_some() {
                    debug!("Replacing pending activate callback");
                }
                self.handle_event(Event::called_activate(use_custom_registerer));
            }
            Command::Deactivate {
                use_custom_deregisterer,
                callback,
            } => {
                if self.deactivated_callback.replace(callback).is_some() {
                    debug!("Replacing pending deactivate callback");
                }
                self.handle_event(Event::called_deactivate(use_custom_deregisterer));
            }
            Command::SetUpdateFailedCallback(callback) => {
                self.update_failed_callback = Some(callback);
            }
            Command::Event(event) => self.handle_event(event),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Handle one event.
    ///
    /// An event the current state does not accept is appended to the
    /// pending queue. An accepted event moves the machine on, after which
    /// the queue is replayed from the head until the head is refused.
    pub fn handle_event(&mut self, event: Event) {
        self.intake(&event);

        debug!(event = event.name(), state = %self.current, "Handling event");

        let Some(step) = transition(self.current, &event, self.store.device()) else {
            debug!(event = event.name(), state = %self.current, "Enqueueing event");
            metrics::record_deferred(event.name());
            self.pending.push_back(event);
            metrics::set_pending(self.pending.len());
            return;
        };
        self.apply(&event, step);

        while let Some(head) = self.pending.front() {
            debug!(event = head.name(), "Attempting to consume pending event");

            let Some(step) = transition(self.current, head, self.store.device()) else {
                break;
            };
            if let Some(head) = self.pending.pop_front() {
                self.apply(&head, step);
            }
        }

        metrics::set_pending(self.pending.len());
        self.persist();
    }

    fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            state: self.current,
            pending: self.pending(),
            device: self.store.device().clone(),
            use_custom_registerer: self.use_custom_registerer,
            use_custom_deregisterer: self.use_custom_deregisterer,
        }
    }

    /// Record what an event carries before any state sees it.
    fn intake(&mut self, event: &Event) {
        match event {
            Event::CalledActivate {
                use_custom_registerer,
            } => {
                self.use_custom_registerer = *use_custom_registerer;
                self.persist();
            }
            Event::CalledDeactivate {
                use_custom_deregisterer,
            } => {
                self.use_custom_deregisterer = *use_custom_deregisterer;
                self.persist();
            }
            Event::GotPushDeviceDetails {
                recipient: Some(recipient),
            } => {
                if let Err(e) = self.store.set_recipient(recipient.clone()) {
                    self.persist_failed("device", &e);
                }
            }
            _ => {}
        }
    }

    fn apply(&mut self, event: &Event, step: Step) {
        debug!(
            "Transition: {} -({})-> {}",
            self.current,
            event.name(),
            step.next
        );
        metrics::record_transition(self.current.name(), step.next.name());

        self.current = step.next;
        for action in step.actions {
            self.run_action(action);
        }
    }

    fn run_action(&mut self, action: Action) {
        trace!(?action, "Running action");

        match action {
            Action::Enqueue(event) => self.pending.push_back(event),
            Action::RequestDeviceDetails => self.request_device_details(),
            Action::Register => self.register(),
            Action::UpdateRegistration => self.update_registration(),
            Action::Deregister => self.deregister(),
            Action::StoreUpdateToken(update_token) => {
                if let Err(e) = self.store.set_update_token(Some(update_token)) {
                    self.persist_failed("device", &e);
                }
            }
            Action::ClearUpdateToken => {
                if let Err(e) = self.store.set_update_token(None) {
                    self.persist_failed("device", &e);
                }
            }
            Action::NotifyActivated(reason) => match self.activated_callback.take() {
                Some(callback) => callback(reason),
                None => warn!(?reason, "No activate callback to notify"),
            },
            Action::NotifyDeactivated(reason) => match self.deactivated_callback.take() {
                Some(callback) => callback(reason),
                None => warn!(?reason, "No deactivate callback to notify"),
            },
            Action::NotifyUpdateFailed(reason) => match &self.update_failed_callback {
                Some(callback) => callback(reason),
                None => warn!(%reason, "Registration update failed"),
            },
        }
    }

    fn request_device_details(&self) {
        let platform = Arc::clone(&self.collaborators.platform);
        debug!(platform = platform.name(), "Requesting push device details");

        self.spawn(async move {
            match platform.get_push_device_details().await {
                Ok(recipient) => Event::got_push_device_details(recipient),
                Err(reason) => Event::GettingPushDeviceDetailsFailed { reason },
            }
        });
    }

    fn register(&self) {
        let details = self.details();

        if self.use_custom_registerer {
            let Some(registerer) = self.collaborators.registerer.clone() else {
                self.raise(Event::GettingUpdateTokenFailed {
                    reason: missing_hook("custom registerer"),
                });
                return;
            };
            debug!(device = %details.id, "Registering through custom registerer");
            self.spawn(async move {
                match registerer.register(&details).await {
                    Ok(update_token) => Event::GotUpdateToken { update_token },
                    Err(reason) => Event::GettingUpdateTokenFailed { reason },
                }
            });
            return;
        }

        let transport = Arc::clone(&self.collaborators.transport);
        debug!(device = %details.id, transport = transport.name(), "Registering device");
        self.spawn(async move {
            match transport.register(&details).await {
                Ok(update_token) => Event::GotUpdateToken { update_token },
                Err(e) => Event::GettingUpdateTokenFailed { reason: e.into() },
            }
        });
    }

    fn update_registration(&self) {
        let details = self.details();
        let Some(update_token) = self.store.device().update_token.clone() else {
            self.raise(Event::UpdatingRegistrationFailed {
                reason: missing_token(),
            });
            return;
        };

        if self.use_custom_registerer {
            let Some(registerer) = self.collaborators.registerer.clone() else {
                self.raise(Event::UpdatingRegistrationFailed {
                    reason: missing_hook("custom registerer"),
                });
                return;
            };
            debug!(device = %details.id, "Updating registration through custom registerer");
            self.spawn(async move {
                match registerer.update_registration(&details, &update_token).await {
                    Ok(()) => Event::RegistrationUpdated,
                    Err(reason) => Event::UpdatingRegistrationFailed { reason },
                }
            });
            return;
        }

        let transport = Arc::clone(&self.collaborators.transport);
        debug!(device = %details.id, transport = transport.name(), "Updating registration");
        self.spawn(async move {
            match transport.update_registration(&details, &update_token).await {
                Ok(()) => Event::RegistrationUpdated,
                Err(e) => Event::UpdatingRegistrationFailed { reason: e.into() },
            }
        });
    }

    fn deregister(&self) {
        let details = self.details();
        let Some(update_token) = self.store.device().update_token.clone() else {
            self.raise(Event::DeregistrationFailed {
                reason: missing_token(),
            });
            return;
        };

        if self.use_custom_deregisterer {
            let Some(deregisterer) = self.collaborators.deregisterer.clone() else {
                self.raise(Event::DeregistrationFailed {
                    reason: missing_hook("custom deregisterer"),
                });
                return;
            };
            debug!(device = %details.id, "Deregistering through custom deregisterer");
            self.spawn(async move {
                match deregisterer.deregister(&details, &update_token).await {
                    Ok(()) => Event::Deregistered,
                    Err(reason) => Event::DeregistrationFailed { reason },
                }
            });
            return;
        }

        let transport = Arc::clone(&self.collaborators.transport);
        debug!(device = %details.id, transport = transport.name(), "Deregistering device");
        self.spawn(async move {
            match transport.deregister(&details, &update_token).await {
                Ok(()) => Event::Deregistered,
                Err(e) => Event::DeregistrationFailed { reason: e.into() },
            }
        });
    }

    fn details(&self) -> DeviceDetails {
        let details = self.store.device().details();
        trace!(device = ?details, "Device details");
        details
    }

    /// Run `work` in the background and feed its outcome back as an event.
    fn spawn<F>(&self, work: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let Some(events) = self.events.upgrade() else {
            warn!("Activation machine is shutting down, dropping work");
            return;
        };

        tokio::spawn(async move {
            let event = work.await;
            if events.send(Command::Event(event)).is_err() {
                debug!("Activation machine stopped before work completed");
            }
        });
    }

    /// Queue an event behind the one being handled.
    fn raise(&self, event: Event) {
        warn!(event = event.name(), reason = ?event.reason(), "Raising failure");

        match self.events.upgrade() {
            Some(events) => {
                let _ = events.send(Command::Event(event));
            }
            None => warn!(event = event.name(), "Activation machine is shutting down"),
        }
    }

    /// Write the activation state (if quiescent) and both custom flags.
    fn persist(&self) {
        let storage = self.collaborators.storage.as_ref();

        if self.current.is_persistent() {
            if let Err(e) = storage.set(keys::ACTIVATION_STATE, self.current.name()) {
                self.persist_failed(keys::ACTIVATION_STATE, &e);
            }
        }
        if let Err(e) = set_flag(storage, keys::USE_CUSTOM_REGISTERER, self.use_custom_registerer) {
            self.persist_failed(keys::USE_CUSTOM_REGISTERER, &e);
        }
        if let Err(e) = set_flag(
            storage,
            keys::USE_CUSTOM_DEREGISTERER,
            self.use_custom_deregisterer,
        ) {
            self.persist_failed(keys::USE_CUSTOM_DEREGISTERER, &e);
        }
    }

    fn persist_failed(&self, what: &str, error: &StorageError) {
        metrics::record_persist_error();
        warn!(what, error = %error, state = %self.current, "Failed to persist");
    }
}

impl std::fmt::Debug for ActivationStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationStateMachine")
            .field("current", &self.current)
            .field("pending", &self.pending)
            .field("use_custom_registerer", &self.use_custom_registerer)
            .field("use_custom_deregisterer", &self.use_custom_deregisterer)
            .field("device", self.store.device())
            .finish_non_exhaustive()
    }
}

fn missing_hook(name: &str) -> ErrorInfo {
    ErrorInfo::bad_request(format!("No {name} installed"))
}

fn missing_token() -> ErrorInfo {
    ErrorInfo::bad_request("Device has no update token")
}
