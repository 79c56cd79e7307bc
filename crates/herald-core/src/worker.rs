//! The single consumer that drives an [`ActivationStateMachine`].
//!
//! Callers and background work talk to the machine only through
//! [`Command`]s on one unbounded channel, so transitions happen strictly in
//! arrival order and never overlap.

use herald_protocol::ErrorInfo;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::device::{DeviceDefaults, LocalDevice};
use crate::event::Event;
use crate::machine::{ActivationStateMachine, Collaborators};
use crate::state::ActivationState;

/// Resolves a pending activate or deactivate call. Invoked at most once.
pub type ActivationCallback = Box<dyn FnOnce(Option<ErrorInfo>) + Send>;

/// Notified whenever a registration update fails.
pub type UpdateFailedCallback = Arc<dyn Fn(ErrorInfo) + Send + Sync>;

/// A request to the machine worker.
pub enum Command {
    /// Stash the activate callback and raise `CalledActivate`.
    Activate {
        use_custom_registerer: bool,
        callback: ActivationCallback,
    },
    /// Stash the deactivate callback and raise `CalledDeactivate`.
    Deactivate {
        use_custom_deregisterer: bool,
        callback: ActivationCallback,
    },
    /// Install the update-failed callback.
    SetUpdateFailedCallback(UpdateFailedCallback),
    /// Handle an event.
    Event(Event),
    /// Report the machine's current view.
    Snapshot(oneshot::Sender<MachineSnapshot>),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Activate {
                use_custom_registerer,
                ..
            } => f
                .debug_struct("Activate")
                .field("use_custom_registerer", use_custom_registerer)
                .finish_non_exhaustive(),
            Command::Deactivate {
                use_custom_deregisterer,
                ..
            } => f
                .debug_struct("Deactivate")
                .field("use_custom_deregisterer", use_custom_deregisterer)
                .finish_non_exhaustive(),
            Command::SetUpdateFailedCallback(_) => f.write_str("SetUpdateFailedCallback"),
            Command::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Command::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}

/// Point-in-time view of the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSnapshot {
    pub state: ActivationState,
    /// Deferred event names, oldest first.
    pub pending: Vec<&'static str>,
    pub device: LocalDevice,
    pub use_custom_registerer: bool,
    pub use_custom_deregisterer: bool,
}

/// Sending side of a running machine.
#[derive(Debug, Clone)]
pub struct MachineHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl MachineHandle {
    /// Restore a machine from storage and start its worker on the current
    /// Tokio runtime.
    ///
    /// The worker exits once every handle is dropped and no background work
    /// is left in flight.
    #[must_use]
    pub fn spawn(collaborators: Collaborators, defaults: DeviceDefaults) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let machine = ActivationStateMachine::new(collaborators, defaults, tx.downgrade());

        debug!(state = %machine.current(), "Spawning activation worker");
        tokio::spawn(machine.run(rx));

        Self { commands: tx }
    }

    /// Send a command.
    ///
    /// Returns `false` if the worker has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Raise an event.
    ///
    /// Returns `false` if the worker has stopped.
    pub fn raise(&self, event: Event) -> bool {
        self.send(Command::Event(event))
    }

    /// Ask the worker for a snapshot.
    ///
    /// Returns `None` if the worker has stopped.
    pub async fn snapshot(&self) -> Option<MachineSnapshot> {
        let (tx, rx) = oneshot::channel();
        if !self.send(Command::Snapshot(tx)) {
            return None;
        }
        rx.await.ok()
    }

    /// Check if the worker has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
