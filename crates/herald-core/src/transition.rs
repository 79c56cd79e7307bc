//! The activation transition table.
//!
//! [`transition`] is a pure function of the current state, the incoming event
//! and the local device. It never performs I/O; it describes what the engine
//! must do as a list of [`Action`]s.

use herald_protocol::ErrorInfo;

use crate::device::LocalDevice;
use crate::event::Event;
use crate::state::{ActivationState, DeregistrationFallback};

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Append an event to the tail of the pending queue.
    Enqueue(Event),
    /// Ask the platform for device details.
    RequestDeviceDetails,
    /// Register the device, through the custom registerer if selected.
    Register,
    /// Update the existing registration.
    UpdateRegistration,
    /// Remove the registration, through the custom deregisterer if selected.
    Deregister,
    /// Store an update token on the device and persist it.
    StoreUpdateToken(String),
    /// Clear the device's update token and persist it.
    ClearUpdateToken,
    /// Resolve the pending activate call.
    NotifyActivated(Option<ErrorInfo>),
    /// Resolve the pending deactivate call.
    NotifyDeactivated(Option<ErrorInfo>),
    /// Report a failed registration update.
    NotifyUpdateFailed(ErrorInfo),
}

/// The outcome of a handled event.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// State to adopt.
    pub next: ActivationState,
    /// Effects to run, in order.
    pub actions: Vec<Action>,
}

impl Step {
    fn to(next: ActivationState) -> Self {
        Self {
            next,
            actions: Vec::new(),
        }
    }

    fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

/// Apply `event` to `state`.
///
/// Returns `None` when the state does not handle the event yet. The caller
/// defers such events to the pending queue; they are never dropped.
#[must_use]
pub fn transition(state: ActivationState, event: &Event, device: &LocalDevice) -> Option<Step> {
    use ActivationState as S;
    use Event as E;

    match (state, event) {
        (S::NotActivated, E::CalledDeactivate { .. }) => {
            Some(Step::to(S::NotActivated).with(Action::NotifyDeactivated(None)))
        }
        (S::NotActivated, E::CalledActivate { .. }) => {
            if device.update_token.is_some() {
                // Already registered; let the registered state answer.
                return Some(
                    Step::to(S::WaitingForNewPushDeviceDetails)
                        .with(Action::Enqueue(event.clone())),
                );
            }

            let step = Step::to(S::WaitingForPushDeviceDetails);
            if device.recipient.is_some() {
                Some(step.with(Action::Enqueue(E::GotPushDeviceDetails { recipient: None })))
            } else {
                Some(step.with(Action::RequestDeviceDetails))
            }
        }
        (S::NotActivated, E::GotPushDeviceDetails { .. }) => Some(Step::to(S::NotActivated)),

        (S::WaitingForPushDeviceDetails, E::CalledActivate { .. }) => {
            Some(Step::to(S::WaitingForPushDeviceDetails))
        }
        (S::WaitingForPushDeviceDetails, E::CalledDeactivate { .. }) => {
            Some(Step::to(S::NotActivated).with(Action::NotifyDeactivated(None)))
        }
        (S::WaitingForPushDeviceDetails, E::GotPushDeviceDetails { .. }) => {
            Some(Step::to(S::WaitingForUpdateToken).with(Action::Register))
        }
        (S::WaitingForPushDeviceDetails, E::GettingPushDeviceDetailsFailed { reason }) => Some(
            Step::to(S::NotActivated).with(Action::NotifyActivated(Some(reason.clone()))),
        ),

        (S::WaitingForUpdateToken, E::CalledActivate { .. }) => {
            Some(Step::to(S::WaitingForUpdateToken))
        }
        (S::WaitingForUpdateToken, E::GotUpdateToken { update_token }) => Some(
            Step::to(S::WaitingForNewPushDeviceDetails)
                .with(Action::StoreUpdateToken(update_token.clone()))
                .with(Action::NotifyActivated(None)),
        ),
        (S::WaitingForUpdateToken, E::GettingUpdateTokenFailed { reason }) => Some(
            Step::to(S::NotActivated).with(Action::NotifyActivated(Some(reason.clone()))),
        ),

        (S::WaitingForNewPushDeviceDetails, E::CalledActivate { .. }) => Some(
            Step::to(S::WaitingForNewPushDeviceDetails).with(Action::NotifyActivated(None)),
        ),
        (S::WaitingForNewPushDeviceDetails, E::CalledDeactivate { .. }) => Some(
            Step::to(S::WaitingForDeregistration(
                DeregistrationFallback::WaitingForNewPushDeviceDetails,
            ))
            .with(Action::Deregister),
        ),
        (S::WaitingForNewPushDeviceDetails, E::GotPushDeviceDetails { .. }) => {
            Some(Step::to(S::WaitingForRegistrationUpdate).with(Action::UpdateRegistration))
        }

        (S::WaitingForRegistrationUpdate, E::CalledActivate { .. }) => Some(
            Step::to(S::WaitingForRegistrationUpdate).with(Action::NotifyActivated(None)),
        ),
        (S::WaitingForRegistrationUpdate, E::RegistrationUpdated) => {
            Some(Step::to(S::WaitingForNewPushDeviceDetails))
        }
        (S::WaitingForRegistrationUpdate, E::UpdatingRegistrationFailed { reason }) => Some(
            Step::to(S::AfterRegistrationUpdateFailed)
                .with(Action::NotifyUpdateFailed(reason.clone())),
        ),

        (
            S::AfterRegistrationUpdateFailed,
            E::CalledActivate { .. } | E::GotPushDeviceDetails { .. },
        ) => Some(Step::to(S::WaitingForRegistrationUpdate).with(Action::UpdateRegistration)),
        (S::AfterRegistrationUpdateFailed, E::CalledDeactivate { .. }) => Some(
            Step::to(S::WaitingForDeregistration(
                DeregistrationFallback::AfterRegistrationUpdateFailed,
            ))
            .with(Action::Deregister),
        ),

        (S::WaitingForDeregistration(fallback), E::CalledDeactivate { .. }) => {
            Some(Step::to(S::WaitingForDeregistration(fallback)))
        }
        (S::WaitingForDeregistration(_), E::Deregistered) => Some(
            Step::to(S::NotActivated)
                .with(Action::ClearUpdateToken)
                .with(Action::NotifyDeactivated(None)),
        ),
        (S::WaitingForDeregistration(fallback), E::DeregistrationFailed { reason }) => Some(
            Step::to(fallback.state()).with(Action::NotifyDeactivated(Some(reason.clone()))),
        ),

        _ => None,
    }
}
