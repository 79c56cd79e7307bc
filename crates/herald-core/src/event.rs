//! Inputs to the activation state machine.
//!
//! Events are either caller intents (`CalledActivate`, `CalledDeactivate`)
//! or outcomes of work the machine started (platform callbacks and network
//! responses).

use herald_protocol::ErrorInfo;
use serde_json::Value;

/// An input to the activation state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The caller asked to activate push.
    CalledActivate {
        /// Register through the installed `CustomRegisterer`.
        use_custom_registerer: bool,
    },
    /// The caller asked to deactivate push.
    CalledDeactivate {
        /// Deregister through the installed `CustomDeregisterer`.
        use_custom_deregisterer: bool,
    },
    /// The platform supplied device details.
    ///
    /// `recipient` is `None` when the details were already on the device.
    GotPushDeviceDetails { recipient: Option<Value> },
    /// The platform could not supply device details.
    GettingPushDeviceDetailsFailed { reason: ErrorInfo },
    /// The service accepted the registration.
    GotUpdateToken { update_token: String },
    /// The service rejected the registration.
    GettingUpdateTokenFailed { reason: ErrorInfo },
    /// The service accepted a registration update.
    RegistrationUpdated,
    /// The service rejected a registration update.
    UpdatingRegistrationFailed { reason: ErrorInfo },
    /// The service removed the registration.
    Deregistered,
    /// The service could not remove the registration.
    DeregistrationFailed { reason: ErrorInfo },
}

impl Event {
    /// Get the event's name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Event::CalledActivate { .. } => "CalledActivate",
            Event::CalledDeactivate { .. } => "CalledDeactivate",
            Event::GotPushDeviceDetails { .. } => "GotPushDeviceDetails",
            Event::GettingPushDeviceDetailsFailed { .. } => "GettingPushDeviceDetailsFailed",
            Event::GotUpdateToken { .. } => "GotUpdateToken",
            Event::GettingUpdateTokenFailed { .. } => "GettingUpdateTokenFailed",
            Event::RegistrationUpdated => "RegistrationUpdated",
            Event::UpdatingRegistrationFailed { .. } => "UpdatingRegistrationFailed",
            Event::Deregistered => "Deregistered",
            Event::DeregistrationFailed { .. } => "DeregistrationFailed",
        }
    }

    /// Create a `CalledActivate` event.
    #[must_use]
    pub fn called_activate(use_custom_registerer: bool) -> Self {
        Event::CalledActivate {
            use_custom_registerer,
        }
    }

    /// Create a `CalledDeactivate` event.
    #[must_use]
    pub fn called_deactivate(use_custom_deregisterer: bool) -> Self {
        Event::CalledDeactivate {
            use_custom_deregisterer,
        }
    }

    /// Create a `GotPushDeviceDetails` event carrying a new recipient.
    #[must_use]
    pub fn got_push_device_details(recipient: Value) -> Self {
        Event::GotPushDeviceDetails {
            recipient: Some(recipient),
        }
    }

    /// Create a `GotUpdateToken` event.
    #[must_use]
    pub fn got_update_token(update_token: impl Into<String>) -> Self {
        Event::GotUpdateToken {
            update_token: update_token.into(),
        }
    }

    /// The failure reason, for failure events.
    #[must_use]
    pub fn reason(&self) -> Option<&ErrorInfo> {
        match self {
            Event::GettingPushDeviceDetailsFailed { reason }
            | Event::GettingUpdateTokenFailed { reason }
            | Event::UpdatingRegistrationFailed { reason }
            | Event::DeregistrationFailed { reason } => Some(reason),
            _ => None,
        }
    }

    /// A representative of every event kind.
    #[must_use]
    pub fn samples() -> Vec<Event> {
        let reason = ErrorInfo::internal("sample");
        vec![
            Event::called_activate(false),
            Event::called_deactivate(false),
            Event::GotPushDeviceDetails { recipient: None },
            Event::GettingPushDeviceDetailsFailed {
                reason: reason.clone(),
            },
            Event::got_update_token("sample-token"),
            Event::GettingUpdateTokenFailed {
                reason: reason.clone(),
            },
            Event::RegistrationUpdated,
            Event::UpdatingRegistrationFailed {
                reason: reason.clone(),
            },
            Event::Deregistered,
            Event::DeregistrationFailed { reason },
        ]
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
