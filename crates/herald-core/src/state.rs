//! Activation states.

use std::fmt;

/// State to return to when a deregistration request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeregistrationFallback {
    WaitingForNewPushDeviceDetails,
    AfterRegistrationUpdateFailed,
}

impl DeregistrationFallback {
    /// The state this fallback stands for.
    #[must_use]
    pub fn state(self) -> ActivationState {
        match self {
            Self::WaitingForNewPushDeviceDetails => ActivationState::WaitingForNewPushDeviceDetails,
            Self::AfterRegistrationUpdateFailed => ActivationState::AfterRegistrationUpdateFailed,
        }
    }
}

/// Position of a device in the push activation lifecycle.
///
/// Only `NotActivated` and `WaitingForNewPushDeviceDetails` are persisted.
/// Every other state has a network request or platform callback in flight
/// and cannot be resumed after a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActivationState {
    /// No registration exists. Initial state.
    #[default]
    NotActivated,
    /// Waiting on the platform for device details.
    WaitingForPushDeviceDetails,
    /// Registration request sent, waiting for the update token.
    WaitingForUpdateToken,
    /// Registered and idle.
    WaitingForNewPushDeviceDetails,
    /// Registration update in flight.
    WaitingForRegistrationUpdate,
    /// Registered, but the last update failed.
    AfterRegistrationUpdateFailed,
    /// Deregistration in flight.
    WaitingForDeregistration(DeregistrationFallback),
}

impl ActivationState {
    /// Get the state's name for logging and persistence.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotActivated => "NotActivated",
            Self::WaitingForPushDeviceDetails => "WaitingForPushDeviceDetails",
            Self::WaitingForUpdateToken => "WaitingForUpdateToken",
            Self::WaitingForNewPushDeviceDetails => "WaitingForNewPushDeviceDetails",
            Self::WaitingForRegistrationUpdate => "WaitingForRegistrationUpdate",
            Self::AfterRegistrationUpdateFailed => "AfterRegistrationUpdateFailed",
            Self::WaitingForDeregistration(_) => "WaitingForDeregistration",
        }
    }

    /// Check if this state is written to storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(
            self,
            Self::NotActivated | Self::WaitingForNewPushDeviceDetails
        )
    }

    /// Restore a state from its persisted name.
    ///
    /// Returns `None` for unknown names and for names of states that are
    /// never persisted.
    #[must_use]
    pub fn from_persisted(name: &str) -> Option<Self> {
        match name {
            "NotActivated" => Some(Self::NotActivated),
            "WaitingForNewPushDeviceDetails" => Some(Self::WaitingForNewPushDeviceDetails),
            _ => None,
        }
    }

    /// Every state, including both deregistration fallbacks.
    pub const ALL: [ActivationState; 8] = [
        Self::NotActivated,
        Self::WaitingForPushDeviceDetails,
        Self::WaitingForUpdateToken,
        Self::WaitingForNewPushDeviceDetails,
        Self::WaitingForRegistrationUpdate,
        Self::AfterRegistrationUpdateFailed,
        Self::WaitingForDeregistration(DeregistrationFallback::WaitingForNewPushDeviceDetails),
        Self::WaitingForDeregistration(DeregistrationFallback::AfterRegistrationUpdateFailed),
    ];
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForDeregistration(fallback) => {
                write!(f, "WaitingForDeregistration({})", fallback.state().name())
            }
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_quiescent_states_persist() {
        let persistent: Vec<_> = ActivationState::ALL
            .iter()
            .filter(|s| s.is_persistent())
            .collect();

        assert_eq!(
            persistent,
            vec![
                &ActivationState::NotActivated,
                &ActivationState::WaitingForNewPushDeviceDetails
            ]
        );
    }

    #[test]
    fn test_persisted_name_round_trip() {
        for state in ActivationState::ALL {
            let restored = ActivationState::from_persisted(state.name());
            if state.is_persistent() {
                assert_eq!(restored, Some(state));
            } else {
                assert_eq!(restored, None);
            }
        }
        assert_eq!(ActivationState::from_persisted("Bogus"), None);
    }

    #[test]
    fn test_display_includes_fallback() {
        let state = ActivationState::WaitingForDeregistration(
            DeregistrationFallback::AfterRegistrationUpdateFailed,
        );
        assert_eq!(
            state.to_string(),
            "WaitingForDeregistration(AfterRegistrationUpdateFailed)"
        );
        assert_eq!(state.name(), "WaitingForDeregistration");
    }
}
