//! Registration state machine.

use serde::{Deserialize, Serialize};

/// Why a registration stopped before reaching downstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The email is already registered.
    EmailExists,
    /// The local store or audit write failed.
    PersistError,
}

/// The state of one registration in its lifecycle.
///
/// State transitions:
/// ```text
/// Validating ──► Persisting ──► Notifying ──► Evaluating ──┬──► Committed
///     │              │                                     └──► Compensated
///     └──────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RegistrationState {
    /// Checking that the email is not taken.
    #[default]
    Validating,

    /// Writing the store record and audit entry.
    Persisting,

    /// Sending the payload to downstream endpoints.
    Notifying,

    /// Deciding whether to commit or compensate.
    Evaluating,

    /// Every endpoint accepted the registration (terminal state).
    Committed,

    /// An endpoint failed and side effects were undone (terminal state).
    Compensated,

    /// Stopped before any downstream call (terminal state).
    Failed(FailureKind),
}

impl RegistrationState {
    /// Returns true if the machine may move from `self` to `next`.
    pub fn can_transition_to(&self, next: RegistrationState) -> bool {
        use RegistrationState::*;
        matches!(
            (self, next),
            (Validating, Persisting)
                | (Validating, Failed(_))
                | (Persisting, Notifying)
                | (Persisting, Failed(FailureKind::PersistError))
                | (Notifying, Evaluating)
                | (Evaluating, Committed)
                | (Evaluating, Compensated)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationState::Committed
                | RegistrationState::Compensated
                | RegistrationState::Failed(_)
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Validating => "Validating",
            RegistrationState::Persisting => "Persisting",
            RegistrationState::Notifying => "Notifying",
            RegistrationState::Evaluating => "Evaluating",
            RegistrationState::Committed => "Committed",
            RegistrationState::Compensated => "Compensated",
            RegistrationState::Failed(FailureKind::EmailExists) => "Failed(EmailExists)",
            RegistrationState::Failed(FailureKind::PersistError) => "Failed(PersistError)",
        }
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
