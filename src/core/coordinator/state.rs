use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one publish run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatorState {
    /// Nothing has happened yet.
    #[default]
    Pending,
    /// Resolving dependencies and running local checks.
    Validating,
    /// Platform attempts are in flight.
    Publishing,
    /// Terminal. Reached on success, partial failure and validation failure.
    Completed,
}

impl CoordinatorState {
    /// Allowed moves. Every non-terminal state may jump to `Completed`.
    pub fn can_advance_to(self, next: CoordinatorState) -> bool {
        use CoordinatorState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Publishing)
                | (Pending, Completed)
                | (Validating, Completed)
                | (Publishing, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == CoordinatorState::Completed
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorState::Pending => write!(f, "pending"),
            CoordinatorState::Validating => write!(f, "validating"),
            CoordinatorState::Publishing => write!(f, "publishing"),
            CoordinatorState::Completed => write!(f, "completed"),
        }
    }
}
