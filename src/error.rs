use thiserror::Error;

use crate::model::PlayerId;

#[derive(Error, Debug)]
pub enum WgpError {
    #[error("Cannot {action} while {state}")]
    InvalidStateTransition { action: &'static str, state: String },

    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),

    #[error("Player {player} has already used their float this game")]
    AlreadyUsed { player: PlayerId },

    #[error("Invalid data: {0}")]
    Validation(String),

    #[error("Degenerate numeric input: {0}")]
    NumericDegenerateInput(String),

    #[error("No game with id: {0}")]
    UnknownGame(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WgpError {
    pub fn invalid_state(action: &'static str, state: impl Into<String>) -> Self {
        WgpError::InvalidStateTransition {
            action,
            state: state.into(),
        }
    }

    /// True for the rules-engine rejections a caller should surface verbatim.
    pub fn is_rules_violation(&self) -> bool {
        matches!(
            self,
            WgpError::InvalidStateTransition { .. }
                | WgpError::PreconditionNotMet(_)
                | WgpError::AlreadyUsed { .. }
        )
    }
}

pub type WgpResult<T> = Result<T, WgpError>;
