use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::GameId;

/// Serializable tag for every error the engine can report to a submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidState,
    InvalidActionOptions,
    ActionCantBeTakenOnSelf,
    NotPlayersTurn,
    InvalidStateToTakeAction,
    PlayerUserNameNotFound,
    UnknownAction,
    Unknown,
}

impl ErrorKind {
    /// Whether the submitter may simply resubmit (possibly with corrected options).
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidActionOptions
                | ErrorKind::ActionCantBeTakenOnSelf
                | ErrorKind::NotPlayersTurn
                | ErrorKind::InvalidStateToTakeAction
                | ErrorKind::UnknownAction
        )
    }

    /// Errors that mean the engine itself is broken and the game must halt.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::InvalidState | ErrorKind::Unknown)
    }
}

/// Rules-engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameError {
    #[error("Invalid game state: {details}")]
    InvalidState { details: String },

    #[error("Invalid action options: {details}")]
    InvalidActionOptions { details: String },

    #[error("Action can't be taken on self: {details}")]
    ActionCantBeTakenOnSelf { details: String },

    #[error("Not player's turn: current={current_player}, attempted={attempted_player}")]
    NotPlayersTurn {
        current_player: String,
        attempted_player: String,
    },

    #[error("Invalid state to take action '{action}': {details}")]
    InvalidStateToTakeAction { action: String, details: String },

    #[error("Player user name not found: {user_name}")]
    PlayerUserNameNotFound { user_name: String },

    #[error("Unknown action: {details}")]
    UnknownAction { details: String },

    #[error("Unexpected engine failure: {details}")]
    Unknown { details: String },
}

/// Session/service level errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ServiceError {
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Game not found: {game_id}")]
    GameNotFound { game_id: GameId },

    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },
}

/// Result type aliases for convenience
pub type GameResult<T> = Result<T, GameError>;
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Helper methods for creating common errors
impl GameError {
    pub fn invalid_state(details: impl Into<String>) -> Self {
        Self::InvalidState {
            details: details.into(),
        }
    }

    pub fn invalid_options(details: impl Into<String>) -> Self {
        Self::InvalidActionOptions {
            details: details.into(),
        }
    }

    pub fn on_self(details: impl Into<String>) -> Self {
        Self::ActionCantBeTakenOnSelf {
            details: details.into(),
        }
    }

    pub fn not_players_turn(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        Self::NotPlayersTurn {
            current_player: current.into(),
            attempted_player: attempted.into(),
        }
    }

    pub fn unknown_action(details: impl Into<String>) -> Self {
        Self::UnknownAction {
            details: details.into(),
        }
    }

    pub fn wrong_phase(action: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidStateToTakeAction {
            action: action.into(),
            details: details.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::InvalidState { .. } => ErrorKind::InvalidState,
            GameError::InvalidActionOptions { .. } => ErrorKind::InvalidActionOptions,
            GameError::ActionCantBeTakenOnSelf { .. } => ErrorKind::ActionCantBeTakenOnSelf,
            GameError::NotPlayersTurn { .. } => ErrorKind::NotPlayersTurn,
            GameError::InvalidStateToTakeAction { .. } => ErrorKind::InvalidStateToTakeAction,
            GameError::PlayerUserNameNotFound { .. } => ErrorKind::PlayerUserNameNotFound,
            GameError::UnknownAction { .. } => ErrorKind::UnknownAction,
            GameError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl ServiceError {
    pub fn game_not_found(game_id: impl Into<GameId>) -> Self {
        Self::GameNotFound {
            game_id: game_id.into(),
        }
    }

    pub fn invalid_configuration(details: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            details: details.into(),
        }
    }
}
