// Machi Koro Server Library - Core Module Organization
//
// Rules engine first, then the session layer and the transport on top of it.

// Core game data structures and enums
pub mod actions;
pub mod activation;
pub mod catalog;
pub mod enums;
pub mod errors;
pub mod game_log;
pub mod random;
pub mod state;

// Game logic implementation
pub mod game;
pub mod players;
pub mod query;

// Server implementation
pub mod application;
pub mod server;
pub mod websocket;

// Re-export common types for convenient access
pub use crate::actions::{Action, ActionResponse, ErrorDetail, GameId, UserName};
pub use crate::application::{GameEvent, GameService};
pub use crate::catalog::Catalog;
pub use crate::enums::{ActionType, GameConfiguration, GameMode};
pub use crate::errors::{ErrorKind, GameError, GameResult, ServiceError, ServiceResult};
pub use crate::game::Game;
pub use crate::game_log::{GameLog, LogEntry, StateChange};
pub use crate::state::{GameState, GameStatus, PlayerSeat};
pub use crate::websocket::WsMessage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
