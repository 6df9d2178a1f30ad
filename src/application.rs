use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::actions::{Action, ActionResponse, GameId, UserName};
use crate::catalog::Catalog;
use crate::enums::{ActionType, GameConfiguration, GameMode};
use crate::errors::{ServiceError, ServiceResult};
use crate::game::Game;
use crate::game_log::LogEntry;
use crate::random::{OsRandomSource, RandomSource};
use crate::state::{GameState, GameStatus, PlayerSeat};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A log entry published to observers of a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub game_id: GameId,
    pub entry: LogEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: GameId,
    pub status: GameStatus,
    pub players: Vec<UserName>,
    pub round: u32,
}

/// One game plus the bookkeeping the session layer keeps around it.
#[derive(Debug)]
pub struct GameSession {
    pub game: Game,
    turn_number: u64,
    turn_started: Instant,
}

impl GameSession {
    fn new(game: Game) -> Self {
        let turn_number = game.state().turn.turn_number;
        Self {
            game,
            turn_number,
            turn_started: Instant::now(),
        }
    }

    /// Restarts the turn clock when the turn has moved on.
    fn touch(&mut self) {
        let turn_number = self.game.state().turn.turn_number;
        if turn_number != self.turn_number {
            self.turn_number = turn_number;
            self.turn_started = Instant::now();
        }
    }

    pub fn turn_elapsed(&self) -> Duration {
        self.turn_started.elapsed()
    }
}

/// Registry of running games.
///
/// Each game sits behind its own mutex, so one submission runs to completion
/// before the next starts while separate games proceed concurrently.
#[derive(Clone)]
pub struct GameService {
    games: Arc<RwLock<HashMap<GameId, Arc<Mutex<GameSession>>>>>,
    catalogs: Arc<HashMap<GameMode, Arc<Catalog>>>,
    random: Arc<dyn RandomSource>,
    events: broadcast::Sender<GameEvent>,
}

impl GameService {
    /// Serves the base game.
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        let catalogs = [(GameMode::Base, Arc::new(Catalog::for_mode(GameMode::Base)))];
        Self::with_catalogs(catalogs.into_iter().collect(), random)
    }

    /// Serves exactly the modes in `catalogs`.
    pub fn with_catalogs(
        catalogs: HashMap<GameMode, Arc<Catalog>>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            games: Arc::new(RwLock::new(HashMap::new())),
            catalogs: Arc::new(catalogs),
            random,
            events,
        }
    }

    pub fn catalog(&self, mode: GameMode) -> Option<&Arc<Catalog>> {
        self.catalogs.get(&mode)
    }

    /// Observers receive every log entry of every game.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Create and start a new game
    pub async fn create_game(
        &self,
        config: GameConfiguration,
        seats: Vec<PlayerSeat>,
    ) -> ServiceResult<GameId> {
        let catalog = self.catalog(config.mode).cloned().ok_or_else(|| {
            ServiceError::invalid_configuration(format!("mode {:?} is not served here", config.mode))
        })?;
        let game_id = Uuid::new_v4().to_string();
        let game = Game::new(
            game_id.clone(),
            catalog,
            self.random.clone(),
            config,
            seats,
        )
        .map_err(|err| ServiceError::invalid_configuration(err.to_string()))?;

        self.publish(&game_id, game.log().entries());
        {
            let mut games = self.games.write().await;
            games.insert(game_id.clone(), Arc::new(Mutex::new(GameSession::new(game))));
        }
        log::info!("🆕 Created game {}", game_id);
        Ok(game_id)
    }

    async fn session(&self, game_id: &str) -> ServiceResult<Arc<Mutex<GameSession>>> {
        let games = self.games.read().await;
        games
            .get(game_id)
            .cloned()
            .ok_or_else(|| ServiceError::game_not_found(game_id))
    }

    /// Submit an action on behalf of `user_name`
    pub async fn submit_action(
        &self,
        game_id: &str,
        user_name: &str,
        action: Action,
    ) -> ServiceResult<ActionResponse> {
        let session = self.session(game_id).await?;
        let mut session = session.lock().await;
        let response = session.game.submit_action(action, user_name);
        session.touch();
        self.publish(game_id, &response.log_entries);
        Ok(response)
    }

    /// Submit an undecoded wire payload on behalf of `user_name`
    pub async fn submit_raw_action(
        &self,
        game_id: &str,
        user_name: &str,
        payload: serde_json::Value,
    ) -> ServiceResult<ActionResponse> {
        let session = self.session(game_id).await?;
        let mut session = session.lock().await;
        let response = session.game.submit_raw(payload, user_name);
        session.touch();
        self.publish(game_id, &response.log_entries);
        Ok(response)
    }

    pub async fn possible_actions(
        &self,
        game_id: &str,
        user_name: &str,
    ) -> ServiceResult<Vec<ActionType>> {
        let session = self.session(game_id).await?;
        let session = session.lock().await;
        Ok(session.game.possible_actions(user_name)?)
    }

    /// Snapshot of the current game state
    pub async fn game_state(&self, game_id: &str) -> ServiceResult<GameState> {
        let session = self.session(game_id).await?;
        let session = session.lock().await;
        Ok(session.game.state().clone())
    }

    /// Log entries with `sequence >= cursor`
    pub async fn log_since(&self, game_id: &str, cursor: u64) -> ServiceResult<Vec<LogEntry>> {
        let session = self.session(game_id).await?;
        let session = session.lock().await;
        Ok(session.game.log().entries_since(cursor).to_vec())
    }

    /// Get all games
    pub async fn list_games(&self) -> Vec<GameSummary> {
        let sessions: Vec<(GameId, Arc<Mutex<GameSession>>)> = {
            let games = self.games.read().await;
            games
                .iter()
                .map(|(id, session)| (id.clone(), session.clone()))
                .collect()
        };
        let mut summaries = Vec::with_capacity(sessions.len());
        for (game_id, session) in sessions {
            let session = session.lock().await;
            let state = session.game.state();
            summaries.push(GameSummary {
                game_id,
                status: state.status.clone(),
                players: state.players.iter().map(|p| p.user_name.clone()).collect(),
                round: state.turn.round,
            });
        }
        summaries.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        summaries
    }

    /// Remove a game (cleanup)
    pub async fn remove_game(&self, game_id: &str) -> ServiceResult<()> {
        let mut games = self.games.write().await;
        if games.remove(game_id).is_none() {
            return Err(ServiceError::game_not_found(game_id));
        }
        log::info!("🗑️ Removed game {}", game_id);
        Ok(())
    }

    /// Forfeits every active player whose turn has lasted at least `limit`.
    /// Returns the affected games and users.
    pub async fn expire_turns(&self, limit: Duration) -> Vec<(GameId, UserName)> {
        let sessions: Vec<(GameId, Arc<Mutex<GameSession>>)> = {
            let games = self.games.read().await;
            games
                .iter()
                .map(|(id, session)| (id.clone(), session.clone()))
                .collect()
        };

        let mut expired = Vec::new();
        for (game_id, session) in sessions {
            let mut session = session.lock().await;
            if session.turn_elapsed() < limit {
                continue;
            }
            let Some(user_name) = session.game.active_user_name().map(str::to_string) else {
                continue;
            };
            log::warn!(
                "⏰ {} ran out of time in game {}, forfeiting",
                user_name,
                game_id
            );
            let response = session.game.submit_action(Action::Forfeit, &user_name);
            session.touch();
            self.publish(&game_id, &response.log_entries);
            expired.push((game_id, user_name));
        }
        expired
    }

    fn publish(&self, game_id: &str, entries: &[LogEntry]) {
        for entry in entries {
            // No subscribers is not an error.
            let _ = self.events.send(GameEvent {
                game_id: game_id.to_string(),
                entry: entry.clone(),
            });
        }
    }
}

impl Default for GameService {
    fn default() -> Self {
        Self::new(Arc::new(OsRandomSource))
    }
}
