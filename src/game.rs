//! Engine facade: one game, its log and the submission boundary.
//!
//! `submit_action` never panics and never returns `Err`. Each submission runs
//! against a working copy of the state with a scratch log; only a fully
//! successful submission is committed.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::actions::{Action, ActionResponse, ErrorDetail, GameId};
use crate::catalog::Catalog;
use crate::enums::{ActionType, GameConfiguration, PlayerIndex};
use crate::errors::{GameError, GameResult};
use crate::game_log::{GameLog, LogEntry, StateChange};
use crate::query::StateQuery;
use crate::random::RandomSource;
use crate::state::{GameState, GameStatus, PlayerSeat};

pub struct Game {
    pub id: GameId,
    pub config: GameConfiguration,
    catalog: Arc<Catalog>,
    random: Arc<dyn RandomSource>,
    state: GameState,
    log: GameLog,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("status", &self.state.status)
            .field("turn", &self.state.turn)
            .field("log_len", &self.log.len())
            .finish()
    }
}

impl Game {
    /// Seats the players, deals the starting position and opens the first turn.
    pub fn new(
        id: impl Into<GameId>,
        catalog: Arc<Catalog>,
        random: Arc<dyn RandomSource>,
        config: GameConfiguration,
        seats: Vec<PlayerSeat>,
    ) -> GameResult<Self> {
        let id = id.into();
        let state = GameState::new(&catalog, &config, seats, random.as_ref())?;
        let mut game = Self {
            id,
            config,
            catalog,
            random,
            state,
            log: GameLog::new(),
        };

        let turn_order: Vec<String> = game
            .state
            .players
            .iter()
            .map(|p| p.user_name.clone())
            .collect();
        log::info!("🎮 Game {} started: {}", game.id, turn_order.join(", "));
        let message = format!("Game started, turn order: {}", turn_order.join(", "));
        game.log
            .create_state_update(StateChange::GameStarted { turn_order }, message);
        let mut scratch = game.log.continuation();
        game.request_next_action(&mut scratch)?;
        game.log.append(scratch);
        Ok(game)
    }

    pub fn query(&self) -> StateQuery<'_> {
        StateQuery::new(&self.catalog)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn log(&self) -> &GameLog {
        &self.log
    }

    pub fn status(&self) -> &GameStatus {
        &self.state.status
    }

    pub fn is_over(&self) -> bool {
        !self.state.is_in_progress()
    }

    /// User name of the player expected to act next.
    pub fn active_user_name(&self) -> Option<&str> {
        if !self.state.is_in_progress() {
            return None;
        }
        self.query().active_user_name(&self.state).ok()
    }

    /// Advisory; the same rule set `submit_action` enforces.
    pub fn possible_actions(&self, user_name: &str) -> GameResult<Vec<ActionType>> {
        let query = self.query();
        let player = query.player_index(&self.state, user_name)?;
        Ok(query.possible_actions(&self.state, player))
    }

    /// Submits an undecoded wire payload. Payloads that don't decode to an
    /// [`Action`] are rejected like any other bad input.
    pub fn submit_raw(&mut self, payload: serde_json::Value, user_name: &str) -> ActionResponse {
        let resolved = self.query().player_index(&self.state, user_name);
        let player = match resolved {
            Ok(player) => player,
            Err(err) => return self.reject(None, err),
        };
        match Action::from_value(payload) {
            Ok(action) => self.submit_action(action, user_name),
            Err(err) => self.reject(Some(player), err),
        }
    }

    /// The only mutating entry point.
    pub fn submit_action(&mut self, action: Action, user_name: &str) -> ActionResponse {
        let resolved = self.query().player_index(&self.state, user_name);
        let player = match resolved {
            Ok(player) => player,
            Err(err) => return self.reject(None, err),
        };

        let mut working = self.state.clone();
        let mut scratch = self.log.continuation();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(&mut working, &mut scratch, player, &action)
        }))
        .unwrap_or_else(|payload| {
            Err(GameError::Unknown {
                details: panic_message(payload.as_ref()),
            })
        });

        match outcome {
            Ok(()) => {
                self.state = working;
                if let Err(err) = self.request_next_action(&mut scratch) {
                    return self.reject(Some(player), err);
                }
                let entries = self.log.append(scratch).to_vec();
                ActionResponse::accepted(entries)
            }
            Err(err) => self.reject(Some(player), err),
        }
    }

    fn run(
        &self,
        state: &mut GameState,
        log: &mut GameLog,
        player: PlayerIndex,
        action: &Action,
    ) -> GameResult<()> {
        let action_type = action.action_type();
        match &state.status {
            GameStatus::InProgress => {}
            GameStatus::Finished { .. } => {
                return Err(GameError::wrong_phase(action_type.name(), "the game is over"))
            }
            GameStatus::Halted { details } => {
                return Err(GameError::wrong_phase(
                    action_type.name(),
                    format!("the game was halted: {details}"),
                ))
            }
        }

        let query = self.query();
        query.validate_state(state)?;

        let allowed = query.possible_actions(state, player);
        if !allowed.contains(&action_type) {
            let active = query.active_player(state);
            if player != active && state.is_live(player) {
                return Err(GameError::not_players_turn(
                    query.active_user_name(state)?,
                    state.player(player)?.user_name.as_str(),
                ));
            }
            return Err(GameError::wrong_phase(
                action_type.name(),
                format!(
                    "legal actions are [{}]",
                    allowed.iter().map(|a| a.name()).collect::<Vec<_>>().join(", ")
                ),
            ));
        }

        state.apply_action(log, &query, self.random.as_ref(), player, action)?;
        query.validate_state(state)
    }

    fn request_next_action(&self, log: &mut GameLog) -> GameResult<()> {
        if !self.state.is_in_progress() {
            return Ok(());
        }
        let query = self.query();
        let active = query.active_player(&self.state);
        let user_name = query.active_user_name(&self.state)?;
        log.create_action_request(
            active,
            user_name,
            query.possible_actions(&self.state, active),
        );
        Ok(())
    }

    /// Records a rejection as exactly one error entry.
    fn reject(&mut self, player: Option<PlayerIndex>, err: GameError) -> ActionResponse {
        if err.kind().is_fatal() {
            log::error!("💥 Game {} halted: {}", self.id, err);
            self.state.status = GameStatus::Halted {
                details: err.to_string(),
            };
        } else {
            log::warn!("⚠️ Game {} rejected action: {}", self.id, err);
        }
        let detail = ErrorDetail::from(&err);
        let entry: LogEntry = self.log.create_error(player, detail.clone()).clone();
        ActionResponse::rejected(detail, entry)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{BusinessCenterSwapOptions, RollDiceOptions, TvStationPayoutOptions};
    use crate::catalog::base;
    use crate::errors::ErrorKind;
    use crate::random::ReplayRandomSource;
    use crate::state::tests::give_building;
    use crate::state::TurnPhase;

    fn new_game(players: usize) -> (Game, Arc<ReplayRandomSource>) {
        let random = Arc::new(ReplayRandomSource::default());
        let seats = ["alice", "bob", "carol", "dave"]
            .iter()
            .take(players)
            .map(|name| PlayerSeat::new(name.to_uppercase(), *name))
            .collect();
        let game = Game::new(
            "test-game",
            Arc::new(Catalog::base()),
            random.clone(),
            GameConfiguration::default(),
            seats,
        )
        .unwrap();
        (game, random)
    }

    fn roll(dice_count: u8) -> Action {
        Action::RollDice(RollDiceOptions {
            dice_count,
            auto_commit: true,
        })
    }

    #[test]
    fn test_new_game_logs_start_and_first_request() {
        let (game, _) = new_game(3);
        let entries = game.log().entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(
            entries[0].change(),
            Some(StateChange::GameStarted { .. })
        ));
        match &entries[1] {
            LogEntry::ActionRequest {
                user_name, actions, ..
            } => {
                assert_eq!(user_name, "alice");
                assert_eq!(actions, &vec![ActionType::RollDice, ActionType::Forfeit]);
            }
            other => panic!("expected an action request, got {other:?}"),
        }
    }

    #[test]
    fn test_accepted_action_returns_new_entries() {
        let (mut game, random) = new_game(2);
        random.push(1);
        let response = game.submit_action(roll(1), "alice");
        assert!(response.accepted);
        assert!(response.error.is_none());
        assert!(matches!(
            response.log_entries.last(),
            Some(LogEntry::ActionRequest { .. })
        ));
        assert_eq!(response.log_entries[0].sequence(), 2);
        assert_eq!(game.state().players[0].coins, 4);
        assert_eq!(game.state().players[1].coins, 4);
    }

    #[test]
    fn test_unknown_user_is_rejected_without_mutation() {
        let (mut game, _) = new_game(2);
        let before = game.state().clone();
        let response = game.submit_action(roll(1), "mallory");
        assert!(!response.accepted);
        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::PlayerUserNameNotFound);
        assert!(!error.retryable);
        assert_eq!(game.state(), &before);
        assert_eq!(game.log().len(), 3);
    }

    #[test]
    fn test_undecodable_payloads_are_rejected_with_one_error_entry() {
        let (mut game, random) = new_game(2);
        let before = game.state().clone();

        let response = game.submit_raw(serde_json::json!({"type": "StealEverything"}), "alice");
        assert!(!response.accepted);
        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::UnknownAction);
        assert!(error.retryable);
        assert_eq!(response.log_entries.len(), 1);
        assert!(matches!(
            response.log_entries[0],
            LogEntry::Error { player: Some(0), .. }
        ));
        assert_eq!(game.log().len(), 3);

        let response = game.submit_raw(
            serde_json::json!({"type": "BuildBuilding", "options": {}}),
            "alice",
        );
        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidActionOptions);
        assert!(error.retryable);
        assert_eq!(game.log().len(), 4);
        assert_eq!(game.state(), &before);
        assert!(game.state().is_in_progress());

        random.push(1);
        let response = game.submit_raw(
            serde_json::json!({"type": "RollDice", "options": {"dice_count": 1, "auto_commit": true}}),
            "alice",
        );
        assert!(response.accepted);
    }

    #[test]
    fn test_out_of_turn_action_is_retryable() {
        let (mut game, _) = new_game(2);
        let response = game.submit_action(roll(1), "bob");
        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::NotPlayersTurn);
        assert!(error.retryable);
        assert_eq!(game.status(), &GameStatus::InProgress);
    }

    #[test]
    fn test_unaffordable_build_leaves_state_untouched() {
        let (mut game, random) = new_game(2);
        random.push(5);
        assert!(game.submit_action(roll(1), "alice").accepted);
        let before = game.state().clone();
        let log_len = game.log().len();

        let response = game.submit_action(Action::build(base::MINE), "alice");

        assert!(!response.accepted);
        assert_eq!(
            response.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::InvalidActionOptions)
        );
        assert_eq!(game.state(), &before);
        assert_eq!(game.log().len(), log_len + 1);
        assert!(matches!(game.log().last(), Some(LogEntry::Error { .. })));
        assert_eq!(response.log_entries.len(), 1);
    }

    #[test]
    fn test_build_round_trip() {
        let (mut game, random) = new_game(2);
        random.push(5);
        game.submit_action(roll(1), "alice");
        let response = game.submit_action(Action::build(base::RANCH), "alice");
        assert!(response.accepted);
        let alice = &game.state().players[0];
        assert_eq!(alice.coins, 2);
        assert_eq!(alice.buildings[base::RANCH], 1);
        assert_eq!(game.state().marketplace.available(base::RANCH), 5);
        assert_eq!(
            game.possible_actions("alice").unwrap(),
            vec![ActionType::EndTurn, ActionType::Forfeit]
        );
    }

    #[test]
    fn test_pending_activations_resolve_in_fifo_order() {
        let (mut game, random) = new_game(3);
        give_building(&mut game.state, 0, base::TV_STATION, 1);
        give_building(&mut game.state, 0, base::BUSINESS_CENTER, 1);
        give_building(&mut game.state, 2, base::MINE, 1);
        random.push(6);

        assert!(game.submit_action(roll(1), "alice").accepted);
        assert_eq!(
            game.possible_actions("alice").unwrap(),
            vec![ActionType::TvStationPayout, ActionType::Forfeit]
        );

        let response = game.submit_action(Action::EndTurn, "alice");
        assert_eq!(
            response.error.map(|e| e.kind),
            Some(ErrorKind::InvalidStateToTakeAction)
        );
        let response = game.submit_action(
            Action::BusinessCenterSwap(BusinessCenterSwapOptions::skip()),
            "alice",
        );
        assert_eq!(
            response.error.map(|e| e.kind),
            Some(ErrorKind::InvalidStateToTakeAction)
        );

        let response = game.submit_action(
            Action::TvStationPayout(TvStationPayoutOptions {
                target_player_index: 0,
            }),
            "alice",
        );
        assert_eq!(
            response.error.map(|e| e.kind),
            Some(ErrorKind::ActionCantBeTakenOnSelf)
        );

        assert!(game
            .submit_action(
                Action::TvStationPayout(TvStationPayoutOptions {
                    target_player_index: 1,
                }),
                "alice",
            )
            .accepted);
        assert_eq!(
            game.possible_actions("alice").unwrap(),
            vec![ActionType::BusinessCenterSwap, ActionType::Forfeit]
        );

        assert!(game
            .submit_action(
                Action::BusinessCenterSwap(BusinessCenterSwapOptions {
                    target_player_index: 2,
                    building_index_give: base::WHEAT_FIELD,
                    building_index_take: base::MINE,
                    skip: false,
                }),
                "alice",
            )
            .accepted);
        assert_eq!(game.state().players[0].buildings[base::MINE], 1);
        assert!(game
            .possible_actions("alice")
            .unwrap()
            .contains(&ActionType::EndTurn));
        assert!(game.submit_action(Action::EndTurn, "alice").accepted);
        assert_eq!(game.active_user_name(), Some("bob"));
    }

    #[test]
    fn test_corrupted_state_halts_the_game() {
        let (mut game, _) = new_game(2);
        game.state.players[1].buildings.pop();
        let log_len = game.log().len();

        let response = game.submit_action(roll(1), "alice");

        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidState);
        assert!(!error.retryable);
        assert!(matches!(game.status(), GameStatus::Halted { .. }));
        assert_eq!(game.log().len(), log_len + 1);

        let response = game.submit_action(Action::Forfeit, "bob");
        assert_eq!(
            response.error.map(|e| e.kind),
            Some(ErrorKind::InvalidStateToTakeAction)
        );
    }

    struct JammedDice;

    impl RandomSource for JammedDice {
        fn int_in_range(&self, _min: u32, _max: u32) -> u32 {
            panic!("dice jammed");
        }
    }

    #[test]
    fn test_panic_is_reported_as_unknown() {
        let seats = vec![PlayerSeat::new("A", "a"), PlayerSeat::new("B", "b")];
        let mut game = Game::new(
            "jammed",
            Arc::new(Catalog::base()),
            Arc::new(JammedDice),
            GameConfiguration::default(),
            seats,
        )
        .unwrap();
        let before = game.state().turn.clone();

        let response = game.submit_action(roll(1), "a");

        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(error.message.contains("dice jammed"));
        assert_eq!(game.state().turn, before);
        assert!(matches!(game.status(), GameStatus::Halted { .. }));
    }

    #[test]
    fn test_forfeit_down_to_one_player_ends_game() {
        let (mut game, _) = new_game(3);
        assert!(game.submit_action(Action::Forfeit, "carol").accepted);
        assert!(game.submit_action(Action::Forfeit, "alice").accepted);
        assert_eq!(game.status(), &GameStatus::Finished { winner: 1 });
        assert!(game.is_over());
        assert_eq!(game.state().turn.phase, TurnPhase::TurnEnded);
        assert_eq!(game.active_user_name(), None);

        let response = game.submit_action(Action::Forfeit, "bob");
        assert_eq!(
            response.error.map(|e| e.kind),
            Some(ErrorKind::InvalidStateToTakeAction)
        );
    }
}
