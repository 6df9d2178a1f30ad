//! Mutable game ledger: players, balances, ownership, turn and marketplace.
//!
//! Mutations happen in [`move_application`]. The helpers here only keep the
//! arithmetic honest (no debt, no negative ownership) and report violations as
//! `InvalidState`, since callers are expected to validate first.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Supply};
use crate::enums::{
    ActionType, BuildingIndex, GameConfiguration, GameMode, PlayerIndex, MAX_PLAYERS, MIN_PLAYERS,
};
use crate::errors::{GameError, GameResult};
use crate::random::{shuffle, RandomSource};

pub mod move_application;

/// A seat requested at game creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSeat {
    pub name: String,
    pub user_name: String,
}

impl PlayerSeat {
    pub fn new(name: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_name: user_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Playing,
    Forfeited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub user_name: String,
    pub coins: u32,
    /// Owned count per catalog index.
    pub buildings: Vec<u32>,
    pub status: PlayerStatus,
}

impl Player {
    pub fn is_live(&self) -> bool {
        self.status == PlayerStatus::Playing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub dice: Vec<u32>,
}

impl DiceRoll {
    pub fn total(&self) -> u32 {
        self.dice.iter().sum()
    }

    pub fn is_doubles(&self) -> bool {
        self.dice.len() == 2 && self.dice[0] == self.dice[1]
    }
}

/// A decision-pending activation waiting in the turn queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingActivation {
    pub player: PlayerIndex,
    pub building: BuildingIndex,
    pub required_action: ActionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase")]
pub enum TurnPhase {
    AwaitingFirstRoll,
    AwaitingRollOrCommit {
        roll: DiceRoll,
    },
    /// Dice committed, decisions outstanding. The queue is never empty here.
    ResolvingActivations {
        roll: DiceRoll,
        pending: VecDeque<PendingActivation>,
    },
    AwaitingBuildOrEnd {
        roll: DiceRoll,
        built: bool,
    },
    /// Terminal phase once the game is over.
    TurnEnded,
}

impl TurnPhase {
    pub fn pending(&self) -> Option<&VecDeque<PendingActivation>> {
        match self {
            TurnPhase::ResolvingActivations { pending, .. } => Some(pending),
            _ => None,
        }
    }

    pub fn roll(&self) -> Option<&DiceRoll> {
        match self {
            TurnPhase::AwaitingRollOrCommit { roll }
            | TurnPhase::ResolvingActivations { roll, .. }
            | TurnPhase::AwaitingBuildOrEnd { roll, .. } => Some(roll),
            TurnPhase::AwaitingFirstRoll | TurnPhase::TurnEnded => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub active_player: PlayerIndex,
    /// Starts at 1; increments when turn order wraps.
    pub round: u32,
    /// Turns taken so far, extra turns included.
    pub turn_number: u64,
    pub rolls_taken: u32,
    /// Set on commit when the Amusement Park rule grants another turn.
    pub extra_turn: bool,
    pub phase: TurnPhase,
}

impl TurnState {
    fn first(active_player: PlayerIndex) -> Self {
        Self {
            active_player,
            round: 1,
            turn_number: 1,
            rolls_taken: 0,
            extra_turn: false,
            phase: TurnPhase::AwaitingFirstRoll,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marketplace {
    /// Remaining supply per catalog index.
    pub available: Vec<u32>,
}

impl Marketplace {
    pub fn new(catalog: &Catalog, num_players: usize) -> Self {
        let available = catalog
            .iter()
            .map(|(_, def)| match def.supply {
                Supply::Fixed(count) => count,
                Supply::OnePerPlayer => u32::try_from(num_players).unwrap_or(u32::MAX),
            })
            .collect();
        Self { available }
    }

    pub fn available(&self, building: BuildingIndex) -> u32 {
        self.available.get(building).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum GameStatus {
    InProgress,
    Finished { winner: PlayerIndex },
    /// The engine hit a fatal error; no further actions are accepted.
    Halted { details: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub players: Vec<Player>,
    pub turn: TurnState,
    pub marketplace: Marketplace,
    pub mode: GameMode,
    pub status: GameStatus,
}

impl GameState {
    /// Seats the players and deals the starting position.
    pub fn new(
        catalog: &Catalog,
        config: &GameConfiguration,
        mut seats: Vec<PlayerSeat>,
        random: &dyn RandomSource,
    ) -> GameResult<Self> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&seats.len()) {
            return Err(GameError::invalid_options(format!(
                "a game needs {MIN_PLAYERS} to {MAX_PLAYERS} players, got {}",
                seats.len()
            )));
        }
        let mut seen = HashSet::new();
        for seat in &seats {
            if seat.user_name.is_empty() {
                return Err(GameError::invalid_options("user name must not be empty"));
            }
            if !seen.insert(seat.user_name.as_str()) {
                return Err(GameError::invalid_options(format!(
                    "duplicate user name {}",
                    seat.user_name
                )));
            }
        }
        if config.shuffle_turn_order {
            shuffle(random, &mut seats);
        }

        let starting: Vec<u32> = catalog.iter().map(|(_, def)| def.starting_count).collect();
        let players = seats
            .into_iter()
            .map(|seat| Player {
                name: seat.name,
                user_name: seat.user_name,
                coins: config.starting_coins,
                buildings: starting.clone(),
                status: PlayerStatus::Playing,
            })
            .collect::<Vec<_>>();
        let marketplace = Marketplace::new(catalog, players.len());

        Ok(Self {
            players,
            turn: TurnState::first(0),
            marketplace,
            mode: config.mode,
            status: GameStatus::InProgress,
        })
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == GameStatus::InProgress
    }

    pub fn winner(&self) -> Option<PlayerIndex> {
        match self.status {
            GameStatus::Finished { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn player(&self, index: PlayerIndex) -> GameResult<&Player> {
        self.players
            .get(index)
            .ok_or_else(|| GameError::invalid_state(format!("no player at seat {index}")))
    }

    fn player_mut(&mut self, index: PlayerIndex) -> GameResult<&mut Player> {
        self.players
            .get_mut(index)
            .ok_or_else(|| GameError::invalid_state(format!("no player at seat {index}")))
    }

    pub fn player_name(&self, index: PlayerIndex) -> GameResult<&str> {
        Ok(self.player(index)?.name.as_str())
    }

    pub fn is_live(&self, index: PlayerIndex) -> bool {
        self.players.get(index).is_some_and(Player::is_live)
    }

    pub fn live_player_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_live()).count()
    }

    /// Seats after `from` in turn order, wrapping, excluding `from` itself.
    pub fn seats_after(&self, from: PlayerIndex) -> impl Iterator<Item = PlayerIndex> + '_ {
        let n = self.players.len();
        (1..n).map(move |offset| (from + offset) % n)
    }

    pub fn next_live_after(&self, from: PlayerIndex) -> Option<PlayerIndex> {
        self.seats_after(from).find(|&seat| self.is_live(seat))
    }

    pub fn credit(&mut self, index: PlayerIndex, amount: u32) -> GameResult<()> {
        let player = self.player_mut(index)?;
        player.coins = player.coins.checked_add(amount).ok_or_else(|| {
            GameError::invalid_state(format!("coin overflow crediting seat {index}"))
        })?;
        Ok(())
    }

    pub fn debit(&mut self, index: PlayerIndex, amount: u32) -> GameResult<()> {
        let player = self.player_mut(index)?;
        player.coins = player.coins.checked_sub(amount).ok_or_else(|| {
            GameError::invalid_state(format!(
                "seat {index} can't pay {amount} with {} coins",
                player.coins
            ))
        })?;
        Ok(())
    }

    pub fn owned_count(&self, index: PlayerIndex, building: BuildingIndex) -> GameResult<u32> {
        self.player(index)?
            .buildings
            .get(building)
            .copied()
            .ok_or_else(|| {
                GameError::invalid_state(format!("building {building} missing from ownership"))
            })
    }

    pub fn add_building(&mut self, index: PlayerIndex, building: BuildingIndex) -> GameResult<()> {
        let count = self.ownership_slot(index, building)?;
        *count += 1;
        Ok(())
    }

    pub fn remove_building(
        &mut self,
        index: PlayerIndex,
        building: BuildingIndex,
    ) -> GameResult<()> {
        let count = self.ownership_slot(index, building)?;
        *count = count.checked_sub(1).ok_or_else(|| {
            GameError::invalid_state(format!("seat {index} owns no building {building}"))
        })?;
        Ok(())
    }

    fn ownership_slot(
        &mut self,
        index: PlayerIndex,
        building: BuildingIndex,
    ) -> GameResult<&mut u32> {
        self.player_mut(index)?
            .buildings
            .get_mut(building)
            .ok_or_else(|| {
                GameError::invalid_state(format!("building {building} missing from ownership"))
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::base;
    use crate::random::ReplayRandomSource;

    /// In-progress state with `n` seats `Player0..` / `p0..`, seat 0 to roll.
    pub(crate) fn fixture_state(catalog: &Catalog, n: usize) -> GameState {
        let seats = (0..n)
            .map(|i| PlayerSeat::new(format!("Player{i}"), format!("p{i}")))
            .collect();
        GameState::new(
            catalog,
            &GameConfiguration::default(),
            seats,
            &ReplayRandomSource::default(),
        )
        .unwrap()
    }

    /// Hands `count` copies to `player` out of the marketplace.
    pub(crate) fn give_building(
        state: &mut GameState,
        player: PlayerIndex,
        building: BuildingIndex,
        count: u32,
    ) {
        state.players[player].buildings[building] += count;
        state.marketplace.available[building] -= count;
    }

    #[test]
    fn test_new_deals_starting_position() {
        let catalog = Catalog::base();
        let state = fixture_state(&catalog, 3);
        assert_eq!(state.players.len(), 3);
        for player in &state.players {
            assert_eq!(player.coins, 3);
            assert_eq!(player.buildings.len(), catalog.count());
            assert_eq!(player.buildings[base::WHEAT_FIELD], 1);
            assert_eq!(player.buildings[base::BAKERY], 1);
            assert_eq!(player.buildings.iter().sum::<u32>(), 2);
        }
        assert_eq!(state.marketplace.available(base::CAFE), 6);
        assert_eq!(state.marketplace.available(base::STADIUM), 3);
        assert_eq!(state.marketplace.available(base::RADIO_TOWER), 3);
        assert_eq!(state.turn.phase, TurnPhase::AwaitingFirstRoll);
        assert_eq!(state.turn.round, 1);
    }

    #[test]
    fn test_new_rejects_bad_seating() {
        let catalog = Catalog::base();
        let random = ReplayRandomSource::default();
        let config = GameConfiguration::default();

        let one = vec![PlayerSeat::new("A", "a")];
        assert!(GameState::new(&catalog, &config, one, &random).is_err());

        let five = (0..5)
            .map(|i| PlayerSeat::new(format!("P{i}"), format!("u{i}")))
            .collect();
        assert!(GameState::new(&catalog, &config, five, &random).is_err());

        let duplicate = vec![PlayerSeat::new("A", "same"), PlayerSeat::new("B", "same")];
        assert!(GameState::new(&catalog, &config, duplicate, &random).is_err());
    }

    #[test]
    fn test_shuffle_turn_order_uses_random_source() {
        let catalog = Catalog::base();
        // Fisher-Yates on 3 seats draws j for i=2 then i=1.
        let random = ReplayRandomSource::new([0, 0]);
        let config = GameConfiguration {
            shuffle_turn_order: true,
            ..GameConfiguration::default()
        };
        let seats = vec![
            PlayerSeat::new("A", "a"),
            PlayerSeat::new("B", "b"),
            PlayerSeat::new("C", "c"),
        ];
        let state = GameState::new(&catalog, &config, seats, &random).unwrap();
        let order: Vec<&str> = state.players.iter().map(|p| p.user_name.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_debit_never_goes_negative() {
        let catalog = Catalog::base();
        let mut state = fixture_state(&catalog, 2);
        assert!(state.debit(0, 4).is_err());
        assert_eq!(state.players[0].coins, 3);
        state.debit(0, 3).unwrap();
        assert_eq!(state.players[0].coins, 0);
    }

    #[test]
    fn test_next_live_after_skips_forfeited() {
        let catalog = Catalog::base();
        let mut state = fixture_state(&catalog, 4);
        state.players[1].status = PlayerStatus::Forfeited;
        assert_eq!(state.next_live_after(0), Some(2));
        assert_eq!(state.next_live_after(3), Some(0));
        assert_eq!(state.seats_after(2).collect::<Vec<_>>(), vec![3, 0, 1]);
    }
}
