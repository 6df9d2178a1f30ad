//! Read-only derived facts over [`GameState`].
//!
//! Everything is recomputed from the state on each call; the state mutates on
//! every action so nothing here is cached. The state machine consults
//! [`StateQuery::possible_actions`] as the single authority on legality.

use crate::activation::LandmarkRule;
use crate::catalog::{BuildingDefinition, Catalog};
use crate::enums::{
    ActionType, BuildingIndex, PlayerIndex, ProductionCategory, DIE_FACES,
    MIN_PLAYERS,
};
use crate::errors::{GameError, GameResult};
use crate::state::{GameState, GameStatus, TurnPhase};

#[derive(Debug, Clone, Copy)]
pub struct StateQuery<'c> {
    catalog: &'c Catalog,
}

impl<'c> StateQuery<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn definition(&self, building: BuildingIndex) -> GameResult<&'c BuildingDefinition> {
        Ok(self.catalog.get(building)?)
    }

    pub fn building_name(&self, building: BuildingIndex) -> GameResult<&'c str> {
        Ok(self.definition(building)?.name.as_str())
    }

    pub fn player_index(&self, state: &GameState, user_name: &str) -> GameResult<PlayerIndex> {
        state
            .players
            .iter()
            .position(|p| p.user_name == user_name)
            .ok_or_else(|| GameError::PlayerUserNameNotFound {
                user_name: user_name.to_string(),
            })
    }

    pub fn active_player(&self, state: &GameState) -> PlayerIndex {
        state.turn.active_player
    }

    pub fn active_user_name<'s>(&self, state: &'s GameState) -> GameResult<&'s str> {
        Ok(state.player(state.turn.active_player)?.user_name.as_str())
    }

    /// Legal action types for `player`, in precedence order:
    /// queue head, then roll/commit, then build/end. Forfeit is always last.
    pub fn possible_actions(&self, state: &GameState, player: PlayerIndex) -> Vec<ActionType> {
        if !state.is_in_progress() || !state.is_live(player) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if player == state.turn.active_player {
            match &state.turn.phase {
                TurnPhase::ResolvingActivations { pending, .. } => {
                    if let Some(head) = pending.front() {
                        actions.push(head.required_action);
                    }
                }
                TurnPhase::AwaitingFirstRoll => actions.push(ActionType::RollDice),
                TurnPhase::AwaitingRollOrCommit { .. } => {
                    if state.turn.rolls_taken < self.roll_allowance(state, player) {
                        actions.push(ActionType::RollDice);
                    }
                    actions.push(ActionType::CommitDiceResult);
                }
                TurnPhase::AwaitingBuildOrEnd { built, .. } => {
                    if !built && self.can_afford_any(state, player) {
                        actions.push(ActionType::BuildBuilding);
                    }
                    actions.push(ActionType::EndTurn);
                }
                TurnPhase::TurnEnded => {}
            }
        }
        actions.push(ActionType::Forfeit);
        actions
    }

    /// Number of dice `player` may throw.
    pub fn dice_allowance(&self, state: &GameState, player: PlayerIndex) -> u32 {
        if self.owns_rule(state, player, LandmarkRule::TwoDice) {
            2
        } else {
            1
        }
    }

    /// Number of rolls `player` may take in one turn.
    pub fn roll_allowance(&self, state: &GameState, player: PlayerIndex) -> u32 {
        if self.owns_rule(state, player, LandmarkRule::ReRoll) {
            2
        } else {
            1
        }
    }

    pub fn owns_rule(&self, state: &GameState, player: PlayerIndex, rule: LandmarkRule) -> bool {
        self.catalog
            .landmark_with_rule(rule)
            .and_then(|index| state.owned_count(player, index).ok())
            .is_some_and(|count| count > 0)
    }

    pub fn owns_all_landmarks(&self, state: &GameState, player: PlayerIndex) -> bool {
        let mut landmarks = self.catalog.landmark_indices().peekable();
        if landmarks.peek().is_none() {
            return false;
        }
        landmarks.all(|index| state.owned_count(player, index).is_ok_and(|count| count > 0))
    }

    /// Whether `player` may build `building` right now, ignoring phase.
    pub fn check_buildable(
        &self,
        state: &GameState,
        player: PlayerIndex,
        building: BuildingIndex,
    ) -> GameResult<()> {
        let def = self.definition(building)?;
        let owner = state.player(player)?;
        if state.marketplace.available(building) == 0 {
            return Err(GameError::invalid_options(format!(
                "{} is sold out",
                def.name
            )));
        }
        if owner.coins < def.cost {
            return Err(GameError::invalid_options(format!(
                "{} costs {} but {} has {} coins",
                def.name, def.cost, owner.name, owner.coins
            )));
        }
        if let Some(limit) = def.per_player_limit {
            if state.owned_count(player, building)? >= limit {
                return Err(GameError::invalid_options(format!(
                    "{} already owns the maximum of {limit} {}",
                    owner.name, def.name
                )));
            }
        }
        Ok(())
    }

    pub fn buildable(&self, state: &GameState, player: PlayerIndex) -> Vec<BuildingIndex> {
        (0..self.catalog.count())
            .filter(|&building| self.check_buildable(state, player, building).is_ok())
            .collect()
    }

    pub fn can_afford_any(&self, state: &GameState, player: PlayerIndex) -> bool {
        (0..self.catalog.count()).any(|building| self.check_buildable(state, player, building).is_ok())
    }

    /// Shopping Mall: the owner holds the mall and the building makes Bread or Cup.
    pub fn mall_bonus_applies(
        &self,
        state: &GameState,
        player: PlayerIndex,
        building: BuildingIndex,
    ) -> GameResult<bool> {
        let def = self.definition(building)?;
        Ok(def.category.is_mall_boosted()
            && self.owns_rule(state, player, LandmarkRule::ShoppingMall))
    }

    /// `min(requested, balance)`: what a capped transfer can take from `target`.
    pub fn max_takeable(
        &self,
        state: &GameState,
        target: PlayerIndex,
        requested: u32,
    ) -> GameResult<u32> {
        Ok(requested.min(state.player(target)?.coins))
    }

    pub fn count_in_category(
        &self,
        state: &GameState,
        player: PlayerIndex,
        category: ProductionCategory,
    ) -> GameResult<u32> {
        let owner = state.player(player)?;
        Ok(self
            .catalog
            .iter()
            .filter(|(_, def)| def.category == category)
            .map(|(index, _)| owner.buildings.get(index).copied().unwrap_or(0))
            .sum())
    }

    /// Live opponents of `player`, in turn order after them.
    pub fn live_opponents(&self, state: &GameState, player: PlayerIndex) -> Vec<PlayerIndex> {
        state
            .seats_after(player)
            .filter(|&seat| state.is_live(seat))
            .collect()
    }

    /// Checks a player-chosen target seat for a targeted effect.
    pub fn ensure_live_target(
        &self,
        state: &GameState,
        player: PlayerIndex,
        target: PlayerIndex,
    ) -> GameResult<()> {
        if target >= state.players.len() {
            return Err(GameError::invalid_options(format!(
                "target seat {target} out of range (0..{})",
                state.players.len()
            )));
        }
        if target == player {
            return Err(GameError::on_self(format!(
                "seat {player} can't target themself"
            )));
        }
        if !state.is_live(target) {
            return Err(GameError::invalid_options(format!(
                "seat {target} has forfeited"
            )));
        }
        Ok(())
    }

    /// Landmarks and majors can never change hands.
    pub fn ensure_swappable(&self, building: BuildingIndex) -> GameResult<()> {
        let def = self.definition(building)?;
        if def.is_landmark() || def.is_major() {
            return Err(GameError::invalid_options(format!(
                "{} can't be traded",
                def.name
            )));
        }
        Ok(())
    }

    /// Structural checks run before and after every mutation.
    pub fn validate_state(&self, state: &GameState) -> GameResult<()> {
        let n = state.players.len();
        let count = self.catalog.count();
        if n < MIN_PLAYERS {
            return Err(GameError::invalid_state(format!("only {n} players seated")));
        }
        for (seat, player) in state.players.iter().enumerate() {
            if player.buildings.len() != count {
                return Err(GameError::invalid_state(format!(
                    "seat {seat} ownership has {} slots, catalog has {count}",
                    player.buildings.len()
                )));
            }
            for (index, def) in self.catalog.iter() {
                if let Some(limit) = def.per_player_limit {
                    if player.buildings[index] > limit {
                        return Err(GameError::invalid_state(format!(
                            "seat {seat} owns {} {} (limit {limit})",
                            player.buildings[index], def.name
                        )));
                    }
                }
            }
        }
        if state.marketplace.available.len() != count {
            return Err(GameError::invalid_state(
                "marketplace size differs from catalog",
            ));
        }
        for (index, def) in self.catalog.iter() {
            let owned: u32 = state.players.iter().map(|p| p.buildings[index]).sum();
            let total = owned.saturating_add(state.marketplace.available[index]);
            if total > def.per_game_limit(n) {
                return Err(GameError::invalid_state(format!(
                    "{} copies of {} exist, limit {}",
                    total,
                    def.name,
                    def.per_game_limit(n)
                )));
            }
        }

        let turn = &state.turn;
        if turn.active_player >= n {
            return Err(GameError::invalid_state(format!(
                "active seat {} out of range",
                turn.active_player
            )));
        }
        match &state.status {
            GameStatus::InProgress => {
                if !state.is_live(turn.active_player) {
                    return Err(GameError::invalid_state("active player has forfeited"));
                }
                if turn.phase == TurnPhase::TurnEnded {
                    return Err(GameError::invalid_state("game in progress but turn ended"));
                }
            }
            GameStatus::Finished { winner } => {
                if *winner >= n {
                    return Err(GameError::invalid_state(format!(
                        "winner seat {winner} out of range"
                    )));
                }
                return Ok(());
            }
            GameStatus::Halted { .. } => return Ok(()),
        }

        let dice_allowance = self.dice_allowance(state, turn.active_player);
        let roll_allowance = self.roll_allowance(state, turn.active_player);
        if turn.rolls_taken > roll_allowance {
            return Err(GameError::invalid_state(format!(
                "{} rolls taken, allowance {roll_allowance}",
                turn.rolls_taken
            )));
        }
        if (turn.phase == TurnPhase::AwaitingFirstRoll) != (turn.rolls_taken == 0) {
            return Err(GameError::invalid_state(
                "roll count inconsistent with turn phase",
            ));
        }
        if let Some(roll) = turn.phase.roll() {
            let dice = u32::try_from(roll.dice.len()).unwrap_or(u32::MAX);
            if dice == 0 || dice > dice_allowance {
                return Err(GameError::invalid_state(format!(
                    "{dice} dice rolled, allowance {dice_allowance}"
                )));
            }
            if roll.dice.iter().any(|&die| !(1..=DIE_FACES).contains(&die)) {
                return Err(GameError::invalid_state(format!(
                    "die value out of range in {:?}",
                    roll.dice
                )));
            }
        }
        if let Some(pending) = turn.phase.pending() {
            if pending.is_empty() {
                return Err(GameError::invalid_state(
                    "resolving activations with an empty queue",
                ));
            }
            for activation in pending {
                if activation.player != turn.active_player {
                    return Err(GameError::invalid_state(format!(
                        "queued activation belongs to seat {}, not the active seat",
                        activation.player
                    )));
                }
                let required = self
                    .definition(activation.building)
                    .map_err(|_| GameError::invalid_state("queued activation out of catalog"))?
                    .activation
                    .required_player_action();
                if required != Some(activation.required_action) {
                    return Err(GameError::invalid_state(format!(
                        "queued activation expects {:?}, building requires {:?}",
                        activation.required_action, required
                    )));
                }
            }
        }
        if turn.extra_turn
            && !matches!(
                turn.phase,
                TurnPhase::ResolvingActivations { .. } | TurnPhase::AwaitingBuildOrEnd { .. }
            )
        {
            return Err(GameError::invalid_state("extra turn flagged before commit"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::catalog::base;
    use crate::errors::ErrorKind;
    use crate::state::tests::fixture_state;
    use crate::state::{DiceRoll, PendingActivation, PlayerStatus};

    #[test]
    fn test_first_roll_offers_roll_and_forfeit() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let state = fixture_state(&catalog, 2);
        assert_eq!(
            query.possible_actions(&state, 0),
            vec![ActionType::RollDice, ActionType::Forfeit]
        );
        assert_eq!(query.possible_actions(&state, 1), vec![ActionType::Forfeit]);
    }

    #[test]
    fn test_radio_tower_allows_reroll() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let mut state = fixture_state(&catalog, 2);
        state.turn.rolls_taken = 1;
        state.turn.phase = TurnPhase::AwaitingRollOrCommit {
            roll: DiceRoll { dice: vec![4] },
        };
        assert_eq!(
            query.possible_actions(&state, 0),
            vec![ActionType::CommitDiceResult, ActionType::Forfeit]
        );

        state.players[0].buildings[base::RADIO_TOWER] = 1;
        assert_eq!(
            query.possible_actions(&state, 0),
            vec![
                ActionType::RollDice,
                ActionType::CommitDiceResult,
                ActionType::Forfeit
            ]
        );
    }

    #[test]
    fn test_queue_head_takes_precedence() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let mut state = fixture_state(&catalog, 2);
        state.turn.rolls_taken = 1;
        state.turn.phase = TurnPhase::ResolvingActivations {
            roll: DiceRoll { dice: vec![6] },
            pending: VecDeque::from(vec![
                PendingActivation {
                    player: 0,
                    building: base::TV_STATION,
                    required_action: ActionType::TvStationPayout,
                },
                PendingActivation {
                    player: 0,
                    building: base::BUSINESS_CENTER,
                    required_action: ActionType::BusinessCenterSwap,
                },
            ]),
        };
        assert_eq!(
            query.possible_actions(&state, 0),
            vec![ActionType::TvStationPayout, ActionType::Forfeit]
        );
    }

    #[test]
    fn test_build_offered_only_when_affordable() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let mut state = fixture_state(&catalog, 2);
        state.turn.rolls_taken = 1;
        state.turn.phase = TurnPhase::AwaitingBuildOrEnd {
            roll: DiceRoll { dice: vec![1] },
            built: false,
        };
        assert!(query
            .possible_actions(&state, 0)
            .contains(&ActionType::BuildBuilding));

        state.players[0].coins = 0;
        assert_eq!(
            query.possible_actions(&state, 0),
            vec![ActionType::EndTurn, ActionType::Forfeit]
        );
    }

    #[test]
    fn test_forfeited_player_has_no_actions() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let mut state = fixture_state(&catalog, 3);
        state.players[2].status = PlayerStatus::Forfeited;
        assert!(query.possible_actions(&state, 2).is_empty());
        assert_eq!(query.live_opponents(&state, 0), vec![1]);
    }

    #[test]
    fn test_check_buildable_reasons() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let mut state = fixture_state(&catalog, 2);

        let err = query.check_buildable(&state, 0, base::MINE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidActionOptions);

        state.players[0].coins = 100;
        state.players[0].buildings[base::STADIUM] = 1;
        assert!(query.check_buildable(&state, 0, base::STADIUM).is_err());
        assert!(query.check_buildable(&state, 0, base::TV_STATION).is_ok());

        state.marketplace.available[base::CAFE] = 0;
        assert!(query.check_buildable(&state, 0, base::CAFE).is_err());
        assert!(query.check_buildable(&state, 0, 99).is_err());
    }

    #[test]
    fn test_mall_bonus_and_takeable() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let mut state = fixture_state(&catalog, 2);
        assert!(!query.mall_bonus_applies(&state, 0, base::BAKERY).unwrap());
        state.players[0].buildings[base::SHOPPING_MALL] = 1;
        assert!(query.mall_bonus_applies(&state, 0, base::BAKERY).unwrap());
        assert!(query.mall_bonus_applies(&state, 0, base::CAFE).unwrap());
        assert!(!query.mall_bonus_applies(&state, 0, base::WHEAT_FIELD).unwrap());

        state.players[1].coins = 2;
        assert_eq!(query.max_takeable(&state, 1, 5).unwrap(), 2);
        assert_eq!(query.max_takeable(&state, 1, 1).unwrap(), 1);
    }

    #[test]
    fn test_owns_all_landmarks() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let mut state = fixture_state(&catalog, 2);
        for landmark in catalog.landmark_indices().take(3) {
            state.players[0].buildings[landmark] = 1;
        }
        assert!(!query.owns_all_landmarks(&state, 0));
        state.players[0].buildings[base::RADIO_TOWER] = 1;
        assert!(query.owns_all_landmarks(&state, 0));
    }

    #[test]
    fn test_validate_state_catches_broken_invariants() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let state = fixture_state(&catalog, 3);
        query.validate_state(&state).unwrap();

        let mut bad = state.clone();
        bad.players[1].buildings.pop();
        assert_eq!(
            query.validate_state(&bad).unwrap_err().kind(),
            ErrorKind::InvalidState
        );

        let mut bad = state.clone();
        bad.turn.active_player = 7;
        assert!(query.validate_state(&bad).is_err());

        let mut bad = state.clone();
        bad.turn.phase = TurnPhase::ResolvingActivations {
            roll: DiceRoll { dice: vec![6] },
            pending: VecDeque::new(),
        };
        bad.turn.rolls_taken = 1;
        assert!(query.validate_state(&bad).is_err());

        let mut bad = state.clone();
        bad.turn.rolls_taken = 1;
        bad.turn.phase = TurnPhase::AwaitingRollOrCommit {
            roll: DiceRoll { dice: vec![3, 3] },
        };
        assert!(query.validate_state(&bad).is_err());

        let mut bad = state;
        bad.marketplace.available[base::STADIUM] = 4;
        assert!(query.validate_state(&bad).is_err());
    }
}
