use crate::actions::{
    Action, BuildBuildingOptions, BusinessCenterSwapOptions, RollDiceOptions,
    TvStationPayoutOptions,
};
use crate::catalog::Catalog;
use crate::enums::{ActionType, PlayerIndex};
use crate::query::StateQuery;
use crate::random::RandomSource;
use crate::state::{GameState, TurnPhase};

use super::random::swap_candidates;
use super::BotPlayer;

/// One-ply heuristic player.
///
/// Always throws every die it may, re-rolls a total that pays it nothing,
/// builds the priciest thing it can afford (landmarks first on ties), and
/// aims targeted effects at the richest opponent.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPlayer;

impl GreedyPlayer {
    fn roll_pays_me(state: &GameState, catalog: &Catalog, me: PlayerIndex) -> bool {
        let Some(roll) = state.turn.phase.roll() else {
            return false;
        };
        let total = roll.total();
        catalog.iter().any(|(index, def)| {
            def.activation_range.contains(total)
                && state.owned_count(me, index).unwrap_or(0) > 0
        })
    }

    fn richest(state: &GameState, opponents: &[PlayerIndex]) -> Option<PlayerIndex> {
        opponents
            .iter()
            .copied()
            .max_by_key(|&seat| (state.players[seat].coins, std::cmp::Reverse(seat)))
    }
}

impl BotPlayer for GreedyPlayer {
    fn decide(
        &self,
        state: &GameState,
        catalog: &Catalog,
        me: PlayerIndex,
        playable: &[ActionType],
        _random: &dyn RandomSource,
    ) -> Action {
        let query = StateQuery::new(catalog);
        let can = |action: ActionType| playable.contains(&action);

        if can(ActionType::TvStationPayout) {
            let opponents = query.live_opponents(state, me);
            return Action::TvStationPayout(TvStationPayoutOptions {
                target_player_index: Self::richest(state, &opponents).unwrap_or(me),
            });
        }

        if can(ActionType::BusinessCenterSwap) {
            let cost = |building| catalog.get(building).map(|def| def.cost).unwrap_or(0);
            let best = swap_candidates(state, &query, me)
                .into_iter()
                .filter(|&(_, give, take)| cost(take) > cost(give))
                .max_by_key(|&(_, give, take)| cost(take) - cost(give));
            return Action::BusinessCenterSwap(match best {
                Some((target, give, take)) => BusinessCenterSwapOptions {
                    target_player_index: target,
                    building_index_give: give,
                    building_index_take: take,
                    skip: false,
                },
                None => BusinessCenterSwapOptions::skip(),
            });
        }

        if can(ActionType::RollDice) {
            let rerolling = matches!(state.turn.phase, TurnPhase::AwaitingRollOrCommit { .. });
            if !rerolling || !Self::roll_pays_me(state, catalog, me) {
                let dice_count = u8::try_from(query.dice_allowance(state, me)).unwrap_or(1);
                return Action::RollDice(RollDiceOptions {
                    dice_count,
                    auto_commit: false,
                });
            }
        }

        if can(ActionType::CommitDiceResult) {
            return Action::CommitDiceResult;
        }

        if can(ActionType::BuildBuilding) {
            let choice = query.buildable(state, me).into_iter().max_by_key(|&building| {
                catalog
                    .get(building)
                    .map(|def| (def.cost, def.is_landmark()))
                    .unwrap_or((0, false))
            });
            if let Some(building_index) = choice {
                return Action::BuildBuilding(BuildBuildingOptions {
                    building_index,
                    auto_end_turn: true,
                });
            }
        }

        if can(ActionType::EndTurn) {
            return Action::EndTurn;
        }
        Action::Forfeit
    }

    fn name(&self) -> &str {
        "greedy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::base;
    use crate::random::ReplayRandomSource;
    use crate::state::tests::{fixture_state, give_building};
    use crate::state::DiceRoll;

    #[test]
    fn test_greedy_builds_most_expensive_affordable() {
        let catalog = Catalog::base();
        let mut state = fixture_state(&catalog, 2);
        state.players[0].coins = 5;
        state.turn.rolls_taken = 1;
        state.turn.phase = TurnPhase::AwaitingBuildOrEnd {
            roll: DiceRoll { dice: vec![3] },
            built: false,
        };
        let action = GreedyPlayer.decide(
            &state,
            &catalog,
            0,
            &[ActionType::BuildBuilding, ActionType::EndTurn, ActionType::Forfeit],
            &ReplayRandomSource::default(),
        );
        let Action::BuildBuilding(options) = action else {
            panic!("expected a build, got {action:?}");
        };
        assert_eq!(catalog.get(options.building_index).unwrap().cost, 5);
    }

    #[test]
    fn test_greedy_targets_richest_opponent() {
        let catalog = Catalog::base();
        let mut state = fixture_state(&catalog, 3);
        give_building(&mut state, 0, base::TV_STATION, 1);
        state.players[1].coins = 2;
        state.players[2].coins = 9;
        let action = GreedyPlayer.decide(
            &state,
            &catalog,
            0,
            &[ActionType::TvStationPayout, ActionType::Forfeit],
            &ReplayRandomSource::default(),
        );
        assert_eq!(
            action,
            Action::TvStationPayout(TvStationPayoutOptions {
                target_player_index: 2
            })
        );
    }

    #[test]
    fn test_greedy_commits_a_paying_roll() {
        let catalog = Catalog::base();
        let mut state = fixture_state(&catalog, 2);
        state.turn.rolls_taken = 1;
        state.turn.phase = TurnPhase::AwaitingRollOrCommit {
            roll: DiceRoll { dice: vec![1] },
        };
        let action = GreedyPlayer.decide(
            &state,
            &catalog,
            0,
            &[
                ActionType::RollDice,
                ActionType::CommitDiceResult,
                ActionType::Forfeit,
            ],
            &ReplayRandomSource::default(),
        );
        assert_eq!(action, Action::CommitDiceResult);
    }
}
