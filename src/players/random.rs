use itertools::iproduct;

use crate::actions::{
    Action, BuildBuildingOptions, BusinessCenterSwapOptions, RollDiceOptions,
    TvStationPayoutOptions,
};
use crate::catalog::Catalog;
use crate::enums::{ActionType, PlayerIndex};
use crate::query::StateQuery;
use crate::random::RandomSource;
use crate::state::GameState;

use super::{pick, BotPlayer};

/// Picks uniformly among the legal action types, never forfeiting while it
/// has any other choice, and fills in well-formed options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPlayer;

impl BotPlayer for RandomPlayer {
    fn decide(
        &self,
        state: &GameState,
        catalog: &Catalog,
        me: PlayerIndex,
        playable: &[ActionType],
        random: &dyn RandomSource,
    ) -> Action {
        let query = StateQuery::new(catalog);
        let choices: Vec<ActionType> = playable
            .iter()
            .copied()
            .filter(|action| *action != ActionType::Forfeit)
            .collect();
        let Some(&choice) = pick(&choices, random) else {
            return Action::Forfeit;
        };

        match choice {
            ActionType::RollDice => {
                let allowance = query.dice_allowance(state, me);
                Action::RollDice(RollDiceOptions {
                    dice_count: u8::try_from(random.int_in_range(1, allowance)).unwrap_or(1),
                    auto_commit: random.int_in_range(0, 1) == 1,
                })
            }
            ActionType::CommitDiceResult => Action::CommitDiceResult,
            ActionType::BuildBuilding => match pick(&query.buildable(state, me), random) {
                Some(&building_index) => Action::BuildBuilding(BuildBuildingOptions {
                    building_index,
                    auto_end_turn: random.int_in_range(0, 1) == 1,
                }),
                None => Action::EndTurn,
            },
            ActionType::TvStationPayout => {
                let opponents = query.live_opponents(state, me);
                let target = pick(&opponents, random).copied().unwrap_or(me);
                Action::TvStationPayout(TvStationPayoutOptions {
                    target_player_index: target,
                })
            }
            ActionType::BusinessCenterSwap => {
                let trades = swap_candidates(state, &query, me);
                match pick(&trades, random) {
                    Some(&(target, give, take)) => {
                        Action::BusinessCenterSwap(BusinessCenterSwapOptions {
                            target_player_index: target,
                            building_index_give: give,
                            building_index_take: take,
                            skip: false,
                        })
                    }
                    None => Action::BusinessCenterSwap(BusinessCenterSwapOptions::skip()),
                }
            }
            ActionType::EndTurn => Action::EndTurn,
            ActionType::Forfeit => Action::Forfeit,
        }
    }

    fn name(&self) -> &str {
        "random"
    }
}

/// Every legal `(target, give, take)` trade for `me`.
pub(crate) fn swap_candidates(
    state: &GameState,
    query: &StateQuery<'_>,
    me: PlayerIndex,
) -> Vec<(PlayerIndex, usize, usize)> {
    let tradeable = |player: PlayerIndex| -> Vec<usize> {
        (0..query.catalog().count())
            .filter(|&building| query.ensure_swappable(building).is_ok())
            .filter(|&building| state.owned_count(player, building).unwrap_or(0) > 0)
            .collect()
    };
    let mine = tradeable(me);
    query
        .live_opponents(state, me)
        .into_iter()
        .flat_map(|target| {
            let theirs = tradeable(target);
            iproduct!(mine.clone(), theirs)
                .map(move |(give, take)| (target, give, take))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::base;
    use crate::random::SeededRandomSource;
    use crate::state::tests::fixture_state;

    #[test]
    fn test_random_player_avoids_forfeit() {
        let catalog = Catalog::base();
        let state = fixture_state(&catalog, 2);
        let random = SeededRandomSource::new(3);
        for _ in 0..50 {
            let action = RandomPlayer.decide(
                &state,
                &catalog,
                0,
                &[ActionType::RollDice, ActionType::Forfeit],
                &random,
            );
            assert!(matches!(action, Action::RollDice(RollDiceOptions { dice_count: 1, .. })));
        }
    }

    #[test]
    fn test_swap_candidates_exclude_majors() {
        let catalog = Catalog::base();
        let query = StateQuery::new(&catalog);
        let mut state = fixture_state(&catalog, 2);
        state.players[1].buildings[base::STADIUM] = 1;
        let trades = swap_candidates(&state, &query, 0);
        // Wheat Field and Bakery on each side.
        assert_eq!(trades.len(), 4);
        assert!(trades.iter().all(|&(target, _, take)| target == 1 && take != base::STADIUM));
    }
}
