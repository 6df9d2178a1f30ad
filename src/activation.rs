//! Activation effects.
//!
//! Every building carries one [`Activation`]. The set of effect families is
//! closed, so dispatch is a single `match` per operation and adding a family
//! forces every operation to handle it.

use serde::{Deserialize, Serialize};

use crate::actions::{Action, BusinessCenterSwapOptions, TvStationPayoutOptions};
use crate::enums::{ActionType, BuildingIndex, PlayerIndex, ProductionCategory};
use crate::errors::{GameError, GameResult};
use crate::game_log::{GameLog, Payment, StateChange};
use crate::query::StateQuery;
use crate::state::{GameState, PendingActivation};

/// Standing rule granted by owning a landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandmarkRule {
    /// Train Station: may roll two dice.
    TwoDice,
    /// Shopping Mall: +1 on Bread and Cup income.
    ShoppingMall,
    /// Amusement Park: doubles grant another turn.
    ExtraTurnOnDoubles,
    /// Radio Tower: one re-roll per turn.
    ReRoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family")]
pub enum Activation {
    /// No dice effect.
    Landmark(LandmarkRule),
    /// Bank pays the owner on anyone's roll.
    PassiveIncome { amount: u32 },
    /// Bank pays the owner, only on the owner's own roll.
    ActiveTurnIncome { amount: u32 },
    /// Bank pays `amount_per_unit` for every building of `category` the owner
    /// holds, only on the owner's own roll.
    ActiveTurnIncomePerCategory {
        amount_per_unit: u32,
        category: ProductionCategory,
    },
    /// The roller pays the owner, capped by the roller's balance.
    TakeFromActivePlayer { amount: u32 },
    /// The owner collects from every opponent, each capped by their balance.
    TakeFromEveryOpponent { amount: u32 },
    /// The owner names one opponent to pay them. Needs a decision.
    TakeFromChosenOpponent { amount: u32 },
    /// The owner trades one establishment with an opponent. Needs a decision.
    SwapWithOpponent,
}

impl Activation {
    /// Action the owner must submit before this activation resolves.
    pub fn required_player_action(&self) -> Option<ActionType> {
        match self {
            Activation::TakeFromChosenOpponent { .. } => Some(ActionType::TvStationPayout),
            Activation::SwapWithOpponent => Some(ActionType::BusinessCenterSwap),
            Activation::Landmark(_)
            | Activation::PassiveIncome { .. }
            | Activation::ActiveTurnIncome { .. }
            | Activation::ActiveTurnIncomePerCategory { .. }
            | Activation::TakeFromActivePlayer { .. }
            | Activation::TakeFromEveryOpponent { .. } => None,
        }
    }

    /// Applies an immediate activation of `building` owned by `invoked`.
    pub fn apply(
        &self,
        log: &mut GameLog,
        state: &mut GameState,
        query: &StateQuery<'_>,
        building: BuildingIndex,
        invoked: PlayerIndex,
    ) -> GameResult<()> {
        let name = query.building_name(building)?;
        let mall_bonus = query.mall_bonus_applies(state, invoked, building)?;
        let bonus = u32::from(mall_bonus);
        let annotation = if mall_bonus {
            " (+1 Shopping Mall bonus)"
        } else {
            ""
        };

        match *self {
            Activation::Landmark(_) => Err(GameError::invalid_state(format!(
                "landmark {name} has no dice activation"
            ))),
            Activation::PassiveIncome { amount } => {
                let total = amount + bonus;
                state.credit(invoked, total)?;
                let who = state.player_name(invoked)?;
                log.create_state_update(
                    StateChange::Income {
                        player: invoked,
                        building,
                        amount: total,
                        mall_bonus,
                    },
                    format!("{who} received {total} coins from the bank for {name}{annotation}"),
                );
                Ok(())
            }
            Activation::ActiveTurnIncome { amount } => {
                ensure_active(state, invoked, &name)?;
                let total = amount + bonus;
                state.credit(invoked, total)?;
                let who = state.player_name(invoked)?;
                log.create_state_update(
                    StateChange::Income {
                        player: invoked,
                        building,
                        amount: total,
                        mall_bonus,
                    },
                    format!("{who} received {total} coins from the bank for {name}{annotation}"),
                );
                Ok(())
            }
            Activation::ActiveTurnIncomePerCategory {
                amount_per_unit,
                category,
            } => {
                ensure_active(state, invoked, &name)?;
                let units = query.count_in_category(state, invoked, category)?;
                let total = amount_per_unit.saturating_mul(units).saturating_add(bonus);
                state.credit(invoked, total)?;
                let who = state.player_name(invoked)?;
                log.create_state_update(
                    StateChange::Income {
                        player: invoked,
                        building,
                        amount: total,
                        mall_bonus,
                    },
                    format!(
                        "{who} received {total} coins from the bank for {name} \
                         ({units} x {category:?} at {amount_per_unit} each){annotation}"
                    ),
                );
                Ok(())
            }
            Activation::TakeFromActivePlayer { amount } => {
                let payer = state.turn.active_player;
                if payer == invoked {
                    log.create_state_update(
                        StateChange::ActivationSkipped {
                            player: invoked,
                            building,
                            details: "owner is the roller".to_string(),
                        },
                        format!("{name} does not fire on its owner's own roll"),
                    );
                    return Ok(());
                }
                let requested = amount + bonus;
                transfer_capped(log, state, query, payer, invoked, building, requested, mall_bonus)
            }
            Activation::TakeFromEveryOpponent { amount } => {
                ensure_active(state, invoked, &name)?;
                let requested = amount + bonus;
                let mut payments = Vec::new();
                let mut total = 0u32;
                for payer in query.live_opponents(state, invoked) {
                    let taken = query.max_takeable(state, payer, requested)?;
                    if taken > 0 {
                        state.debit(payer, taken)?;
                    }
                    total = total.saturating_add(taken);
                    payments.push(Payment {
                        from: payer,
                        amount: taken,
                    });
                }
                state.credit(invoked, total)?;
                let who = state.player_name(invoked)?;
                log.create_state_update(
                    StateChange::CollectedFromAll {
                        player: invoked,
                        building,
                        payments,
                        total,
                    },
                    format!("{who} collected {total} coins from all opponents for {name}{annotation}"),
                );
                Ok(())
            }
            Activation::TakeFromChosenOpponent { .. } | Activation::SwapWithOpponent => {
                Err(GameError::invalid_state(format!(
                    "{name} needs a player decision and can't be applied directly"
                )))
            }
        }
    }

    /// Resolves a queued activation with the owner's decision.
    pub fn resolve_player_action(
        &self,
        log: &mut GameLog,
        state: &mut GameState,
        query: &StateQuery<'_>,
        pending: &PendingActivation,
        action: &Action,
    ) -> GameResult<()> {
        match (*self, action) {
            (
                Activation::TakeFromChosenOpponent { amount },
                Action::TvStationPayout(TvStationPayoutOptions {
                    target_player_index,
                }),
            ) => {
                let target = *target_player_index;
                query.ensure_live_target(state, pending.player, target)?;
                let mall_bonus =
                    query.mall_bonus_applies(state, pending.player, pending.building)?;
                transfer_capped(
                    log,
                    state,
                    query,
                    target,
                    pending.player,
                    pending.building,
                    amount + u32::from(mall_bonus),
                    mall_bonus,
                )
            }
            (Activation::SwapWithOpponent, Action::BusinessCenterSwap(options)) => {
                resolve_swap(log, state, query, pending, options)
            }
            (activation, action) => Err(GameError::invalid_state(format!(
                "{:?} can't resolve activation {:?}",
                action.action_type(),
                activation
            ))),
        }
    }
}

fn ensure_active(state: &GameState, invoked: PlayerIndex, name: &str) -> GameResult<()> {
    if state.turn.active_player != invoked {
        return Err(GameError::invalid_state(format!(
            "{name} activated for player {invoked} outside their own turn"
        )));
    }
    Ok(())
}

/// Moves `min(requested, payer balance)` from `payer` to `payee`. No debt.
#[allow(clippy::too_many_arguments)]
fn transfer_capped(
    log: &mut GameLog,
    state: &mut GameState,
    query: &StateQuery<'_>,
    payer: PlayerIndex,
    payee: PlayerIndex,
    building: BuildingIndex,
    requested: u32,
    mall_bonus: bool,
) -> GameResult<()> {
    let amount = query.max_takeable(state, payer, requested)?;
    if amount > 0 {
        state.debit(payer, amount)?;
        state.credit(payee, amount)?;
    }
    let name = query.building_name(building)?;
    let from = state.player_name(payer)?;
    let to = state.player_name(payee)?;
    let annotation = if mall_bonus {
        " (+1 Shopping Mall bonus)"
    } else {
        ""
    };
    let shortfall = if amount < requested {
        format!(" ({requested} owed, {from} could only pay {amount})")
    } else {
        String::new()
    };
    log.create_state_update(
        StateChange::CoinsTransferred {
            from: payer,
            to: payee,
            building,
            requested,
            amount,
            mall_bonus,
        },
        format!("{from} paid {to} {amount} coins for {name}{annotation}{shortfall}"),
    );
    Ok(())
}

fn resolve_swap(
    log: &mut GameLog,
    state: &mut GameState,
    query: &StateQuery<'_>,
    pending: &PendingActivation,
    options: &BusinessCenterSwapOptions,
) -> GameResult<()> {
    let player = pending.player;
    let name = query.building_name(pending.building)?;
    if options.skip {
        let who = state.player_name(player)?;
        log.create_state_update(
            StateChange::ActivationSkipped {
                player,
                building: pending.building,
                details: "skipped by player".to_string(),
            },
            format!("{who} skipped the {name} swap"),
        );
        return Ok(());
    }

    let target = options.target_player_index;
    let give = options.building_index_give;
    let take = options.building_index_take;
    query.ensure_live_target(state, player, target)?;
    query.ensure_swappable(give)?;
    query.ensure_swappable(take)?;
    if state.owned_count(player, give)? == 0 {
        return Err(GameError::invalid_options(format!(
            "player {player} owns no {} to give",
            query.building_name(give)?
        )));
    }
    if state.owned_count(target, take)? == 0 {
        return Err(GameError::invalid_options(format!(
            "player {target} owns no {} to take",
            query.building_name(take)?
        )));
    }

    state.remove_building(player, give)?;
    state.add_building(target, give)?;
    state.remove_building(target, take)?;
    state.add_building(player, take)?;

    let who = state.player_name(player)?;
    let whom = state.player_name(target)?;
    log.create_state_update(
        StateChange::BuildingsSwapped {
            player,
            target,
            gave: give,
            took: take,
        },
        format!(
            "{who} traded {} to {whom} for {} using {name}",
            query.building_name(give)?,
            query.building_name(take)?
        ),
    );
    Ok(())
}
