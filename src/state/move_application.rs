use std::collections::VecDeque;

// Import from parent module's imports
use super::{DiceRoll, GameState, GameStatus, PendingActivation, PlayerStatus, TurnPhase};

// Import directly from lib scope
use crate::actions::{Action, BuildBuildingOptions, RollDiceOptions};
use crate::activation::LandmarkRule;
use crate::enums::{BuildingIndex, EstablishmentColor, PlayerIndex, DIE_FACES};
use crate::errors::{GameError, GameResult};
use crate::game_log::{GameLog, StateChange};
use crate::query::StateQuery;
use crate::random::RandomSource;

impl GameState {
    /// Dispatches an already-authorised action to its handler.
    ///
    /// Legality against the current phase is decided by
    /// [`StateQuery::possible_actions`] before this is called; handlers treat a
    /// phase mismatch as a broken engine.
    pub fn apply_action(
        &mut self,
        log: &mut GameLog,
        query: &StateQuery<'_>,
        random: &dyn RandomSource,
        player: PlayerIndex,
        action: &Action,
    ) -> GameResult<()> {
        match action {
            Action::RollDice(options) => self.roll_dice(log, query, random, player, options),
            Action::CommitDiceResult => self.commit_dice(log, query, player),
            Action::BuildBuilding(options) => self.build_building(log, query, player, options),
            Action::TvStationPayout(_) | Action::BusinessCenterSwap(_) => {
                self.resolve_pending(log, query, player, action)
            }
            Action::EndTurn => self.end_turn(log, query, player),
            Action::Forfeit => self.forfeit(log, query, player),
        }
    }

    fn roll_dice(
        &mut self,
        log: &mut GameLog,
        query: &StateQuery<'_>,
        random: &dyn RandomSource,
        player: PlayerIndex,
        options: &RollDiceOptions,
    ) -> GameResult<()> {
        self.ensure_active(player)?;
        if !matches!(
            self.turn.phase,
            TurnPhase::AwaitingFirstRoll | TurnPhase::AwaitingRollOrCommit { .. }
        ) {
            return Err(GameError::invalid_state(format!(
                "roll handler reached in phase {:?}",
                self.turn.phase
            )));
        }

        let allowance = query.dice_allowance(self, player);
        let dice_count = u32::from(options.dice_count);
        if dice_count == 0 || dice_count > allowance {
            return Err(GameError::invalid_options(format!(
                "can roll 1 to {allowance} dice, asked for {dice_count}"
            )));
        }
        let roll_allowance = query.roll_allowance(self, player);
        if self.turn.rolls_taken >= roll_allowance {
            return Err(GameError::invalid_state(format!(
                "roll {} exceeds allowance {roll_allowance}",
                self.turn.rolls_taken + 1
            )));
        }

        let dice: Vec<u32> = (0..dice_count)
            .map(|_| random.int_in_range(1, DIE_FACES))
            .collect();
        let roll = DiceRoll { dice };
        let total = roll.total();
        self.turn.rolls_taken += 1;

        let name = self.player_name(player)?;
        log.create_state_update(
            StateChange::DiceRolled {
                player,
                dice: roll.dice.clone(),
                total,
                roll_number: self.turn.rolls_taken,
            },
            format!("🎲 {name} rolled {:?} for a total of {total}", roll.dice),
        );
        self.turn.phase = TurnPhase::AwaitingRollOrCommit { roll };

        if options.auto_commit {
            self.commit_dice(log, query, player)?;
        }
        Ok(())
    }

    fn commit_dice(
        &mut self,
        log: &mut GameLog,
        query: &StateQuery<'_>,
        player: PlayerIndex,
    ) -> GameResult<()> {
        self.ensure_active(player)?;
        let roll = match &self.turn.phase {
            TurnPhase::AwaitingRollOrCommit { roll } => roll.clone(),
            phase => {
                return Err(GameError::invalid_state(format!(
                    "commit handler reached in phase {phase:?}"
                )))
            }
        };
        let total = roll.total();
        let name = self.player_name(player)?;
        log.create_state_update(
            StateChange::DiceCommitted { player, total },
            format!("{name} committed a roll of {total}"),
        );
        self.turn.extra_turn =
            roll.is_doubles() && query.owns_rule(self, player, LandmarkRule::ExtraTurnOnDoubles);

        let mut pending = VecDeque::new();
        for (owner, building) in self.activation_order(query, player, total)? {
            let activation = query.definition(building)?.activation;
            match activation.required_player_action() {
                None => activation.apply(log, self, query, building, owner)?,
                Some(required_action) => {
                    let building_name = query.building_name(building)?;
                    let owner_name = self.player_name(owner)?;
                    if query.live_opponents(self, owner).is_empty() {
                        log.create_state_update(
                            StateChange::ActivationSkipped {
                                player: owner,
                                building,
                                details: "no opponent to target".to_string(),
                            },
                            format!("{owner_name}'s {building_name} has no opponent to target"),
                        );
                        continue;
                    }
                    log.create_state_update(
                        StateChange::ActivationQueued {
                            player: owner,
                            building,
                            required_action,
                        },
                        format!("{owner_name}'s {building_name} awaits {}", required_action.name()),
                    );
                    pending.push_back(PendingActivation {
                        player: owner,
                        building,
                        required_action,
                    });
                }
            }
        }

        self.turn.phase = if pending.is_empty() {
            TurnPhase::AwaitingBuildOrEnd { roll, built: false }
        } else {
            TurnPhase::ResolvingActivations { roll, pending }
        };
        Ok(())
    }

    /// Every `(owner, building)` activation for `total`, one entry per owned
    /// copy, in resolution order: other players' red, other players' blue,
    /// the roller's blue and green, the roller's red, the roller's purple.
    fn activation_order(
        &self,
        query: &StateQuery<'_>,
        active: PlayerIndex,
        total: u32,
    ) -> GameResult<Vec<(PlayerIndex, BuildingIndex)>> {
        use EstablishmentColor::{Blue, Green, Purple, Red};

        let others = query.live_opponents(self, active);
        let mut order = Vec::new();
        for &owner in &others {
            self.collect_activations(query, owner, true, &[Red], total, &mut order)?;
        }
        for &owner in &others {
            self.collect_activations(query, owner, true, &[Blue, Green], total, &mut order)?;
        }
        self.collect_activations(query, active, false, &[Blue, Green], total, &mut order)?;
        self.collect_activations(query, active, false, &[Red], total, &mut order)?;
        self.collect_activations(query, active, false, &[Purple], total, &mut order)?;
        Ok(order)
    }

    fn collect_activations(
        &self,
        query: &StateQuery<'_>,
        owner: PlayerIndex,
        on_others_turn: bool,
        colors: &[EstablishmentColor],
        total: u32,
        order: &mut Vec<(PlayerIndex, BuildingIndex)>,
    ) -> GameResult<()> {
        for (building, def) in query.catalog().iter() {
            if !colors.contains(&def.color) || !def.activation_range.contains(total) {
                continue;
            }
            if on_others_turn && !def.fires_on_others_turns {
                continue;
            }
            for _ in 0..self.owned_count(owner, building)? {
                order.push((owner, building));
            }
        }
        Ok(())
    }

    fn resolve_pending(
        &mut self,
        log: &mut GameLog,
        query: &StateQuery<'_>,
        player: PlayerIndex,
        action: &Action,
    ) -> GameResult<()> {
        self.ensure_active(player)?;
        let head = match &self.turn.phase {
            TurnPhase::ResolvingActivations { pending, .. } => pending.front().copied(),
            _ => None,
        }
        .ok_or_else(|| GameError::invalid_state("no pending activation to resolve"))?;
        if head.required_action != action.action_type() || head.player != player {
            return Err(GameError::invalid_state(format!(
                "{:?} submitted while {:?} is at the head of the queue",
                action.action_type(),
                head.required_action
            )));
        }

        let activation = query.definition(head.building)?.activation;
        activation.resolve_player_action(log, self, query, &head, action)?;

        let next = match std::mem::replace(&mut self.turn.phase, TurnPhase::TurnEnded) {
            TurnPhase::ResolvingActivations { roll, mut pending } => {
                pending.pop_front();
                if pending.is_empty() {
                    TurnPhase::AwaitingBuildOrEnd { roll, built: false }
                } else {
                    TurnPhase::ResolvingActivations { roll, pending }
                }
            }
            phase => {
                return Err(GameError::invalid_state(format!(
                    "phase changed to {phase:?} while resolving"
                )))
            }
        };
        self.turn.phase = next;
        Ok(())
    }

    fn build_building(
        &mut self,
        log: &mut GameLog,
        query: &StateQuery<'_>,
        player: PlayerIndex,
        options: &BuildBuildingOptions,
    ) -> GameResult<()> {
        self.ensure_active(player)?;
        let roll = match &self.turn.phase {
            TurnPhase::AwaitingBuildOrEnd { roll, built: false } => roll.clone(),
            phase => {
                return Err(GameError::invalid_state(format!(
                    "build handler reached in phase {phase:?}"
                )))
            }
        };

        let building = options.building_index;
        query.check_buildable(self, player, building)?;
        let def = query.definition(building)?;

        self.debit(player, def.cost)?;
        self.add_building(player, building)?;
        let slot = self.marketplace.available.get_mut(building).ok_or_else(|| {
            GameError::invalid_state(format!("marketplace has no slot for {building}"))
        })?;
        *slot = slot
            .checked_sub(1)
            .ok_or_else(|| GameError::invalid_state(format!("{} already sold out", def.name)))?;

        let coins_left = self.player(player)?.coins;
        let name = self.player_name(player)?;
        log.create_state_update(
            StateChange::BuildingBuilt {
                player,
                building,
                cost: def.cost,
                coins_left,
            },
            format!(
                "🏗️ {name} built {} for {} coins ({coins_left} left)",
                def.name, def.cost
            ),
        );
        self.turn.phase = TurnPhase::AwaitingBuildOrEnd { roll, built: true };

        if def.is_landmark() && query.owns_all_landmarks(self, player) {
            return self.finish(log, player);
        }
        if options.auto_end_turn {
            self.end_turn(log, query, player)?;
        }
        Ok(())
    }

    fn end_turn(
        &mut self,
        log: &mut GameLog,
        query: &StateQuery<'_>,
        player: PlayerIndex,
    ) -> GameResult<()> {
        self.ensure_active(player)?;
        if !matches!(self.turn.phase, TurnPhase::AwaitingBuildOrEnd { .. }) {
            return Err(GameError::invalid_state(format!(
                "end turn handler reached in phase {:?}",
                self.turn.phase
            )));
        }
        if query.owns_all_landmarks(self, player) {
            return self.finish(log, player);
        }
        self.advance_turn(log, player)
    }

    fn forfeit(
        &mut self,
        log: &mut GameLog,
        query: &StateQuery<'_>,
        player: PlayerIndex,
    ) -> GameResult<()> {
        if !self.is_live(player) {
            return Err(GameError::invalid_state(format!(
                "seat {player} has already forfeited"
            )));
        }
        self.players[player].status = PlayerStatus::Forfeited;
        let name = self.player_name(player)?;
        log::info!("🏳️ {} forfeits", name);
        log.create_state_update(
            StateChange::PlayerForfeited { player },
            format!("{name} forfeited"),
        );

        if self.live_player_count() == 1 {
            let winner = self
                .next_live_after(player)
                .ok_or_else(|| GameError::invalid_state("no player left after forfeit"))?;
            return self.finish(log, winner);
        }
        if player == query.active_player(self) {
            self.turn.extra_turn = false;
            return self.advance_turn(log, player);
        }
        Ok(())
    }

    /// Passes the turn on, discarding any outstanding queue.
    fn advance_turn(&mut self, log: &mut GameLog, player: PlayerIndex) -> GameResult<()> {
        let extra_turn = self.turn.extra_turn && self.is_live(player);
        let next = if extra_turn {
            player
        } else {
            self.next_live_after(player)
                .ok_or_else(|| GameError::invalid_state("no live player to pass the turn to"))?
        };
        if !extra_turn && next <= player {
            self.turn.round += 1;
        }
        self.turn.active_player = next;
        self.turn.turn_number += 1;
        self.turn.rolls_taken = 0;
        self.turn.extra_turn = false;
        self.turn.phase = TurnPhase::AwaitingFirstRoll;

        let name = self.player_name(player)?;
        let next_name = self.player_name(next)?;
        let message = if extra_turn {
            format!("{name} rolled doubles and takes another turn")
        } else {
            format!("{name} ended their turn, {next_name} is up")
        };
        log::info!("🔄 {}", message);
        log.create_state_update(
            StateChange::TurnEnded {
                player,
                next_player: next,
                round: self.turn.round,
                extra_turn,
            },
            message,
        );
        Ok(())
    }

    fn finish(&mut self, log: &mut GameLog, winner: PlayerIndex) -> GameResult<()> {
        self.status = GameStatus::Finished { winner };
        self.turn.phase = TurnPhase::TurnEnded;
        self.turn.extra_turn = false;
        let name = self.player_name(winner)?;
        log::info!("🏆 {} wins", name);
        log.create_state_update(
            StateChange::GameWon { player: winner },
            format!("{name} won the game"),
        );
        Ok(())
    }

    fn ensure_active(&self, player: PlayerIndex) -> GameResult<()> {
        if self.turn.active_player != player {
            return Err(GameError::invalid_state(format!(
                "seat {player} reached a turn handler on seat {}'s turn",
                self.turn.active_player
            )));
        }
        Ok(())
    }
}
