//! Append-only game log.
//!
//! Every observable state change goes through here. Observers read forward
//! from a sequence number; nothing is ever rewritten.

use serde::{Deserialize, Serialize};

use crate::actions::ErrorDetail;
use crate::enums::{ActionType, BuildingIndex, PlayerIndex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub from: PlayerIndex,
    pub amount: u32,
}

/// Reason code plus structured detail of a state update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason")]
pub enum StateChange {
    GameStarted {
        turn_order: Vec<String>,
    },
    DiceRolled {
        player: PlayerIndex,
        dice: Vec<u32>,
        total: u32,
        roll_number: u32,
    },
    DiceCommitted {
        player: PlayerIndex,
        total: u32,
    },
    Income {
        player: PlayerIndex,
        building: BuildingIndex,
        amount: u32,
        mall_bonus: bool,
    },
    CoinsTransferred {
        from: PlayerIndex,
        to: PlayerIndex,
        building: BuildingIndex,
        requested: u32,
        amount: u32,
        mall_bonus: bool,
    },
    CollectedFromAll {
        player: PlayerIndex,
        building: BuildingIndex,
        payments: Vec<Payment>,
        total: u32,
    },
    ActivationQueued {
        player: PlayerIndex,
        building: BuildingIndex,
        required_action: ActionType,
    },
    ActivationSkipped {
        player: PlayerIndex,
        building: BuildingIndex,
        details: String,
    },
    BuildingsSwapped {
        player: PlayerIndex,
        target: PlayerIndex,
        gave: BuildingIndex,
        took: BuildingIndex,
    },
    BuildingBuilt {
        player: PlayerIndex,
        building: BuildingIndex,
        cost: u32,
        coins_left: u32,
    },
    TurnEnded {
        player: PlayerIndex,
        next_player: PlayerIndex,
        round: u32,
        extra_turn: bool,
    },
    PlayerForfeited {
        player: PlayerIndex,
    },
    GameWon {
        player: PlayerIndex,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LogEntry {
    StateUpdate {
        sequence: u64,
        change: StateChange,
        message: String,
    },
    ActionRequest {
        sequence: u64,
        player: PlayerIndex,
        user_name: String,
        actions: Vec<ActionType>,
    },
    Error {
        sequence: u64,
        player: Option<PlayerIndex>,
        error: ErrorDetail,
    },
}

impl LogEntry {
    pub fn sequence(&self) -> u64 {
        match self {
            LogEntry::StateUpdate { sequence, .. }
            | LogEntry::ActionRequest { sequence, .. }
            | LogEntry::Error { sequence, .. } => *sequence,
        }
    }

    pub fn change(&self) -> Option<&StateChange> {
        match self {
            LogEntry::StateUpdate { change, .. } => Some(change),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            LogEntry::StateUpdate { message, .. } => Some(message),
            LogEntry::Error { error, .. } => Some(&error.message),
            LogEntry::ActionRequest { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameLog {
    first_sequence: u64,
    entries: Vec<LogEntry>,
}

impl GameLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty scratch log whose sequence numbers continue after this one.
    pub fn continuation(&self) -> Self {
        Self {
            first_sequence: self.next_sequence(),
            entries: Vec::new(),
        }
    }

    pub fn next_sequence(&self) -> u64 {
        self.first_sequence + self.entries.len() as u64
    }

    pub fn create_state_update(&mut self, change: StateChange, message: impl Into<String>) {
        let message = message.into();
        log::debug!("📜 {}", message);
        let sequence = self.next_sequence();
        self.entries.push(LogEntry::StateUpdate {
            sequence,
            change,
            message,
        });
    }

    pub fn create_action_request(
        &mut self,
        player: PlayerIndex,
        user_name: impl Into<String>,
        actions: Vec<ActionType>,
    ) {
        let sequence = self.next_sequence();
        self.entries.push(LogEntry::ActionRequest {
            sequence,
            player,
            user_name: user_name.into(),
            actions,
        });
    }

    pub fn create_error(&mut self, player: Option<PlayerIndex>, error: ErrorDetail) -> &LogEntry {
        let sequence = self.next_sequence();
        self.entries.push(LogEntry::Error {
            sequence,
            player,
            error,
        });
        // Just pushed, so `last` is present.
        &self.entries[self.entries.len() - 1]
    }

    /// Appends a scratch log produced by [`GameLog::continuation`].
    /// Returns the newly appended entries.
    pub fn append(&mut self, scratch: GameLog) -> &[LogEntry] {
        let start = self.entries.len();
        if scratch.first_sequence == self.next_sequence() {
            self.entries.extend(scratch.entries);
        } else {
            // Sequences drifted (another append happened in between); renumber.
            for entry in scratch.entries {
                let sequence = self.next_sequence();
                self.entries.push(renumber(entry, sequence));
            }
        }
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries with `sequence >= cursor`.
    pub fn entries_since(&self, cursor: u64) -> &[LogEntry] {
        let offset = cursor.saturating_sub(self.first_sequence);
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        self.entries.get(offset..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
}

fn renumber(entry: LogEntry, new_sequence: u64) -> LogEntry {
    match entry {
        LogEntry::StateUpdate {
            change, message, ..
        } => LogEntry::StateUpdate {
            sequence: new_sequence,
            change,
            message,
        },
        LogEntry::ActionRequest {
            player,
            user_name,
            actions,
            ..
        } => LogEntry::ActionRequest {
            sequence: new_sequence,
            player,
            user_name,
            actions,
        },
        LogEntry::Error { player, error, .. } => LogEntry::Error {
            sequence: new_sequence,
            player,
            error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_increase_across_continuations() {
        let mut log = GameLog::new();
        log.create_state_update(StateChange::PlayerForfeited { player: 1 }, "p1 forfeits");
        let mut scratch = log.continuation();
        scratch.create_action_request(0, "alice", vec![ActionType::RollDice]);
        scratch.create_state_update(StateChange::GameWon { player: 0 }, "alice wins");
        let appended = log.append(scratch);
        assert_eq!(appended.len(), 2);
        let sequences: Vec<u64> = log.entries().iter().map(LogEntry::sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn test_entries_since_reads_forward() {
        let mut log = GameLog::new();
        for player in 0..4 {
            log.create_state_update(StateChange::PlayerForfeited { player }, "forfeit");
        }
        assert_eq!(log.entries_since(2).len(), 2);
        assert_eq!(log.entries_since(2)[0].sequence(), 2);
        assert!(log.entries_since(10).is_empty());
    }

    #[test]
    fn test_stale_scratch_is_renumbered() {
        let mut log = GameLog::new();
        let mut scratch = log.continuation();
        scratch.create_state_update(StateChange::GameWon { player: 0 }, "won");
        log.create_state_update(StateChange::PlayerForfeited { player: 1 }, "forfeit");
        log.append(scratch);
        assert_eq!(log.entries()[1].sequence(), 1);
    }

    #[test]
    fn test_state_update_serializes_reason_code() {
        let mut log = GameLog::new();
        log.create_state_update(
            StateChange::DiceCommitted {
                player: 0,
                total: 7,
            },
            "committed",
        );
        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["entry"], "state_update");
        assert_eq!(json["change"]["reason"], "DiceCommitted");
        assert_eq!(json["change"]["total"], 7);
    }
}
