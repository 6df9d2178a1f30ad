use serde::{Deserialize, Serialize};

/// Index of a building in the active catalog. Stable across catalog versions.
pub type BuildingIndex = usize;

/// Seat index of a player in turn order.
pub type PlayerIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    RollDice,
    CommitDiceResult,
    BuildBuilding,
    TvStationPayout,
    BusinessCenterSwap,
    EndTurn,
    Forfeit,
}

impl ActionType {
    pub fn name(self) -> &'static str {
        match self {
            ActionType::RollDice => "RollDice",
            ActionType::CommitDiceResult => "CommitDiceResult",
            ActionType::BuildBuilding => "BuildBuilding",
            ActionType::TvStationPayout => "TvStationPayout",
            ActionType::BusinessCenterSwap => "BusinessCenterSwap",
            ActionType::EndTurn => "EndTurn",
            ActionType::Forfeit => "Forfeit",
        }
    }
}

/// Establishment class. Drives whose turn a building fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstablishmentColor {
    /// Fires on anyone's roll.
    Blue,
    /// Fires only on the owner's own roll.
    Green,
    /// Fires on opponents' rolls; the roller pays the owner.
    Red,
    /// Major establishment, one per player, fires on the owner's roll.
    Purple,
    /// No dice activation; grants a standing rule.
    Landmark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductionCategory {
    Wheat,
    Cow,
    Bread,
    Cup,
    Gear,
    Factory,
    Fruit,
    Major,
    Landmark,
}

impl ProductionCategory {
    /// Categories boosted by the Shopping Mall.
    pub fn is_mall_boosted(self) -> bool {
        matches!(self, ProductionCategory::Bread | ProductionCategory::Cup)
    }
}

/// Selects which catalog a game plays with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum GameMode {
    #[default]
    Base,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfiguration {
    #[serde(default)]
    pub mode: GameMode,
    #[serde(default = "default_starting_coins")]
    pub starting_coins: u32,
    #[serde(default)]
    pub shuffle_turn_order: bool,
}

fn default_starting_coins() -> u32 {
    3
}

impl Default for GameConfiguration {
    fn default() -> Self {
        Self {
            mode: GameMode::Base,
            starting_coins: default_starting_coins(),
            shuffle_turn_order: false,
        }
    }
}

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;
pub const DIE_FACES: u32 = 6;
