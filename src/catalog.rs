//! Building catalog: the static registry of building definitions.
//!
//! Indices into the catalog are wire identifiers. A new catalog version may
//! append entries but must never renumber existing ones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::activation::{Activation, LandmarkRule};
use crate::enums::{BuildingIndex, EstablishmentColor, GameMode, ProductionCategory};
use crate::errors::GameError;

/// Inclusive dice range a building activates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiceRange {
    Never,
    Between { min: u32, max: u32 },
}

impl DiceRange {
    pub const fn on(value: u32) -> Self {
        DiceRange::Between {
            min: value,
            max: value,
        }
    }

    pub const fn between(min: u32, max: u32) -> Self {
        DiceRange::Between { min, max }
    }

    pub fn contains(&self, value: u32) -> bool {
        match *self {
            DiceRange::Never => false,
            DiceRange::Between { min, max } => (min..=max).contains(&value),
        }
    }
}

/// How many copies of a building the marketplace holds at game start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Supply {
    Fixed(u32),
    OnePerPlayer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingDefinition {
    pub name: String,
    pub rule_text: String,
    pub activation_range: DiceRange,
    pub cost: u32,
    /// `None` means a player may own any number of copies.
    pub per_player_limit: Option<u32>,
    pub supply: Supply,
    pub category: ProductionCategory,
    pub color: EstablishmentColor,
    /// Whether the building fires when someone other than its owner rolls.
    pub fires_on_others_turns: bool,
    /// Copies every player owns at game start (not drawn from the marketplace).
    pub starting_count: u32,
    pub activation: Activation,
}

impl BuildingDefinition {
    pub fn per_game_limit(&self, num_players: usize) -> u32 {
        let supply = match self.supply {
            Supply::Fixed(count) => count,
            Supply::OnePerPlayer => u32::try_from(num_players).unwrap_or(u32::MAX),
        };
        let starting = self
            .starting_count
            .saturating_mul(u32::try_from(num_players).unwrap_or(u32::MAX));
        supply.saturating_add(starting)
    }

    pub fn is_landmark(&self) -> bool {
        self.color == EstablishmentColor::Landmark
    }

    pub fn is_major(&self) -> bool {
        self.color == EstablishmentColor::Purple
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Building index {index} out of range (catalog has {count} entries)")]
    OutOfRange { index: BuildingIndex, count: usize },
}

impl From<CatalogError> for GameError {
    fn from(err: CatalogError) -> Self {
        GameError::invalid_options(err.to_string())
    }
}

/// Immutable registry of buildings. Constructed once and shared between games.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    definitions: Vec<BuildingDefinition>,
}

impl Catalog {
    pub fn from_definitions(definitions: Vec<BuildingDefinition>) -> Self {
        Self { definitions }
    }

    pub fn for_mode(mode: GameMode) -> Self {
        match mode {
            GameMode::Base => Self::base(),
        }
    }

    pub fn get(&self, index: BuildingIndex) -> Result<&BuildingDefinition, CatalogError> {
        self.definitions.get(index).ok_or(CatalogError::OutOfRange {
            index,
            count: self.definitions.len(),
        })
    }

    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BuildingIndex, &BuildingDefinition)> {
        self.definitions.iter().enumerate()
    }

    pub fn landmark_indices(&self) -> impl Iterator<Item = BuildingIndex> + '_ {
        self.iter()
            .filter(|(_, def)| def.is_landmark())
            .map(|(index, _)| index)
    }

    /// Index of the landmark granting `rule`, if this catalog has one.
    pub fn landmark_with_rule(&self, rule: LandmarkRule) -> Option<BuildingIndex> {
        self.iter()
            .find(|(_, def)| def.activation == Activation::Landmark(rule))
            .map(|(index, _)| index)
    }

    /// The base game set.
    pub fn base() -> Self {
        use EstablishmentColor::*;
        use ProductionCategory as Cat;

        let establishment = |name: &str,
                             rule_text: &str,
                             range: DiceRange,
                             cost: u32,
                             category: Cat,
                             color: EstablishmentColor,
                             activation: Activation| BuildingDefinition {
            name: name.to_string(),
            rule_text: rule_text.to_string(),
            activation_range: range,
            cost,
            per_player_limit: None,
            supply: Supply::Fixed(6),
            category,
            color,
            fires_on_others_turns: matches!(color, Blue | Red),
            starting_count: 0,
            activation,
        };
        let major = |name: &str, rule_text: &str, cost: u32, activation: Activation| {
            BuildingDefinition {
                name: name.to_string(),
                rule_text: rule_text.to_string(),
                activation_range: DiceRange::on(6),
                cost,
                per_player_limit: Some(1),
                supply: Supply::OnePerPlayer,
                category: Cat::Major,
                color: Purple,
                fires_on_others_turns: false,
                starting_count: 0,
                activation,
            }
        };
        let landmark = |name: &str, rule_text: &str, cost: u32, rule: LandmarkRule| {
            BuildingDefinition {
                name: name.to_string(),
                rule_text: rule_text.to_string(),
                activation_range: DiceRange::Never,
                cost,
                per_player_limit: Some(1),
                supply: Supply::OnePerPlayer,
                category: Cat::Landmark,
                color: Landmark,
                fires_on_others_turns: false,
                starting_count: 0,
                activation: Activation::Landmark(rule),
            }
        };

        let mut wheat_field = establishment(
            "Wheat Field",
            "Get 1 coin from the bank, on anyone's turn.",
            DiceRange::on(1),
            1,
            Cat::Wheat,
            Blue,
            Activation::PassiveIncome { amount: 1 },
        );
        wheat_field.starting_count = 1;
        let mut bakery = establishment(
            "Bakery",
            "Get 1 coin from the bank, on your turn only.",
            DiceRange::between(2, 3),
            1,
            Cat::Bread,
            Green,
            Activation::ActiveTurnIncome { amount: 1 },
        );
        bakery.starting_count = 1;

        Self::from_definitions(vec![
            wheat_field,
            establishment(
                "Ranch",
                "Get 1 coin from the bank, on anyone's turn.",
                DiceRange::on(2),
                1,
                Cat::Cow,
                Blue,
                Activation::PassiveIncome { amount: 1 },
            ),
            bakery,
            establishment(
                "Cafe",
                "Get 1 coin from the player who rolled the dice.",
                DiceRange::on(3),
                2,
                Cat::Cup,
                Red,
                Activation::TakeFromActivePlayer { amount: 1 },
            ),
            establishment(
                "Convenience Store",
                "Get 3 coins from the bank, on your turn only.",
                DiceRange::on(4),
                2,
                Cat::Bread,
                Green,
                Activation::ActiveTurnIncome { amount: 3 },
            ),
            establishment(
                "Forest",
                "Get 1 coin from the bank, on anyone's turn.",
                DiceRange::on(5),
                3,
                Cat::Gear,
                Blue,
                Activation::PassiveIncome { amount: 1 },
            ),
            major(
                "Stadium",
                "Get 2 coins from all players, on your turn only.",
                6,
                Activation::TakeFromEveryOpponent { amount: 2 },
            ),
            major(
                "TV Station",
                "Take 5 coins from any one player, on your turn only.",
                7,
                Activation::TakeFromChosenOpponent { amount: 5 },
            ),
            major(
                "Business Center",
                "Trade one non-major establishment with another player, on your turn only.",
                8,
                Activation::SwapWithOpponent,
            ),
            establishment(
                "Cheese Factory",
                "Get 3 coins from the bank for each Cow establishment you own, on your turn only.",
                DiceRange::on(7),
                5,
                Cat::Factory,
                Green,
                Activation::ActiveTurnIncomePerCategory {
                    amount_per_unit: 3,
                    category: Cat::Cow,
                },
            ),
            establishment(
                "Furniture Factory",
                "Get 3 coins from the bank for each Gear establishment you own, on your turn only.",
                DiceRange::on(8),
                3,
                Cat::Factory,
                Green,
                Activation::ActiveTurnIncomePerCategory {
                    amount_per_unit: 3,
                    category: Cat::Gear,
                },
            ),
            establishment(
                "Mine",
                "Get 5 coins from the bank, on anyone's turn.",
                DiceRange::on(9),
                6,
                Cat::Gear,
                Blue,
                Activation::PassiveIncome { amount: 5 },
            ),
            establishment(
                "Family Restaurant",
                "Get 2 coins from the player who rolled the dice.",
                DiceRange::between(9, 10),
                3,
                Cat::Cup,
                Red,
                Activation::TakeFromActivePlayer { amount: 2 },
            ),
            establishment(
                "Apple Orchard",
                "Get 3 coins from the bank, on anyone's turn.",
                DiceRange::on(10),
                3,
                Cat::Wheat,
                Blue,
                Activation::PassiveIncome { amount: 3 },
            ),
            establishment(
                "Fruit and Vegetable Market",
                "Get 2 coins from the bank for each Wheat establishment you own, on your turn only.",
                DiceRange::between(11, 12),
                2,
                Cat::Fruit,
                Green,
                Activation::ActiveTurnIncomePerCategory {
                    amount_per_unit: 2,
                    category: Cat::Wheat,
                },
            ),
            landmark(
                "Train Station",
                "You may roll 1 or 2 dice.",
                4,
                LandmarkRule::TwoDice,
            ),
            landmark(
                "Shopping Mall",
                "Each of your Cup and Bread establishments earns +1 coin.",
                10,
                LandmarkRule::ShoppingMall,
            ),
            landmark(
                "Amusement Park",
                "If you roll doubles, take another turn after this one.",
                16,
                LandmarkRule::ExtraTurnOnDoubles,
            ),
            landmark(
                "Radio Tower",
                "Once every turn, you can choose to re-roll your dice.",
                22,
                LandmarkRule::ReRoll,
            ),
        ])
    }
}

/// Well-known indices of the base catalog.
pub mod base {
    use crate::enums::BuildingIndex;

    pub const WHEAT_FIELD: BuildingIndex = 0;
    pub const RANCH: BuildingIndex = 1;
    pub const BAKERY: BuildingIndex = 2;
    pub const CAFE: BuildingIndex = 3;
    pub const CONVENIENCE_STORE: BuildingIndex = 4;
    pub const FOREST: BuildingIndex = 5;
    pub const STADIUM: BuildingIndex = 6;
    pub const TV_STATION: BuildingIndex = 7;
    pub const BUSINESS_CENTER: BuildingIndex = 8;
    pub const CHEESE_FACTORY: BuildingIndex = 9;
    pub const FURNITURE_FACTORY: BuildingIndex = 10;
    pub const MINE: BuildingIndex = 11;
    pub const FAMILY_RESTAURANT: BuildingIndex = 12;
    pub const APPLE_ORCHARD: BuildingIndex = 13;
    pub const FRUIT_AND_VEGETABLE_MARKET: BuildingIndex = 14;
    pub const TRAIN_STATION: BuildingIndex = 15;
    pub const SHOPPING_MALL: BuildingIndex = 16;
    pub const AMUSEMENT_PARK: BuildingIndex = 17;
    pub const RADIO_TOWER: BuildingIndex = 18;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_catalog_indices_are_stable() {
        let catalog = Catalog::base();
        assert_eq!(catalog.count(), 19);
        assert_eq!(catalog.get(base::WHEAT_FIELD).unwrap().name, "Wheat Field");
        assert_eq!(catalog.get(base::TV_STATION).unwrap().name, "TV Station");
        assert_eq!(catalog.get(base::RADIO_TOWER).unwrap().name, "Radio Tower");
        assert_eq!(
            catalog.landmark_indices().collect::<Vec<_>>(),
            vec![
                base::TRAIN_STATION,
                base::SHOPPING_MALL,
                base::AMUSEMENT_PARK,
                base::RADIO_TOWER
            ]
        );
    }

    #[test]
    fn test_get_out_of_range() {
        let catalog = Catalog::base();
        assert_eq!(
            catalog.get(19),
            Err(CatalogError::OutOfRange {
                index: 19,
                count: 19
            })
        );
    }

    #[test]
    fn test_dice_ranges() {
        let catalog = Catalog::base();
        let bakery = catalog.get(base::BAKERY).unwrap();
        assert!(!bakery.activation_range.contains(1));
        assert!(bakery.activation_range.contains(2));
        assert!(bakery.activation_range.contains(3));
        assert!(!bakery.activation_range.contains(4));
        let mall = catalog.get(base::SHOPPING_MALL).unwrap();
        assert!((1..=12).all(|roll| !mall.activation_range.contains(roll)));
    }

    #[test]
    fn test_per_game_limits() {
        let catalog = Catalog::base();
        assert_eq!(catalog.get(base::CAFE).unwrap().per_game_limit(4), 6);
        assert_eq!(catalog.get(base::WHEAT_FIELD).unwrap().per_game_limit(3), 9);
        assert_eq!(catalog.get(base::STADIUM).unwrap().per_game_limit(3), 3);
        assert_eq!(
            catalog.landmark_with_rule(LandmarkRule::ShoppingMall),
            Some(base::SHOPPING_MALL)
        );
    }
}
