use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::{ActionType, BuildingIndex, PlayerIndex};
use crate::errors::{ErrorKind, GameError, GameResult};
use crate::game_log::LogEntry;

/// Unique identifier for games
pub type GameId = String;

/// User handle a player authenticates as
pub type UserName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollDiceOptions {
    pub dice_count: u8,
    #[serde(default)]
    pub auto_commit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildBuildingOptions {
    pub building_index: BuildingIndex,
    #[serde(default)]
    pub auto_end_turn: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvStationPayoutOptions {
    pub target_player_index: PlayerIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessCenterSwapOptions {
    pub target_player_index: PlayerIndex,
    pub building_index_give: BuildingIndex,
    pub building_index_take: BuildingIndex,
    #[serde(default)]
    pub skip: bool,
}

impl BusinessCenterSwapOptions {
    pub fn skip() -> Self {
        Self {
            target_player_index: 0,
            building_index_give: 0,
            building_index_take: 0,
            skip: true,
        }
    }
}

/// Core player actions, tagged by action type on the wire:
/// `{"type": "BuildBuilding", "options": {"building_index": 4}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options")]
pub enum Action {
    RollDice(RollDiceOptions),
    CommitDiceResult,
    BuildBuilding(BuildBuildingOptions),
    TvStationPayout(TvStationPayoutOptions),
    BusinessCenterSwap(BusinessCenterSwapOptions),
    EndTurn,
    Forfeit,
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Action::RollDice(_) => ActionType::RollDice,
            Action::CommitDiceResult => ActionType::CommitDiceResult,
            Action::BuildBuilding(_) => ActionType::BuildBuilding,
            Action::TvStationPayout(_) => ActionType::TvStationPayout,
            Action::BusinessCenterSwap(_) => ActionType::BusinessCenterSwap,
            Action::EndTurn => ActionType::EndTurn,
            Action::Forfeit => ActionType::Forfeit,
        }
    }

    /// Parses a wire payload. An unrecognised `type` is `UnknownAction`; a
    /// known type with a bad `options` body is `InvalidActionOptions`.
    pub fn from_value(value: Value) -> GameResult<Self> {
        let tag = match value.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => return Err(GameError::unknown_action(format!("action type {other}"))),
            None => return Err(GameError::unknown_action("missing action type")),
        };
        let action_type: ActionType = serde_json::from_value(Value::String(tag.clone()))
            .map_err(|_| GameError::unknown_action(format!("'{tag}'")))?;
        serde_json::from_value(value)
            .map_err(|err| GameError::invalid_options(format!("{}: {err}", action_type.name())))
    }

    pub fn roll(dice_count: u8) -> Self {
        Action::RollDice(RollDiceOptions {
            dice_count,
            auto_commit: false,
        })
    }

    pub fn build(building_index: BuildingIndex) -> Self {
        Action::BuildBuilding(BuildBuildingOptions {
            building_index,
            auto_end_turn: false,
        })
    }
}

/// Error detail returned to the submitter of a rejected action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&GameError> for ErrorDetail {
    fn from(error: &GameError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Result of submitting an action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub log_entries: Vec<LogEntry>,
}

impl ActionResponse {
    pub fn accepted(log_entries: Vec<LogEntry>) -> Self {
        Self {
            accepted: true,
            error: None,
            log_entries,
        }
    }

    pub fn rejected(error: ErrorDetail, log_entry: LogEntry) -> Self {
        Self {
            accepted: false,
            error: Some(error),
            log_entries: vec![log_entry],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format_is_tagged() {
        let json = serde_json::to_value(Action::build(4)).unwrap();
        assert_eq!(json["type"], "BuildBuilding");
        assert_eq!(json["options"]["building_index"], 4);

        let parsed: Action = serde_json::from_str(r#"{"type":"EndTurn"}"#).unwrap();
        assert_eq!(parsed, Action::EndTurn);

        let parsed: Action =
            serde_json::from_str(r#"{"type":"RollDice","options":{"dice_count":2}}"#).unwrap();
        assert_eq!(parsed, Action::roll(2));
    }

    #[test]
    fn test_from_value_classifies_bad_payloads() {
        let err = Action::from_value(serde_json::json!({"type": "StealEverything"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAction);

        let err = Action::from_value(serde_json::json!({"options": {}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAction);

        let err = Action::from_value(serde_json::json!({"type": "BuildBuilding", "options": {}}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidActionOptions);

        let err = Action::from_value(
            serde_json::json!({"type": "RollDice", "options": {"dice_count": "two"}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidActionOptions);

        let action = Action::from_value(serde_json::json!({"type": "EndTurn"})).unwrap();
        assert_eq!(action, Action::EndTurn);
    }

    #[test]
    fn test_unknown_action_type_fails_to_parse() {
        let parsed = serde_json::from_str::<Action>(r#"{"type":"StealEverything"}"#);
        assert!(parsed.is_err());
    }
}
