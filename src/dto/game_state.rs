//! Game state as saved, pushed and exported.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::validation::validate_validated_indices;

/// Candidate bingo statement shared by every player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Proposition {
    /// Stable identifier referenced by grids.
    pub id: String,
    /// Display text.
    pub text: String,
}

/// A player's claim that the proposition of a grid cell happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedItem {
    /// Proposition of the cell at validation time.
    pub proposition_id: String,
    /// What happened, as typed by the user.
    pub description: String,
    /// Epoch milliseconds at which the cell was validated.
    pub timestamp: i64,
}

/// Player entry of the persisted game state.
///
/// Validations travel as `[index, item]` pairs rather than a keyed object so the
/// format stays compatible with the saves already stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedPlayer {
    /// Older saves predate player identifiers, hence the default.
    #[serde(default)]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Proposition ids, one per cell.
    pub grid: Vec<String>,
    /// `[cell index, validation]` pairs.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub validated_items: Vec<(usize, ValidatedItem)>,
}

impl Validate for SavedPlayer {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_validated_indices(&self.grid, &self.validated_items) {
            errors.add("validatedItems", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Whole-game payload exchanged with the save API, the push channel and exported files.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct GameState {
    /// Players in table order.
    #[validate(nested)]
    pub players: Vec<SavedPlayer>,
    /// Propositions available to grids.
    pub propositions: Vec<Proposition>,
}

impl GameState {
    /// Parse a game state out of raw JSON text.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Text of the proposition with the given id, if it still exists.
    pub fn proposition_text(&self, id: &str) -> Option<&str> {
        self.propositions
            .iter()
            .find(|proposition| proposition.id == id)
            .map(|proposition| proposition.text.as_str())
    }
}
