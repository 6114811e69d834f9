//! Save API records.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::game_state::GameState;

/// Save entry listed by `GET /save`, with the game state embedded as an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SaveRecord {
    /// Identifier assigned by the server.
    pub id: String,
    /// RFC 3339 timestamp assigned by the server.
    pub date: String,
    /// Saved game state.
    pub data: GameState,
}

/// Save entry returned by `POST /save` and `GET /save/last`.
///
/// The game state is carried as a JSON string here, unlike [`SaveRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SaveResponse {
    /// Identifier assigned by the server.
    pub id: String,
    /// RFC 3339 timestamp assigned by the server.
    pub date: String,
    /// Game state encoded as a JSON string.
    #[serde(default)]
    pub data: Option<String>,
}

impl SaveResponse {
    /// Decode the embedded game state, treating a missing or blank payload as no save.
    pub fn game_state(&self) -> serde_json::Result<Option<GameState>> {
        match self.data.as_deref().map(str::trim) {
            None | Some("") | Some("null") => Ok(None),
            Some(raw) => GameState::from_json_str(raw).map(Some),
        }
    }
}
