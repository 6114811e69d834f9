use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::{
    format_system_time,
    game_state::GameState,
    save::{SaveRecord, SaveResponse},
};

/// Save entry persisted by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveEntity {
    /// Primary key of the save.
    pub id: Uuid,
    /// Moment the save was received.
    pub date: SystemTime,
    /// Game state as submitted by the client.
    pub data: GameState,
}

impl SaveEntity {
    /// Stamp a freshly received game state with an id and the current time.
    pub fn new(data: GameState) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: SystemTime::now(),
            data,
        }
    }
}

impl From<SaveEntity> for SaveRecord {
    fn from(entity: SaveEntity) -> Self {
        Self {
            id: entity.id.to_string(),
            date: format_system_time(entity.date),
            data: entity.data,
        }
    }
}

impl TryFrom<SaveEntity> for SaveResponse {
    type Error = serde_json::Error;

    fn try_from(entity: SaveEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id.to_string(),
            date: format_system_time(entity.date),
            data: Some(serde_json::to_string(&entity.data)?),
        })
    }
}
