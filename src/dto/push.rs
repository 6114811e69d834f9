//! Events sent over the push socket.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::game_state::GameState;

/// Frames sent by the server on the `/save` push channel.
///
/// Serialized as `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "event", content = "data")]
pub enum PushEvent {
    /// Sent once to a socket right after it connects.
    #[serde(rename = "connected")]
    Connected(ConnectedUsers),
    /// Broadcast whenever a socket joins or leaves.
    #[serde(rename = "users-updated")]
    UsersUpdated(ConnectedUsers),
    /// Broadcast after every successful save.
    #[serde(rename = "new-changes")]
    NewChanges(NewChanges),
}

impl PushEvent {
    /// Parse a text frame received from the push channel.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Number of sockets currently attached to the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedUsers {
    /// Attached socket count.
    pub connected_users: u32,
}

/// Full game state saved by some client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewChanges {
    /// The saved state.
    pub data: GameState,
}
