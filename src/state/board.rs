//! Immutable board snapshots and their wire conversions.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::dto::game_state::{GameState, Proposition, SavedPlayer, ValidatedItem};

/// Runtime view of a player, with validations keyed by grid index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    /// Stable identifier, kept across grid regenerations.
    pub id: String,
    /// Free-text display name.
    pub name: String,
    /// Proposition ids, one per cell.
    pub grid: Vec<String>,
    /// Validations keyed by cell index; every key is below `grid.len()`.
    pub validated_items: HashMap<usize, ValidatedItem>,
}

impl PlayerState {
    /// Build a player with an empty validation set and a freshly allocated id.
    pub fn new(name: impl Into<String>, grid: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            grid,
            validated_items: HashMap::new(),
        }
    }

    /// Number of validated cells, which is the player's score.
    pub fn score(&self) -> usize {
        self.validated_items.len()
    }
}

/// Immutable snapshot of a game: the shared propositions plus every player.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    /// Propositions grids draw from.
    pub propositions: Vec<Proposition>,
    /// Players in table order.
    pub players: Vec<PlayerState>,
}

impl Board {
    /// A board with no players.
    pub fn new(propositions: Vec<Proposition>) -> Self {
        Self {
            propositions,
            players: Vec::new(),
        }
    }

    /// Display text of a proposition; removed propositions resolve to an empty string.
    pub fn proposition_text(&self, id: &str) -> &str {
        self.propositions
            .iter()
            .find(|proposition| proposition.id == id)
            .map(|proposition| proposition.text.as_str())
            .unwrap_or("")
    }

    /// Encode the board into the wire format, with validation pairs ordered by index.
    pub fn to_game_state(&self) -> GameState {
        GameState {
            players: self.players.iter().map(SavedPlayer::from).collect(),
            propositions: self.propositions.clone(),
        }
    }
}

impl From<&PlayerState> for SavedPlayer {
    fn from(player: &PlayerState) -> Self {
        let mut validated_items: Vec<(usize, ValidatedItem)> = player
            .validated_items
            .iter()
            .map(|(index, item)| (*index, item.clone()))
            .collect();
        validated_items.sort_by_key(|(index, _)| *index);

        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            grid: player.grid.clone(),
            validated_items,
        }
    }
}

impl From<SavedPlayer> for PlayerState {
    fn from(player: SavedPlayer) -> Self {
        let id = if player.id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            player.id
        };

        let grid_len = player.grid.len();
        let mut validated_items = HashMap::with_capacity(player.validated_items.len());
        for (index, item) in player.validated_items {
            if index >= grid_len {
                warn!(
                    player = %player.name,
                    index,
                    grid_len,
                    "dropping validation outside of the player grid"
                );
                continue;
            }
            validated_items.insert(index, item);
        }

        Self {
            id,
            name: player.name,
            grid: player.grid,
            validated_items,
        }
    }
}

impl From<GameState> for Board {
    fn from(state: GameState) -> Self {
        Self {
            propositions: state.propositions,
            players: state.players.into_iter().map(Into::into).collect(),
        }
    }
}
