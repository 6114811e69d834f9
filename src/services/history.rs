//! Read-only views over saves: winners, scoreboard and differences between saves.

use indexmap::{IndexMap, IndexSet};

use crate::{
    dto::game_state::{GameState, SavedPlayer},
    state::board::Board,
};

/// One line of the live scoreboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// Identifier of the player.
    pub player_id: String,
    /// Display name.
    pub name: String,
    /// Validated cell count.
    pub score: usize,
    /// Holds the best non-zero score, possibly tied.
    pub leading: bool,
}

/// Players ordered by validated count, ties kept in table order.
pub fn scoreboard(board: &Board) -> Vec<Standing> {
    let best = board
        .players
        .iter()
        .map(|player| player.score())
        .max()
        .unwrap_or(0);

    let mut standings: Vec<Standing> = board
        .players
        .iter()
        .map(|player| Standing {
            player_id: player.id.clone(),
            name: player.name.clone(),
            score: player.score(),
            leading: best > 0 && player.score() == best,
        })
        .collect();
    standings.sort_by(|a, b| b.score.cmp(&a.score));
    standings
}

/// Players of a save holding the highest validated count. Empty when nobody scored.
pub fn winners(state: &GameState) -> Vec<&SavedPlayer> {
    let best = state
        .players
        .iter()
        .map(|player| player.validated_items.len())
        .max()
        .unwrap_or(0);
    if best == 0 {
        return Vec::new();
    }
    state
        .players
        .iter()
        .filter(|player| player.validated_items.len() == best)
        .collect()
}

/// A player kept across two saves under another name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// Name in the older save.
    pub from: String,
    /// Name in the newer save.
    pub to: String,
}

/// A validation that appeared or disappeared between two saves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationChange {
    /// Name of the player owning the cell.
    pub player: String,
    /// Proposition text, or its id when the proposition is gone.
    pub proposition: String,
    /// Only set for added validations.
    pub description: Option<String>,
}

/// What changed from one save to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveDiff {
    /// Names of players only present in the newer save.
    pub players_added: Vec<String>,
    /// Names of players only present in the older save.
    pub players_removed: Vec<String>,
    /// Players whose name changed.
    pub players_renamed: Vec<Rename>,
    /// Validations only present in the newer save.
    pub validations_added: Vec<ValidationChange>,
    /// Validations only present in the older save.
    pub validations_removed: Vec<ValidationChange>,
    /// Texts of propositions only present in the newer save.
    pub propositions_added: Vec<String>,
    /// Texts of propositions only present in the older save.
    pub propositions_removed: Vec<String>,
}

impl SaveDiff {
    /// `true` when both saves hold the same game.
    pub fn is_empty(&self) -> bool {
        self.players_added.is_empty()
            && self.players_removed.is_empty()
            && self.players_renamed.is_empty()
            && self.validations_added.is_empty()
            && self.validations_removed.is_empty()
            && self.propositions_added.is_empty()
            && self.propositions_removed.is_empty()
    }
}

/// Differences between `previous` and `current`, `None` when nothing changed.
///
/// Players are matched by id, or by name for saves that predate player ids.
pub fn diff_saves(current: &GameState, previous: &GameState) -> Option<SaveDiff> {
    let current_players = players_by_key(current);
    let previous_players = players_by_key(previous);
    let mut diff = SaveDiff::default();

    for (key, player) in &current_players {
        let Some(before) = previous_players.get(key) else {
            diff.players_added.push(player.name.clone());
            continue;
        };

        if before.name != player.name {
            diff.players_renamed.push(Rename {
                from: before.name.clone(),
                to: player.name.clone(),
            });
        }

        for (index, item) in &player.validated_items {
            let existed = before
                .validated_items
                .iter()
                .any(|(i, old)| i == index && old.proposition_id == item.proposition_id);
            if !existed {
                diff.validations_added.push(ValidationChange {
                    player: player.name.clone(),
                    proposition: label(current, &item.proposition_id),
                    description: Some(item.description.clone()),
                });
            }
        }

        for (index, item) in &before.validated_items {
            let kept = player
                .validated_items
                .iter()
                .any(|(i, new)| i == index && new.proposition_id == item.proposition_id);
            if !kept {
                diff.validations_removed.push(ValidationChange {
                    player: player.name.clone(),
                    proposition: label(previous, &item.proposition_id),
                    description: None,
                });
            }
        }
    }

    diff.players_removed = previous_players
        .iter()
        .filter(|(key, _)| !current_players.contains_key(*key))
        .map(|(_, player)| player.name.clone())
        .collect();

    let current_texts: IndexSet<&str> = proposition_texts(current);
    let previous_texts: IndexSet<&str> = proposition_texts(previous);
    diff.propositions_added = current_texts
        .difference(&previous_texts)
        .map(|text| text.to_string())
        .collect();
    diff.propositions_removed = previous_texts
        .difference(&current_texts)
        .map(|text| text.to_string())
        .collect();

    (!diff.is_empty()).then_some(diff)
}

fn players_by_key(state: &GameState) -> IndexMap<&str, &SavedPlayer> {
    state
        .players
        .iter()
        .map(|player| {
            let key = if player.id.is_empty() {
                player.name.as_str()
            } else {
                player.id.as_str()
            };
            (key, player)
        })
        .collect()
}

fn proposition_texts(state: &GameState) -> IndexSet<&str> {
    state
        .propositions
        .iter()
        .map(|proposition| proposition.text.as_str())
        .collect()
}

// Validations pointing at a deleted proposition are reported by id.
fn label(state: &GameState, proposition_id: &str) -> String {
    state
        .proposition_text(proposition_id)
        .unwrap_or(proposition_id)
        .to_string()
}
