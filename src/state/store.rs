//! Authoritative in-memory game model together with its reconciliation flags.
//!
//! Every mutation builds a new [`Board`] and swaps it in, so snapshots handed out
//! through [`GameStateStore::snapshot`] never change under the reader.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::game_state::{GameState, Proposition, ValidatedItem},
    state::{
        board::{Board, PlayerState},
        grid::generate_grid,
    },
};

/// Player count used by [`GameStateStore::generate_new_grids`] when the board is empty.
pub const DEFAULT_PLAYER_COUNT: usize = 6;

/// User-facing gate asked before local changes to a loaded game are thrown away.
pub trait ConfirmDiscard: Send + Sync {
    /// Return `true` to discard the unsaved changes and proceed.
    fn confirm_discard(&self) -> bool;
}

/// Gate that always accepts discarding.
pub struct AlwaysDiscard;

impl ConfirmDiscard for AlwaysDiscard {
    fn confirm_discard(&self) -> bool {
        true
    }
}

/// Gate that always refuses discarding.
pub struct NeverDiscard;

impl ConfirmDiscard for NeverDiscard {
    fn confirm_discard(&self) -> bool {
        false
    }
}

/// Gate backed by a one-shot consent flag, armed by the caller right before an
/// operation that may need it and consumed by the first confirmation request.
#[derive(Clone, Default)]
pub struct ConsentFlag {
    armed: Arc<AtomicBool>,
}

impl ConsentFlag {
    /// A disarmed flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant consent for the next confirmation request.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Withdraw any pending consent.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

impl ConfirmDiscard for ConsentFlag {
    fn confirm_discard(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }
}

/// Sizing rules applied to players and grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Cells in each generated grid.
    pub items_per_grid: usize,
    /// Player count below which removals are ignored.
    pub min_players: usize,
    /// Player count at which additions are ignored.
    pub max_players: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            items_per_grid: 6,
            min_players: 0,
            max_players: 100,
        }
    }
}

/// Reconciliation flags tracked next to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreFlags {
    /// A local mutation has not been persisted yet.
    pub is_dirty: bool,
    /// The board came from a remote save, a push or a file rather than fresh generation.
    pub is_loaded_game: bool,
    /// A loaded game was edited locally and neither saved nor cancelled.
    pub has_unsaved_changes: bool,
}

/// Result of a store operation that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The board or the flags changed.
    Applied,
    /// Nothing to do (limit reached, entry absent, identical snapshot, blocked push).
    Unchanged,
    /// The user refused to discard unsaved changes; nothing was touched.
    Declined,
}

impl Outcome {
    /// `true` for [`Outcome::Applied`].
    pub fn is_applied(self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Local operations rejected before touching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A validation needs a non-blank description.
    #[error("a validation requires a description")]
    EmptyDescription,
    /// A proposition needs non-blank text.
    #[error("a proposition requires some text")]
    EmptyProposition,
    /// No player at this position.
    #[error("no player at index {index} (players: {len})")]
    PlayerOutOfRange { index: usize, len: usize },
    /// No cell at this position in the player's grid.
    #[error("no cell at index {index} in a grid of {len} cells")]
    CellOutOfRange { index: usize, len: usize },
}

/// Owner of the live board and its reconciliation flags.
pub struct GameStateStore {
    board: Arc<Board>,
    flags: StoreFlags,
    limits: StoreLimits,
    confirm: Arc<dyn ConfirmDiscard>,
}

impl GameStateStore {
    /// Create a store holding the given propositions and no players.
    pub fn new(
        propositions: Vec<Proposition>,
        limits: StoreLimits,
        confirm: Arc<dyn ConfirmDiscard>,
    ) -> Self {
        Self {
            board: Arc::new(Board::new(propositions)),
            flags: StoreFlags::default(),
            limits,
            confirm,
        }
    }

    /// Current board snapshot.
    pub fn snapshot(&self) -> Arc<Board> {
        Arc::clone(&self.board)
    }

    /// Current board in its wire format.
    pub fn game_state(&self) -> GameState {
        self.board.to_game_state()
    }

    /// Current reconciliation flags.
    pub fn flags(&self) -> StoreFlags {
        self.flags
    }

    /// Sizing rules in force.
    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Whether the background auto-save may persist the current board.
    pub fn autosave_eligible(&self) -> bool {
        let StoreFlags {
            is_dirty,
            is_loaded_game,
            has_unsaved_changes,
        } = self.flags;
        is_dirty && !is_loaded_game && !has_unsaved_changes
    }

    /// Ask the user whether pending changes may be discarded.
    ///
    /// Returns `true` immediately when there is nothing to lose.
    pub fn confirm_unsaved_changes(&self) -> bool {
        !self.flags.has_unsaved_changes || self.confirm.confirm_discard()
    }

    /// Replace every grid with a fresh draw, keeping player identities by position.
    ///
    /// All validations are discarded since their indices refer to the old grids.
    pub fn generate_new_grids(&mut self, player_count: Option<usize>) -> Outcome {
        if !self.confirm_unsaved_changes() {
            return Outcome::Declined;
        }

        let current = &self.board.players;
        let count = player_count
            .unwrap_or(if current.is_empty() {
                DEFAULT_PLAYER_COUNT
            } else {
                current.len()
            })
            .min(self.limits.max_players);

        let propositions = &self.board.propositions;
        let players = (0..count)
            .map(|index| {
                let grid = generate_grid(propositions, self.limits.items_per_grid);
                match current.get(index) {
                    Some(previous) => PlayerState {
                        id: previous.id.clone(),
                        name: previous.name.clone(),
                        grid,
                        validated_items: Default::default(),
                    },
                    None => PlayerState::new(default_player_name(index), grid),
                }
            })
            .collect();

        self.board = Arc::new(Board {
            propositions: self.board.propositions.clone(),
            players,
        });
        self.flags = StoreFlags {
            is_dirty: true,
            is_loaded_game: false,
            has_unsaved_changes: false,
        };
        Outcome::Applied
    }

    /// Append a player with a fresh grid unless the table is full.
    pub fn add_player(&mut self) -> Outcome {
        if self.board.players.len() >= self.limits.max_players {
            return Outcome::Unchanged;
        }

        let mut board = Board::clone(&self.board);
        let grid = generate_grid(&board.propositions, self.limits.items_per_grid);
        board
            .players
            .push(PlayerState::new(default_player_name(board.players.len()), grid));
        self.commit(board)
    }

    /// Remove the player at `index` unless the table is already at its minimum size.
    pub fn remove_player(&mut self, index: usize) -> Result<Outcome, ValidationError> {
        let len = self.board.players.len();
        if len <= self.limits.min_players {
            return Ok(Outcome::Unchanged);
        }
        if index >= len {
            return Err(ValidationError::PlayerOutOfRange { index, len });
        }

        let mut board = Board::clone(&self.board);
        board.players.remove(index);
        Ok(self.commit(board))
    }

    /// Rename a player. Names are free text and need not be unique.
    pub fn update_player_name(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<Outcome, ValidationError> {
        let name = name.into();
        let current = self.player(index)?;
        if current.name == name {
            return Ok(Outcome::Unchanged);
        }

        let mut board = Board::clone(&self.board);
        board.players[index].name = name;
        Ok(self.commit(board))
    }

    /// Mark a cell as validated, replacing any previous validation of that cell.
    pub fn validate_item(
        &mut self,
        player_index: usize,
        item_index: usize,
        description: &str,
    ) -> Result<Outcome, ValidationError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ValidationError::EmptyDescription);
        }

        let player = self.player(player_index)?;
        let Some(proposition_id) = player.grid.get(item_index) else {
            return Err(ValidationError::CellOutOfRange {
                index: item_index,
                len: player.grid.len(),
            });
        };

        let item = ValidatedItem {
            proposition_id: proposition_id.clone(),
            description: description.to_string(),
            timestamp: now_millis(),
        };

        let mut board = Board::clone(&self.board);
        board.players[player_index]
            .validated_items
            .insert(item_index, item);
        Ok(self.commit(board))
    }

    /// Clear a cell validation; absent validations are left alone.
    pub fn remove_validation(
        &mut self,
        player_index: usize,
        item_index: usize,
    ) -> Result<Outcome, ValidationError> {
        if !self
            .player(player_index)?
            .validated_items
            .contains_key(&item_index)
        {
            return Ok(Outcome::Unchanged);
        }

        let mut board = Board::clone(&self.board);
        board.players[player_index]
            .validated_items
            .remove(&item_index);
        Ok(self.commit(board))
    }

    /// Append a proposition under a fresh id. Blank texts are rejected.
    pub fn add_proposition(&mut self, text: &str) -> Result<Outcome, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyProposition);
        }

        let mut board = Board::clone(&self.board);
        board.propositions.push(Proposition {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
        });
        Ok(self.commit(board))
    }

    /// Remove a proposition from the shared list.
    ///
    /// Grids that reference it keep the dangling id.
    pub fn remove_proposition(&mut self, id: &str) -> Outcome {
        if !self.board.propositions.iter().any(|p| p.id == id) {
            return Outcome::Unchanged;
        }

        let mut board = Board::clone(&self.board);
        board.propositions.retain(|p| p.id != id);
        self.commit(board)
    }

    /// Replace the whole board with a loaded game state.
    pub fn load_game_state(&mut self, state: GameState, mark_dirty: bool) -> Outcome {
        if !self.confirm_unsaved_changes() {
            return Outcome::Declined;
        }

        self.board = Arc::new(Board::from(state));
        if mark_dirty {
            self.flags.is_dirty = true;
        }
        self.flags.is_loaded_game = true;
        self.flags.has_unsaved_changes = false;
        Outcome::Applied
    }

    /// Apply a snapshot pushed by another client.
    ///
    /// Pushes are dropped while local unsaved changes exist, and a snapshot equal to
    /// the current board is ignored.
    pub fn apply_remote(&mut self, state: GameState) -> Outcome {
        if self.flags.has_unsaved_changes {
            debug!("remote snapshot dropped: local changes are unsaved");
            return Outcome::Unchanged;
        }

        let board = Board::from(state);
        if board == *self.board {
            return Outcome::Unchanged;
        }

        self.board = Arc::new(board);
        self.flags.is_loaded_game = true;
        Outcome::Applied
    }

    /// Drop the unsaved-changes guard once the user agreed to throw those edits away.
    pub fn discard_unsaved_changes(&mut self) {
        self.flags.has_unsaved_changes = false;
    }

    /// Record a successful background save.
    pub fn mark_autosaved(&mut self) {
        self.flags.is_dirty = false;
    }

    /// Record a successful manual save of `saved`.
    ///
    /// When the board moved on while the save was in flight only the loaded-game
    /// guard is lifted, so the newer edits stay dirty.
    pub fn mark_saved(&mut self, saved: &Arc<Board>) {
        if Arc::ptr_eq(saved, &self.board) {
            self.flags.is_dirty = false;
        }
        self.flags.is_loaded_game = false;
        self.flags.has_unsaved_changes = false;
    }

    fn player(&self, index: usize) -> Result<&PlayerState, ValidationError> {
        self.board
            .players
            .get(index)
            .ok_or(ValidationError::PlayerOutOfRange {
                index,
                len: self.board.players.len(),
            })
    }

    /// Swap in a locally edited board and update the flags accordingly.
    fn commit(&mut self, board: Board) -> Outcome {
        self.board = Arc::new(board);
        self.flags.is_dirty = true;
        if self.flags.is_loaded_game {
            self.flags.has_unsaved_changes = true;
        }
        Outcome::Applied
    }
}

fn default_player_name(index: usize) -> String {
    format!("Joueur {}", index + 1)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::game_state::SavedPlayer;

    fn propositions(count: usize) -> Vec<Proposition> {
        (1..=count)
            .map(|i| Proposition {
                id: format!("p{i}"),
                text: format!("statement {i}"),
            })
            .collect()
    }

    fn store_with(confirm: Arc<dyn ConfirmDiscard>) -> GameStateStore {
        GameStateStore::new(propositions(20), StoreLimits::default(), confirm)
    }

    fn store() -> GameStateStore {
        store_with(Arc::new(NeverDiscard))
    }

    fn saved_state() -> GameState {
        GameState {
            players: vec![SavedPlayer {
                id: "a".into(),
                name: "Ana".into(),
                grid: (1..=6).map(|i| format!("p{i}")).collect(),
                validated_items: vec![(
                    1,
                    ValidatedItem {
                        proposition_id: "p2".into(),
                        description: "vu".into(),
                        timestamp: 10,
                    },
                )],
            }],
            propositions: propositions(20),
        }
    }

    fn assert_keys_in_grid(store: &GameStateStore) {
        for player in &store.snapshot().players {
            assert!(player.validated_items.keys().all(|i| *i < player.grid.len()));
        }
    }

    #[test]
    fn generating_from_empty_board() {
        let mut store = store();
        assert_eq!(store.generate_new_grids(Some(3)), Outcome::Applied);

        let board = store.snapshot();
        assert_eq!(board.players.len(), 3);
        assert!(board.players.iter().all(|p| p.grid.len() == 6));
        assert!(board.players.iter().all(|p| p.validated_items.is_empty()));
        assert_eq!(board.players[2].name, "Joueur 3");
        assert!(store.flags().is_dirty);
        assert!(store.autosave_eligible());
    }

    #[test]
    fn generating_defaults_to_six_players_then_current_count() {
        let mut store = store();
        store.generate_new_grids(None);
        assert_eq!(store.snapshot().players.len(), 6);

        store.remove_player(0).unwrap();
        store.generate_new_grids(None);
        assert_eq!(store.snapshot().players.len(), 5);
    }

    #[test]
    fn regeneration_keeps_identities_and_drops_validations() {
        let mut store = store();
        store.generate_new_grids(Some(2));
        store.update_player_name(0, "Ana").unwrap();
        store.validate_item(0, 0, "done").unwrap();
        let before = store.snapshot();

        store.generate_new_grids(Some(3));
        let after = store.snapshot();
        assert_eq!(after.players[0].id, before.players[0].id);
        assert_eq!(after.players[0].name, "Ana");
        assert_eq!(after.players[1].id, before.players[1].id);
        assert!(after.players.iter().all(|p| p.validated_items.is_empty()));
    }

    #[test]
    fn validate_item_records_proposition_and_time() {
        let mut store = store();
        store.load_game_state(saved_state(), false);
        let before = now_millis();

        store.validate_item(0, 2, "it happened").unwrap();

        let board = store.snapshot();
        let item = board.players[0].validated_items.get(&2).unwrap();
        assert_eq!(item.proposition_id, "p3");
        assert_eq!(item.description, "it happened");
        assert!(item.timestamp >= before && item.timestamp <= now_millis());
    }

    #[test]
    fn revalidation_replaces_entry() {
        let mut store = store();
        store.generate_new_grids(Some(1));
        store.validate_item(0, 4, "first").unwrap();
        store.validate_item(0, 4, "second").unwrap();

        let board = store.snapshot();
        assert_eq!(board.players[0].score(), 1);
        assert_eq!(board.players[0].validated_items[&4].description, "second");
    }

    #[test]
    fn validate_item_rejects_bad_input() {
        let mut store = store();
        store.generate_new_grids(Some(1));
        let before = store.snapshot();

        assert_eq!(
            store.validate_item(0, 0, "   "),
            Err(ValidationError::EmptyDescription)
        );
        assert_eq!(
            store.validate_item(0, 6, "x"),
            Err(ValidationError::CellOutOfRange { index: 6, len: 6 })
        );
        assert_eq!(
            store.validate_item(4, 0, "x"),
            Err(ValidationError::PlayerOutOfRange { index: 4, len: 1 })
        );
        assert_eq!(*store.snapshot(), *before);
        assert_keys_in_grid(&store);
    }

    #[test]
    fn remove_validation_twice_is_noop() {
        let mut store = store();
        store.generate_new_grids(Some(1));
        store.validate_item(0, 1, "yes").unwrap();

        assert_eq!(store.remove_validation(0, 1), Ok(Outcome::Applied));
        let after_first = store.snapshot();
        assert_eq!(store.remove_validation(0, 1), Ok(Outcome::Unchanged));
        assert!(Arc::ptr_eq(&after_first, &store.snapshot()));
    }

    #[test]
    fn add_player_stops_at_max() {
        let limits = StoreLimits {
            max_players: 2,
            ..StoreLimits::default()
        };
        let mut store = GameStateStore::new(propositions(10), limits, Arc::new(NeverDiscard));
        assert_eq!(store.add_player(), Outcome::Applied);
        assert_eq!(store.add_player(), Outcome::Applied);
        assert_eq!(store.add_player(), Outcome::Unchanged);
        assert_eq!(store.snapshot().players.len(), 2);
        assert_eq!(store.snapshot().players[1].name, "Joueur 2");
    }

    #[test]
    fn remove_player_stops_at_min() {
        let limits = StoreLimits {
            min_players: 1,
            ..StoreLimits::default()
        };
        let mut store = GameStateStore::new(propositions(10), limits, Arc::new(NeverDiscard));
        store.generate_new_grids(Some(2));
        assert_eq!(store.remove_player(1), Ok(Outcome::Applied));
        assert_eq!(store.remove_player(0), Ok(Outcome::Unchanged));
        assert_eq!(store.snapshot().players.len(), 1);
    }

    #[test]
    fn removed_proposition_stays_in_grids() {
        let mut store = store();
        store.load_game_state(saved_state(), false);
        assert_eq!(store.remove_proposition("p1"), Outcome::Applied);
        assert_eq!(store.remove_proposition("p1"), Outcome::Unchanged);

        let board = store.snapshot();
        assert_eq!(board.players[0].grid[0], "p1");
        assert_eq!(board.proposition_text("p1"), "");
    }

    #[test]
    fn add_proposition_trims_and_rejects_blank() {
        let mut store = store();
        assert_eq!(
            store.add_proposition("  "),
            Err(ValidationError::EmptyProposition)
        );
        store.add_proposition("  Quelqu'un chante ").unwrap();
        let board = store.snapshot();
        assert_eq!(board.propositions.last().unwrap().text, "Quelqu'un chante");
        assert_eq!(board.propositions.len(), 21);
    }

    #[test]
    fn edits_after_load_raise_unsaved_guard() {
        let mut store = store();
        assert_eq!(store.load_game_state(saved_state(), true), Outcome::Applied);
        assert!(store.flags().is_loaded_game);
        assert!(!store.flags().has_unsaved_changes);
        assert!(!store.autosave_eligible());

        store.add_player();
        assert!(store.flags().has_unsaved_changes);

        // NeverDiscard refuses, so regeneration is blocked.
        let before = store.snapshot();
        assert_eq!(store.generate_new_grids(None), Outcome::Declined);
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
        assert_eq!(
            store.load_game_state(saved_state(), true),
            Outcome::Declined
        );
    }

    #[test]
    fn every_local_edit_on_loaded_game_sets_guard() {
        type Edit = fn(&mut GameStateStore);
        let edits: [Edit; 6] = [
            |s| {
                s.remove_player(0).unwrap();
            },
            |s| {
                s.update_player_name(0, "Bob").unwrap();
            },
            |s| {
                s.validate_item(0, 0, "ok").unwrap();
            },
            |s| {
                s.remove_validation(0, 1).unwrap();
            },
            |s| {
                s.add_proposition("new").unwrap();
            },
            |s| {
                s.remove_proposition("p20");
            },
        ];

        for edit in edits {
            let mut store = store();
            store.load_game_state(saved_state(), false);
            edit(&mut store);
            assert!(store.flags().has_unsaved_changes);
            assert!(store.flags().is_dirty);
        }
    }

    #[test]
    fn confirmed_discard_allows_regeneration() {
        let consent = ConsentFlag::new();
        let mut store = store_with(Arc::new(consent.clone()));
        store.load_game_state(saved_state(), false);
        store.add_player();

        assert_eq!(store.generate_new_grids(None), Outcome::Declined);
        consent.arm();
        assert_eq!(store.generate_new_grids(None), Outcome::Applied);
        assert_eq!(store.flags(), StoreFlags {
            is_dirty: true,
            is_loaded_game: false,
            has_unsaved_changes: false,
        });
        // consent is single use
        assert!(!consent.confirm_discard());
    }

    #[test]
    fn remote_push_is_dropped_while_unsaved() {
        let mut store = store();
        store.load_game_state(saved_state(), false);
        store.update_player_name(0, "Local").unwrap();
        let before = store.snapshot();

        let mut remote = saved_state();
        remote.players[0].name = "Remote".into();
        assert_eq!(store.apply_remote(remote), Outcome::Unchanged);
        assert_eq!(*store.snapshot(), *before);
    }

    #[test]
    fn remote_push_does_not_mark_dirty() {
        let mut store = store();
        assert_eq!(store.apply_remote(saved_state()), Outcome::Applied);
        assert!(!store.flags().is_dirty);
        assert!(store.flags().is_loaded_game);
        assert_eq!(store.apply_remote(saved_state()), Outcome::Unchanged);
    }

    #[test]
    fn manual_save_lifts_guards() {
        let mut store = store();
        store.load_game_state(saved_state(), false);
        store.add_player();
        let saved = store.snapshot();

        store.mark_saved(&saved);
        assert_eq!(store.flags(), StoreFlags::default());
    }

    #[test]
    fn manual_save_of_stale_board_keeps_dirty() {
        let mut store = store();
        store.load_game_state(saved_state(), false);
        store.add_player();
        let saved = store.snapshot();
        store.add_player();

        store.mark_saved(&saved);
        assert!(store.flags().is_dirty);
        assert!(store.autosave_eligible());
    }

    #[test]
    fn discarding_lets_a_load_through_without_asking() {
        let mut store = store();
        store.load_game_state(saved_state(), false);
        store.add_player();
        assert!(store.flags().has_unsaved_changes);

        store.discard_unsaved_changes();
        assert_eq!(store.load_game_state(saved_state(), false), Outcome::Applied);
        assert_eq!(store.snapshot().players.len(), 1);
    }
}
