//! Game state held by the client and shared state of the backend.

pub mod autosave;
pub mod board;
pub mod grid;
mod push;
pub mod store;

use std::sync::Arc;

use crate::dao::save_store::SaveStore;

pub use self::push::{PushHub, PushState};

/// Handle on [`AppState`] cloned into every handler.
pub type SharedState = Arc<AppState>;

/// Broadcast capacity of the push hub.
pub const PUSH_CAPACITY: usize = 64;

/// Server-side state shared by every request handler and socket task.
pub struct AppState {
    save_store: Arc<dyn SaveStore>,
    push: PushState,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(save_store: Arc<dyn SaveStore>) -> SharedState {
        Arc::new(Self {
            save_store,
            push: PushState::new(PUSH_CAPACITY),
        })
    }

    /// Backend holding the save history.
    pub fn save_store(&self) -> Arc<dyn SaveStore> {
        Arc::clone(&self.save_store)
    }

    /// Push hub and socket registry.
    pub fn push(&self) -> &PushState {
        &self.push
    }
}
