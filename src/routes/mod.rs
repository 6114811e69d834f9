//! HTTP and WebSocket routes of the backend.

use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod push;
pub mod save;

/// Compose all route trees, wiring in shared state and documentation routes.
///
/// The REST surface lives under `/api`, the push socket at `/save`.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(push::router())
        .nest("/api", save::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
