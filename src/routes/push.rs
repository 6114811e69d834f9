//! WebSocket upgrade of the push channel.

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::push_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/save",
    tag = "push",
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a push socket receiving `connected`, `users-updated`
/// and `new-changes` frames.
pub async fn push_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| push_service::handle_socket(state, socket))
}

/// Configure the push endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/save", get(push_handler))
}
