//! REST routes of the save history.

use axum::{Json, Router, extract::State, routing::get};
use axum_valid::Valid;

use crate::{
    dto::{
        game_state::GameState,
        save::{SaveRecord, SaveResponse},
    },
    error::AppError,
    services::save_service,
    state::SharedState,
};

/// Routes of the save history.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/save", get(list_saves).post(create_save))
        .route("/save/last", get(last_save))
}

/// Store a game state and broadcast it to every push socket.
#[utoipa::path(
    post,
    path = "/api/save",
    tag = "save",
    request_body = GameState,
    responses(
        (status = 200, description = "Save stored", body = SaveResponse),
        (status = 400, description = "Malformed game state")
    )
)]
pub async fn create_save(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GameState>>,
) -> Result<Json<SaveResponse>, AppError> {
    let saved = save_service::save_game(&state, payload).await?;
    Ok(Json(saved))
}

/// Every save, most recent first.
#[utoipa::path(
    get,
    path = "/api/save",
    tag = "save",
    responses((status = 200, description = "Save history", body = [SaveRecord]))
)]
pub async fn list_saves(State(state): State<SharedState>) -> Result<Json<Vec<SaveRecord>>, AppError> {
    let saves = save_service::list_saves(&state).await?;
    Ok(Json(saves))
}

/// Most recent save.
#[utoipa::path(
    get,
    path = "/api/save/last",
    tag = "save",
    responses(
        (status = 200, description = "Latest save", body = SaveResponse),
        (status = 404, description = "No save yet")
    )
)]
pub async fn last_save(State(state): State<SharedState>) -> Result<Json<SaveResponse>, AppError> {
    let save = save_service::last_save(&state).await?;
    Ok(Json(save))
}
