use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the Bingo Anytime backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::save::create_save,
        crate::routes::save::list_saves,
        crate::routes::save::last_save,
        crate::routes::push::push_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game_state::GameState,
            crate::dto::game_state::SavedPlayer,
            crate::dto::game_state::Proposition,
            crate::dto::game_state::ValidatedItem,
            crate::dto::save::SaveRecord,
            crate::dto::save::SaveResponse,
            crate::dto::push::PushEvent,
            crate::dto::push::ConnectedUsers,
            crate::dto::push::NewChanges,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "save", description = "Game save history"),
        (name = "push", description = "WebSocket channel broadcasting saves and user counts"),
    )
)]
pub struct ApiDoc;
