use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the save store and report the push channel population.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let connected_users = state.push().connected_users().connected_users;

    match state.save_store().health_check().await {
        Ok(()) => HealthResponse::ok(connected_users),
        Err(err) => {
            warn!(error = %err, "save store health check failed");
            HealthResponse::degraded(connected_users)
        }
    }
}
