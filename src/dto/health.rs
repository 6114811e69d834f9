//! Health check payload.

use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when the save store answers, "degraded" otherwise.
    pub status: String,
    /// Sockets currently attached to the push channel.
    pub connected_users: u32,
}

impl HealthResponse {
    /// Healthy answer.
    pub fn ok(connected_users: u32) -> Self {
        Self {
            status: "ok".to_string(),
            connected_users,
        }
    }

    /// Answer sent when the save store fails its probe.
    pub fn degraded(connected_users: u32) -> Self {
        Self {
            status: "degraded".to_string(),
            connected_users,
        }
    }
}
