//! Client session logic and backend services.

/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Winners, scoreboard and save differences.
pub mod history;
/// Client side of the push channel.
pub mod push_client;
/// Server side of the push channel.
pub mod push_service;
/// Save history operations of the backend.
pub mod save_service;
/// Client session loop.
pub mod session;
