//! Persistence gateway: the remote save API and local game files.

pub mod error;
pub mod file;
mod http;

pub use file::{download_game, export_file_name, load_game_from_file};
pub use http::HttpSaveGateway;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use thiserror::Error;

use crate::dto::{game_state::GameState, save::SaveRecord};

use self::error::{FileGatewayError, HttpGatewayError};

/// Remote or file I/O failure.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The save API could not be reached.
    #[error("save server unreachable")]
    Network(#[source] HttpGatewayError),
    /// The save API did not answer before the request timeout.
    #[error("save request timed out")]
    Timeout(#[source] HttpGatewayError),
    /// The save API answered with a non-success status.
    #[error("save server answered {status}")]
    Status {
        /// Status the server answered with.
        status: StatusCode,
        /// Classified request failure.
        #[source]
        source: HttpGatewayError,
    },
    /// A local game file could not be read or written.
    #[error("game file unavailable")]
    Io(#[source] FileGatewayError),
}

/// Payload that is not a well-formed game state.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed data returned by the save API.
    #[error("malformed game state received from the save server")]
    Remote(#[source] HttpGatewayError),
    /// Malformed game file.
    #[error("malformed game file")]
    File(#[source] FileGatewayError),
}

/// Any failure surfaced by the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The data could not be fetched.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// The data arrived but is not a game state.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<HttpGatewayError> for GatewayError {
    fn from(err: HttpGatewayError) -> Self {
        if err.is_malformed() {
            GatewayError::Parse(ParseError::Remote(err))
        } else {
            GatewayError::Persistence(err.into())
        }
    }
}

impl From<HttpGatewayError> for PersistenceError {
    fn from(err: HttpGatewayError) -> Self {
        if err.is_timeout() {
            return PersistenceError::Timeout(err);
        }
        match err {
            HttpGatewayError::RequestStatus { status, .. } => PersistenceError::Status {
                status,
                source: err,
            },
            other => PersistenceError::Network(other),
        }
    }
}

impl From<FileGatewayError> for GatewayError {
    fn from(err: FileGatewayError) -> Self {
        match err {
            FileGatewayError::Decode { .. } => GatewayError::Parse(ParseError::File(err)),
            other => GatewayError::Persistence(PersistenceError::Io(other)),
        }
    }
}

/// Remote save API as seen by the client session.
pub trait SaveGateway: Send + Sync {
    /// Upload a snapshot; the server stamps and broadcasts it.
    fn save_game(&self, state: GameState) -> BoxFuture<'static, Result<(), PersistenceError>>;
    /// Save history, most recent first.
    fn list_saves(&self) -> BoxFuture<'static, Result<Vec<SaveRecord>, GatewayError>>;
    /// Most recent save, `None` when the server holds nothing usable.
    fn load_last_game(&self) -> BoxFuture<'static, Result<Option<GameState>, GatewayError>>;
}
