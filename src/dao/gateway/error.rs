//! Error types raised by the gateway implementations before they are classified.

use std::{io, path::PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

/// Failures that can occur while talking to the save API.
#[derive(Debug, Error)]
pub enum HttpGatewayError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build save API client")]
    ClientBuilder {
        /// Builder failure reported by reqwest.
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or no answer arrived in time.
    #[error("failed to send save API request to `{path}`")]
    RequestSend {
        /// Path relative to the API base URL.
        path: String,
        /// Transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The save API answered with an unexpected status code.
    #[error("unexpected save API response status {status} for `{path}`")]
    RequestStatus {
        /// Path relative to the API base URL.
        path: String,
        /// Status the server answered with.
        status: StatusCode,
    },
    /// The response body could not be read to the end.
    #[error("failed to read save API response for `{path}`")]
    ReadBody {
        /// Path relative to the API base URL.
        path: String,
        /// Failure raised while streaming the body.
        #[source]
        source: reqwest::Error,
    },
    /// The body or the game state embedded in it is not valid JSON for the expected model.
    #[error("failed to deserialize save API value for `{path}`")]
    DeserializeValue {
        /// Path relative to the API base URL.
        path: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

impl HttpGatewayError {
    /// `true` when the failure comes from the request timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            HttpGatewayError::RequestSend { source, .. }
            | HttpGatewayError::ReadBody { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// `true` when the answer arrived in full but does not hold the expected data.
    pub fn is_malformed(&self) -> bool {
        matches!(self, HttpGatewayError::DeserializeValue { .. })
    }
}

/// Failures raised while exporting or importing game files.
#[derive(Debug, Error)]
pub enum FileGatewayError {
    /// The file could not be read.
    #[error("failed to read game file `{path}`")]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file or its directory could not be written.
    #[error("failed to write game file `{path}`")]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Serializing the game state failed.
    #[error("failed to encode game state")]
    Encode(#[source] serde_json::Error),
    /// The file content is not a game state.
    #[error("game file `{path}` is not a valid game state")]
    Decode {
        /// File being decoded.
        path: PathBuf,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
}
