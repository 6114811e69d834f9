//! Game export and import as standalone JSON files.

use std::path::{Path, PathBuf};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::fs;
use tracing::info;

use crate::dto::game_state::GameState;

use super::{GatewayError, PersistenceError, error::FileGatewayError};

const EXPORT_PREFIX: &str = "bingo-anytime-";

/// File name used when exporting at `at`, e.g. `bingo-anytime-2026-10-16T093000Z.json`.
pub fn export_file_name(at: OffsetDateTime) -> String {
    let at = at
        .to_offset(time::UtcOffset::UTC)
        .replace_nanosecond(0)
        .unwrap_or(at);
    let stamp = at
        .format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    let stamp: String = stamp.chars().filter(|c| *c != ':' && *c != '.').collect();
    format!("{EXPORT_PREFIX}{stamp}.json")
}

/// Write `state` as pretty-printed JSON into `dir` and return the created file.
pub async fn download_game(state: &GameState, dir: &Path) -> Result<PathBuf, PersistenceError> {
    let encoded = serde_json::to_string_pretty(state)
        .map_err(|source| PersistenceError::Io(FileGatewayError::Encode(source)))?;

    fs::create_dir_all(dir).await.map_err(|source| {
        PersistenceError::Io(FileGatewayError::Write {
            path: dir.to_path_buf(),
            source,
        })
    })?;

    let path = dir.join(export_file_name(OffsetDateTime::now_utc()));
    fs::write(&path, encoded).await.map_err(|source| {
        PersistenceError::Io(FileGatewayError::Write {
            path: path.clone(),
            source,
        })
    })?;

    info!(path = %path.display(), "game exported");
    Ok(path)
}

/// Read a previously exported game file.
pub async fn load_game_from_file(path: &Path) -> Result<GameState, GatewayError> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|source| FileGatewayError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let state = GameState::from_json_str(&raw).map_err(|source| FileGatewayError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), players = state.players.len(), "game file read");
    Ok(state)
}
