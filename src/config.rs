//! Client configuration loading: endpoints, timings, table limits and seeded propositions.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dto::game_state::Proposition,
    services::{push_client::PushChannelConfig, session::SessionSettings},
    state::store::StoreLimits,
};

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/client.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BINGO_ANYTIME_CONFIG_PATH";
const ORIGIN_ENV: &str = "BINGO_ANYTIME_ORIGIN";
const API_URL_ENV: &str = "BINGO_ANYTIME_API_URL";
const PUSH_URL_ENV: &str = "BINGO_ANYTIME_PUSH_URL";
const SHOW_ALL_BUTTONS_ENV: &str = "BINGO_ANYTIME_SHOW_ALL_BUTTONS";

const LOCAL_API_URL: &str = "http://localhost:3200/api";
const LOCAL_PUSH_URL: &str = "ws://localhost:3200/save";

#[derive(Debug, Clone)]
/// Immutable runtime configuration of the client.
pub struct ClientConfig {
    /// Base URL of the REST save API.
    pub api_url: String,
    /// WebSocket endpoint of the push channel.
    pub push_url: String,
    /// Upper bound of every save API request.
    pub request_timeout: Duration,
    /// Quiet period before an auto-save fires.
    pub autosave_delay: Duration,
    /// First push reconnection delay, doubled on each failure.
    pub reconnect_initial_delay: Duration,
    /// Cap of the reconnection delay.
    pub reconnect_max_delay: Duration,
    /// Failed connections tolerated before going offline.
    pub reconnect_attempts: u32,
    /// Exposes the file export and import commands.
    pub show_all_buttons: bool,
    /// Directory receiving exported games.
    pub export_dir: PathBuf,
    /// Player and grid sizing.
    pub limits: StoreLimits,
    /// Propositions seeded into a fresh board.
    pub propositions: Vec<Proposition>,
}

impl ClientConfig {
    /// Load the configuration from disk, fall back to built-in defaults, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        propositions = config.propositions.len(),
                        "loaded client config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Apply overrides read through `lookup`.
    ///
    /// An origin switches both endpoints to the hosted deployment; explicit URLs win over it.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(origin) = lookup(ORIGIN_ENV) {
            let origin = origin.trim_end_matches('/');
            self.api_url = format!("{origin}/api");
            self.push_url = format!("{}/save", websocket_origin(origin));
        }
        if let Some(url) = lookup(API_URL_ENV) {
            self.api_url = url;
        }
        if let Some(url) = lookup(PUSH_URL_ENV) {
            self.push_url = url;
        }
        if let Some(flag) = lookup(SHOW_ALL_BUTTONS_ENV) {
            self.show_all_buttons = !matches!(flag.trim(), "0" | "false" | "no" | "off");
        }
    }

    /// Settings of the push connection task.
    pub fn push_channel(&self) -> PushChannelConfig {
        PushChannelConfig {
            url: self.push_url.clone(),
            initial_delay: self.reconnect_initial_delay,
            max_delay: self.reconnect_max_delay,
            max_attempts: self.reconnect_attempts,
        }
    }

    /// Settings of the game session loop.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            autosave_delay: self.autosave_delay,
            export_dir: self.export_dir.clone(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: LOCAL_API_URL.into(),
            push_url: LOCAL_PUSH_URL.into(),
            request_timeout: Duration::from_secs(10),
            autosave_delay: Duration::from_millis(1_000),
            reconnect_initial_delay: Duration::from_millis(1_000),
            reconnect_max_delay: Duration::from_millis(5_000),
            reconnect_attempts: 10,
            show_all_buttons: false,
            export_dir: PathBuf::from("."),
            limits: StoreLimits::default(),
            propositions: default_propositions(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    api_url: Option<String>,
    push_url: Option<String>,
    request_timeout_ms: Option<u64>,
    autosave_delay_ms: Option<u64>,
    reconnect_initial_delay_ms: Option<u64>,
    reconnect_max_delay_ms: Option<u64>,
    reconnect_attempts: Option<u32>,
    show_all_buttons: Option<bool>,
    export_dir: Option<PathBuf>,
    items_per_grid: Option<usize>,
    min_players: Option<usize>,
    max_players: Option<usize>,
    propositions: Option<Vec<Proposition>>,
}

impl From<RawConfig> for ClientConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        let millis = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };

        Self {
            api_url: raw.api_url.unwrap_or(defaults.api_url),
            push_url: raw.push_url.unwrap_or(defaults.push_url),
            request_timeout: millis(raw.request_timeout_ms, defaults.request_timeout),
            autosave_delay: millis(raw.autosave_delay_ms, defaults.autosave_delay),
            reconnect_initial_delay: millis(
                raw.reconnect_initial_delay_ms,
                defaults.reconnect_initial_delay,
            ),
            reconnect_max_delay: millis(raw.reconnect_max_delay_ms, defaults.reconnect_max_delay),
            reconnect_attempts: raw.reconnect_attempts.unwrap_or(defaults.reconnect_attempts),
            show_all_buttons: raw.show_all_buttons.unwrap_or(defaults.show_all_buttons),
            export_dir: raw.export_dir.unwrap_or(defaults.export_dir),
            limits: StoreLimits {
                items_per_grid: raw.items_per_grid.unwrap_or(defaults.limits.items_per_grid),
                min_players: raw.min_players.unwrap_or(defaults.limits.min_players),
                max_players: raw.max_players.unwrap_or(defaults.limits.max_players),
            },
            propositions: raw
                .propositions
                .filter(|propositions| !propositions.is_empty())
                .unwrap_or(defaults.propositions),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn websocket_origin(origin: &str) -> String {
    if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        origin.to_string()
    }
}

/// Built-in propositions shipped with the binary.
pub fn default_propositions() -> Vec<Proposition> {
    [
        "Quelqu'un arrive en retard",
        "On parle de la météo",
        "Quelqu'un boit du café",
        "On mentionne un projet en cours",
        "Quelqu'un vérifie son téléphone",
        "On parle de weekend",
        "Quelqu'un pose une question technique",
        "On évoque les vacances",
        "Quelqu'un mange quelque chose",
        "On parle d'un collègue absent",
        "Quelqu'un fait une blague",
        "On mentionne un client",
        "Quelqu'un bâille",
        "On parle de sport",
        "Quelqu'un prend des notes",
        "On évoque un problème technique",
        "Quelqu'un dit 'exactement'",
        "On parle de budget",
        "Quelqu'un regarde par la fenêtre",
        "On mentionne une deadline",
    ]
    .into_iter()
    .enumerate()
    .map(|(index, text)| Proposition {
        id: (index + 1).to_string(),
        text: text.to_string(),
    })
    .collect()
}
