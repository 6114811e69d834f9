use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, warn};

use crate::dto::{
    game_state::GameState,
    save::{SaveRecord, SaveResponse},
};

use super::{GatewayError, PersistenceError, SaveGateway, error::HttpGatewayError};

const SAVE_PATH: &str = "save";
const LAST_SAVE_PATH: &str = "save/last";

/// [`SaveGateway`] backed by the REST save API.
#[derive(Clone)]
pub struct HttpSaveGateway {
    client: Client,
    base_url: Arc<str>,
}

impl HttpSaveGateway {
    /// Build a gateway against `base_url` (e.g. `http://localhost:3200/api`).
    ///
    /// Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpGatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| HttpGatewayError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<reqwest::Response, HttpGatewayError> {
        builder
            .send()
            .await
            .map_err(|source| HttpGatewayError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    async fn post_save(&self, state: GameState) -> Result<(), HttpGatewayError> {
        let response = self
            .send(self.request(Method::POST, SAVE_PATH).json(&state), SAVE_PATH)
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(HttpGatewayError::RequestStatus {
                path: SAVE_PATH.to_string(),
                status,
            }),
        }
    }

    async fn get_saves(&self) -> Result<Vec<SaveRecord>, HttpGatewayError> {
        let response = self
            .send(self.request(Method::GET, SAVE_PATH), SAVE_PATH)
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body =
                    response
                        .bytes()
                        .await
                        .map_err(|source| HttpGatewayError::ReadBody {
                            path: SAVE_PATH.to_string(),
                            source,
                        })?;
                serde_json::from_slice(&body).map_err(|source| {
                    HttpGatewayError::DeserializeValue {
                        path: SAVE_PATH.to_string(),
                        source,
                    }
                })
            }
            status => Err(HttpGatewayError::RequestStatus {
                path: SAVE_PATH.to_string(),
                status,
            }),
        }
    }

    async fn get_last_save(&self) -> Result<Option<GameState>, HttpGatewayError> {
        let response = self
            .send(self.request(Method::GET, LAST_SAVE_PATH), LAST_SAVE_PATH)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body =
                    response
                        .text()
                        .await
                        .map_err(|source| HttpGatewayError::ReadBody {
                            path: LAST_SAVE_PATH.to_string(),
                            source,
                        })?;
                decode_last_save(&body).map_err(|source| HttpGatewayError::DeserializeValue {
                    path: LAST_SAVE_PATH.to_string(),
                    source,
                })
            }
            status => Err(HttpGatewayError::RequestStatus {
                path: LAST_SAVE_PATH.to_string(),
                status,
            }),
        }
    }
}

/// Decode the `GET /save/last` body; blank bodies and null or blank `data` mean no save.
fn decode_last_save(body: &str) -> serde_json::Result<Option<GameState>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Option<SaveResponse>>(body)? {
        Some(response) => response.game_state(),
        None => Ok(None),
    }
}

fn log_failure(operation: &'static str, err: &HttpGatewayError) {
    if err.is_timeout() {
        warn!(operation, error = %err, "save API request timed out");
        return;
    }
    match err {
        HttpGatewayError::RequestStatus { status, .. } if status.is_server_error() => {
            warn!(operation, %status, "save API server error");
        }
        _ => warn!(operation, error = %err, "save API request failed"),
    }
}

impl SaveGateway for HttpSaveGateway {
    fn save_game(&self, state: GameState) -> BoxFuture<'static, Result<(), PersistenceError>> {
        let gateway = self.clone();
        Box::pin(async move {
            let players = state.players.len();
            gateway.post_save(state).await.map_err(|err| {
                log_failure("save_game", &err);
                PersistenceError::from(err)
            })?;
            debug!(players, "game state uploaded");
            Ok(())
        })
    }

    fn list_saves(&self) -> BoxFuture<'static, Result<Vec<SaveRecord>, GatewayError>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway.get_saves().await.map_err(|err| {
                log_failure("list_saves", &err);
                GatewayError::from(err)
            })
        })
    }

    fn load_last_game(&self) -> BoxFuture<'static, Result<Option<GameState>, GatewayError>> {
        let gateway = self.clone();
        Box::pin(async move {
            gateway.get_last_save().await.map_err(|err| {
                log_failure("load_last_game", &err);
                GatewayError::from(err)
            })
        })
    }
}
