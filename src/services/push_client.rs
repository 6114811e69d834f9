//! Client side of the `/save` push channel.
//!
//! The connection lives in its own task and turns every frame into a [`PushMessage`]
//! queued for the session loop, so consumers never deal with socket lifecycles.

use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, info, warn};

use crate::dto::{game_state::GameState, push::PushEvent};

const QUEUE_CAPACITY: usize = 64;

/// Connection settings of the push channel.
#[derive(Debug, Clone)]
pub struct PushChannelConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:3200/save`.
    pub url: String,
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound of the exponential backoff.
    pub max_delay: Duration,
    /// Consecutive failed attempts tolerated before going offline.
    pub max_attempts: u32,
}

impl Default for PushChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3200/save".into(),
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(5_000),
            max_attempts: 10,
        }
    }
}

impl PushChannelConfig {
    /// Delay to wait before reconnection attempt number `attempt` (starting at 1).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }
}

/// Typed messages delivered to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// The socket is open.
    Connected,
    /// Latest number of attached clients.
    ConnectedUsers(u32),
    /// Snapshot saved by some client, ours included.
    NewChanges(GameState),
    /// The socket dropped; a reconnection is pending.
    Disconnected,
    /// Reconnection gave up. No further message follows.
    Offline,
}

/// Non-fatal failures of the push connection.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The WebSocket handshake failed.
    #[error("failed to connect to push channel `{url}`")]
    Connect {
        /// Endpoint that was dialled.
        url: String,
        /// Handshake failure.
        #[source]
        source: tungstenite::Error,
    },
    /// An established socket broke while reading.
    #[error("push channel receive failed")]
    Receive(#[source] tungstenite::Error),
    /// Every reconnection attempt failed.
    #[error("push channel unreachable after {attempts} attempts")]
    Exhausted {
        /// Consecutive failed attempts.
        attempts: u32,
    },
}

/// Start the push connection task.
///
/// The task stops when reconnection is exhausted or when the receiver is dropped.
pub fn spawn(config: PushChannelConfig) -> (mpsc::Receiver<PushMessage>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let handle = tokio::spawn(run(config, tx));
    (rx, handle)
}

async fn run(config: PushChannelConfig, tx: mpsc::Sender<PushMessage>) {
    let mut failures = 0u32;

    loop {
        match connect_async(config.url.as_str()).await {
            Ok((socket, _response)) => {
                failures = 0;
                info!(url = %config.url, "push channel connected");
                if tx.send(PushMessage::Connected).await.is_err() {
                    return;
                }

                match pump(socket, &tx).await {
                    Ok(Pumped::ReceiverGone) => return,
                    Ok(Pumped::Closed) => info!("push channel closed by server"),
                    Err(err) => warn!(error = %err, "push channel dropped"),
                }

                if tx.send(PushMessage::Disconnected).await.is_err() {
                    return;
                }
            }
            Err(source) => {
                failures += 1;
                let err = ChannelError::Connect {
                    url: config.url.clone(),
                    source,
                };
                warn!(error = %err, attempt = failures, "push channel connection failed");

                if failures >= config.max_attempts {
                    let err = ChannelError::Exhausted { attempts: failures };
                    warn!(error = %err, "push channel going offline");
                    let _ = tx.send(PushMessage::Offline).await;
                    return;
                }
            }
        }

        let delay = config.reconnect_delay(failures.max(1));
        debug!(?delay, "push channel reconnecting");
        tokio::time::sleep(delay).await;
    }
}

enum Pumped {
    Closed,
    ReceiverGone,
}

async fn pump<S>(mut socket: S, tx: &mpsc::Sender<PushMessage>) -> Result<Pumped, ChannelError>
where
    S: futures::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = socket.next().await {
        let text = match frame.map_err(ChannelError::Receive)? {
            tungstenite::Message::Text(text) => text,
            tungstenite::Message::Close(_) => return Ok(Pumped::Closed),
            _ => continue,
        };

        let message = match PushEvent::from_json_str(text.as_str()) {
            Ok(event) => to_message(event),
            Err(err) => {
                warn!(error = %err, "ignoring malformed push frame");
                continue;
            }
        };

        if tx.send(message).await.is_err() {
            return Ok(Pumped::ReceiverGone);
        }
    }
    Ok(Pumped::Closed)
}

fn to_message(event: PushEvent) -> PushMessage {
    match event {
        PushEvent::Connected(users) | PushEvent::UsersUpdated(users) => {
            PushMessage::ConnectedUsers(users.connected_users)
        }
        PushEvent::NewChanges(changes) => PushMessage::NewChanges(changes.data),
    }
}
