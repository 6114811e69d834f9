use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{dto::push::PushEvent, state::SharedState};

/// Handle the full lifecycle of a push socket: greet it, fan hub events out to it and
/// announce the new user count when it leaves.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut events = state.push().hub().subscribe();
    let socket_id = state.push().attach();
    let users = state.push().connected_users();
    info!(id = %socket_id, connected_users = users.connected_users, "push socket connected");

    if !send_event(&outbound_tx, &PushEvent::Connected(users)) {
        leave(&state, socket_id, writer_task, outbound_tx).await;
        return;
    }
    state.push().hub().broadcast(PushEvent::UsersUpdated(users));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !send_event(&outbound_tx, &event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(id = %socket_id, skipped, "push socket lagging behind");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => debug!(id = %socket_id, "ignoring inbound push frame"),
                Some(Err(err)) => {
                    warn!(id = %socket_id, error = %err, "push socket receive error");
                    break;
                }
            },
        }
    }

    leave(&state, socket_id, writer_task, outbound_tx).await;
}

/// Queue an event for the writer task. Returns `false` once the socket is gone.
fn send_event(outbound: &mpsc::UnboundedSender<Message>, event: &PushEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(payload) => outbound.send(Message::Text(payload.into())).is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to encode push event");
            true
        }
    }
}

async fn leave(
    state: &SharedState,
    socket_id: uuid::Uuid,
    writer_task: JoinHandle<()>,
    outbound_tx: mpsc::UnboundedSender<Message>,
) {
    state.push().detach(&socket_id);
    let users = state.push().connected_users();
    info!(id = %socket_id, connected_users = users.connected_users, "push socket disconnected");
    state.push().hub().broadcast(PushEvent::UsersUpdated(users));

    drop(outbound_tx);
    let _ = writer_task.await;
}
