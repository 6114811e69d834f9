use std::time::SystemTime;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::push::{ConnectedUsers, PushEvent};

/// Push-channel sub-state carved out from [`AppState`](super::AppState).
pub struct PushState {
    hub: PushHub,
    sockets: DashMap<Uuid, SystemTime>,
}

impl PushState {
    /// Build the push sub-tree with the given broadcast capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            hub: PushHub::new(capacity),
            sockets: DashMap::new(),
        }
    }

    /// Broadcast hub shared by every socket.
    pub fn hub(&self) -> &PushHub {
        &self.hub
    }

    /// Register a newly attached socket and return its identifier.
    pub fn attach(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sockets.insert(id, SystemTime::now());
        id
    }

    /// Forget a socket once its connection is gone.
    pub fn detach(&self, id: &Uuid) {
        self.sockets.remove(id);
    }

    /// Number of sockets currently attached.
    pub fn connected_users(&self) -> ConnectedUsers {
        ConnectedUsers {
            connected_users: u32::try_from(self.sockets.len()).unwrap_or(u32::MAX),
        }
    }
}

/// Broadcast hub fanning push events out to every socket task.
pub struct PushHub {
    sender: broadcast::Sender<PushEvent>,
}

impl PushHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: PushEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_track_count() {
        let state = PushState::new(4);
        let a = state.attach();
        let b = state.attach();
        assert_eq!(state.connected_users().connected_users, 2);

        state.detach(&a);
        state.detach(&a);
        assert_eq!(state.connected_users().connected_users, 1);
        state.detach(&b);
        assert_eq!(state.connected_users().connected_users, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let hub = PushHub::new(4);
        let mut rx = hub.subscribe();
        let event = PushEvent::UsersUpdated(ConnectedUsers { connected_users: 1 });
        hub.broadcast(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }
}
