// ABOUTME: In-process registry of live notification channels, one per user
// ABOUTME: A new connection replaces the old one; guards only evict their own generation

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::Notification;

struct Connection {
    generation: u64,
    tx: mpsc::UnboundedSender<Notification>,
}

/// Live delivery channels keyed by user ID. At most one connection per
/// user; registering again replaces the previous channel.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Connection>>,
    next_generation: Mutex<u64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live channel for `user_id`. The returned guard
    /// deregisters on drop; the receiver feeds the delivery stream.
    pub fn register(
        self: &Arc<Self>,
        user_id: &str,
    ) -> (ConnectionGuard, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let generation = {
            let mut next = self
                .next_generation
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *next += 1;
            *next
        };

        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if connections
            .insert(user_id.to_string(), Connection { generation, tx })
            .is_some()
        {
            debug!("Replaced live connection for user {}", user_id);
        }

        (
            ConnectionGuard {
                registry: Arc::clone(self),
                user_id: user_id.to_string(),
                generation,
            },
            rx,
        )
    }

    /// Push a notification to the user's live channel, if any. Returns
    /// whether the payload was handed to a connected receiver.
    pub fn send(&self, user_id: &str, notification: Notification) -> bool {
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match connections.get(user_id) {
            Some(connection) => {
                if connection.tx.send(notification).is_ok() {
                    true
                } else {
                    // Receiver side is gone but the guard has not dropped yet.
                    connections.remove(user_id);
                    false
                }
            }
            None => false,
        }
    }

    pub fn is_connected(&self, user_id: &str) -> bool {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(user_id)
    }

    fn deregister(&self, user_id: &str, generation: u64) {
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(connection) = connections.get(user_id) {
            if connection.generation == generation {
                connections.remove(user_id);
                debug!("Deregistered live connection for user {}", user_id);
            }
        }
    }
}

/// Removes its connection from the registry on drop. Dropping a guard
/// whose connection was already replaced is a no-op.
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    user_id: String,
    generation: u64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.deregister(&self.user_id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationKind;
    use chrono::Utc;

    fn notification(entity_id: &str) -> Notification {
        Notification {
            id: format!("n-{entity_id}"),
            recipient_id: "u1".to_string(),
            kind: NotificationKind::StatusChange,
            entity_type: "request".to_string(),
            entity_id: entity_id.to_string(),
            message: "moved".to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn send_to_offline_user_returns_false() {
        let registry = Arc::new(ConnectionRegistry::new());
        assert!(!registry.send("u1", notification("r1")));
    }

    #[tokio::test]
    async fn connected_user_receives_the_payload() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_guard, mut rx) = registry.register("u1");

        assert!(registry.send("u1", notification("r1")));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.entity_id, "r1");
    }

    #[tokio::test]
    async fn second_connection_replaces_the_first() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_old_guard, mut old_rx) = registry.register("u1");
        let (_new_guard, mut new_rx) = registry.register("u1");

        assert!(registry.send("u1", notification("r1")));
        assert_eq!(new_rx.recv().await.unwrap().entity_id, "r1");
        assert!(old_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_guard_drop_keeps_the_replacement() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (old_guard, _old_rx) = registry.register("u1");
        let (_new_guard, mut new_rx) = registry.register("u1");

        drop(old_guard);
        assert!(registry.is_connected("u1"));
        assert!(registry.send("u1", notification("r2")));
        assert_eq!(new_rx.recv().await.unwrap().entity_id, "r2");
    }

    #[tokio::test]
    async fn guard_drop_disconnects_its_own_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (guard, _rx) = registry.register("u1");
        drop(guard);
        assert!(!registry.is_connected("u1"));
        assert!(!registry.send("u1", notification("r1")));
    }
}
