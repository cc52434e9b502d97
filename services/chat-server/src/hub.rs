use std::collections::HashMap;
use std::sync::Arc;

use chat_protocol::{OutboundFrame, PresenceUpdatePayload, PresenceStatus, RoomId, UserId};
use tokio::sync::RwLock;
use tracing::info;

use crate::session::Session;

/// Process-wide router. Holds the mapping `user_id -> active Session` and
/// enforces single-session-per-user, presence broadcasts, and the
/// slow-consumer eviction policy. Modeled as a shared, lock-guarded
/// collaborator (async methods serialized by an `RwLock`) rather than a
/// single actor task, matching how the rest of the ambient stack's
/// registries are built.
pub struct Hub {
    clients: RwLock<HashMap<UserId, Arc<Session>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new session, displacing any existing session for the
    /// same `user_id`. Always broadcasts a single `presence.update online`.
    pub async fn register(&self, session: Arc<Session>) {
        let displaced = {
            let mut clients = self.clients.write().await;
            clients.insert(session.user_id.clone(), Arc::clone(&session))
        };
        if let Some(old) = displaced {
            if !Arc::ptr_eq(&old, &session) {
                old.close_outbound();
                info!(user_id = %session.user_id, "displaced prior session");
            }
        }
        info!(user_id = %session.user_id, "session registered");
        self.broadcast_to_all(OutboundFrame::PresenceUpdate(PresenceUpdatePayload {
            user_id: session.user_id.clone(),
            username: session.username.clone(),
            status: PresenceStatus::Online,
        }))
        .await;
    }

    /// Removes `session` from the map, but only if the map still points at
    /// this exact session. A displaced session's late unregister is a no-op,
    /// since the map already points at the session that displaced it.
    pub async fn unregister(&self, session: &Arc<Session>) {
        let removed = {
            let mut clients = self.clients.write().await;
            if clients
                .get(&session.user_id)
                .is_some_and(|current| Arc::ptr_eq(current, session))
            {
                clients.remove(&session.user_id)
            } else {
                None
            }
        };
        if removed.is_some() {
            info!(user_id = %session.user_id, "session unregistered");
            self.broadcast_to_all(OutboundFrame::PresenceUpdate(PresenceUpdatePayload {
                user_id: session.user_id.clone(),
                username: session.username.clone(),
                status: PresenceStatus::Offline,
            }))
            .await;
        }
    }

    /// Delivers `frame` to every live session subscribed to `room_id`,
    /// except `exclude_user_id` when present. Evicts any session whose
    /// outbound queue is full at the moment of enqueue.
    pub async fn broadcast(&self, room_id: &RoomId, exclude_user_id: Option<&str>, frame: OutboundFrame) {
        let targets: Vec<Arc<Session>> = {
            let clients = self.clients.read().await;
            clients
                .values()
                .filter(|s| Some(s.user_id.as_str()) != exclude_user_id)
                .filter(|s| s.is_subscribed(room_id))
                .cloned()
                .collect()
        };
        for session in targets {
            if !session.try_send(frame.clone()) {
                self.evict(&session).await;
            }
        }
    }

    /// Point-to-point delivery; dropped silently if the user has no live
    /// session or its queue is full.
    pub async fn send_to_user(&self, user_id: &str, frame: OutboundFrame) {
        let target = { self.clients.read().await.get(user_id).cloned() };
        if let Some(session) = target {
            if !session.try_send(frame) {
                self.evict(&session).await;
            }
        }
    }

    async fn broadcast_to_all(&self, frame: OutboundFrame) {
        let targets: Vec<Arc<Session>> = { self.clients.read().await.values().cloned().collect() };
        for session in targets {
            if !session.try_send(frame.clone()) {
                self.evict(&session).await;
            }
        }
    }

    /// Slow-consumer policy: close the session's outbound queue (so its
    /// read/write loops wind down) and drop it from the map.
    async fn evict(&self, session: &Arc<Session>) {
        session.close_outbound();
        self.unregister(session).await;
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
