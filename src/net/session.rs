//! Client Session Management
//!
//! Tracks connected clients from handshake to disconnect and maps them
//! to their zone entities. The simulation never sees sessions; the
//! registry is the only place the session-to-entity binding lives.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::components::EntityId;
use crate::game::validate::RateLimiter;
use crate::net::protocol::ServerEvent;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Socket open, join not yet received.
    Connecting,
    /// Joined the zone and bound to an entity.
    Joined,
    /// Leave received, entity teardown in progress.
    Leaving,
    /// Socket closed.
    Closed,
}

/// One connected client.
pub struct PlayerSession {
    /// Session identifier.
    pub id: SessionId,
    /// Lifecycle phase.
    pub phase: SessionPhase,
    /// Bound zone entity, once joined.
    pub entity: Option<EntityId>,
    /// Display name, once joined.
    pub name: String,
    /// Per-session command rate limiter.
    pub limiter: RateLimiter,
    /// Outgoing event channel to this client.
    pub sender: mpsc::Sender<ServerEvent>,
    /// Connection time, for rate-limit timestamps.
    pub connected_at: Instant,
}

impl PlayerSession {
    /// Create a fresh session around an outgoing channel.
    pub fn new(sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: SessionPhase::Connecting,
            entity: None,
            name: String::new(),
            limiter: RateLimiter::default(),
            sender,
            connected_at: Instant::now(),
        }
    }

    /// Milliseconds since the session connected, for the rate limiter.
    pub fn elapsed_ms(&self) -> u64 {
        self.connected_at.elapsed().as_millis() as u64
    }

    /// Whether the session has joined the zone.
    pub fn is_joined(&self) -> bool {
        self.phase == SessionPhase::Joined && self.entity.is_some()
    }
}

/// All live sessions plus the entity-to-session index.
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<PlayerSession>>>>,
    by_entity: RwLock<BTreeMap<EntityId, SessionId>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            by_entity: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a new session.
    pub async fn insert(&self, session: PlayerSession) -> Arc<RwLock<PlayerSession>> {
        let id = session.id;
        let session = Arc::new(RwLock::new(session));
        self.sessions.write().await.insert(id, session.clone());
        session
    }

    /// Look up a session by id.
    pub async fn get(&self, id: &SessionId) -> Option<Arc<RwLock<PlayerSession>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Bind a session to its zone entity after a successful join.
    pub async fn bind_entity(&self, session_id: SessionId, entity: EntityId) {
        self.by_entity.write().await.insert(entity, session_id);
        if let Some(session) = self.get(&session_id).await {
            let mut s = session.write().await;
            s.entity = Some(entity);
            s.phase = SessionPhase::Joined;
        }
    }

    /// Find the session bound to an entity.
    pub async fn session_for_entity(
        &self,
        entity: EntityId,
    ) -> Option<Arc<RwLock<PlayerSession>>> {
        let session_id = *self.by_entity.read().await.get(&entity)?;
        self.get(&session_id).await
    }

    /// Remove a session and its entity binding. Returns the bound entity.
    pub async fn remove(&self, id: &SessionId) -> Option<EntityId> {
        let session = self.sessions.write().await.remove(id)?;
        let entity = {
            let mut s = session.write().await;
            s.phase = SessionPhase::Closed;
            s.entity.take()
        };
        if let Some(entity) = entity {
            self.by_entity.write().await.remove(&entity);
        }
        entity
    }

    /// Send an event to one entity's session, if connected.
    ///
    /// A full outbound channel drops the event instead of waiting; a
    /// stalled client never holds up the caller.
    pub async fn send_to(&self, entity: EntityId, event: ServerEvent) {
        if let Some(session) = self.session_for_entity(entity).await {
            let sender = session.read().await.sender.clone();
            if sender.try_send(event).is_err() {
                debug!(%entity, "outbound channel full, dropping event");
            }
        }
    }

    /// Broadcast an event to every joined session.
    ///
    /// Sessions whose outbound channel is full miss the event; the next
    /// delta sync covers the gap.
    pub async fn broadcast(&self, event: ServerEvent) {
        let senders: Vec<(SessionId, mpsc::Sender<ServerEvent>)> = {
            let sessions = self.sessions.read().await;
            let mut senders = Vec::with_capacity(sessions.len());
            for session in sessions.values() {
                let s = session.read().await;
                if s.is_joined() {
                    senders.push((s.id, s.sender.clone()));
                }
            }
            senders
        };

        for (session_id, sender) in senders {
            if sender.try_send(event.clone()).is_err() {
                warn!(%session_id, "outbound channel full, dropping broadcast event");
            }
        }
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> (PlayerSession, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (PlayerSession::new(tx), rx)
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let registry = SessionRegistry::new();
        let (session, _rx) = test_session();
        let id = session.id;

        registry.insert(session).await;
        assert_eq!(registry.session_count().await, 1);

        registry.remove(&id).await;
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_bind_entity_and_lookup() {
        let registry = SessionRegistry::new();
        let (session, _rx) = test_session();
        let id = session.id;
        registry.insert(session).await;

        registry.bind_entity(id, EntityId(5)).await;

        let found = registry.session_for_entity(EntityId(5)).await.unwrap();
        let s = found.read().await;
        assert_eq!(s.phase, SessionPhase::Joined);
        assert_eq!(s.entity, Some(EntityId(5)));
        assert!(s.is_joined());
    }

    #[tokio::test]
    async fn test_remove_returns_bound_entity() {
        let registry = SessionRegistry::new();
        let (session, _rx) = test_session();
        let id = session.id;
        registry.insert(session).await;
        registry.bind_entity(id, EntityId(9)).await;

        let entity = registry.remove(&id).await;
        assert_eq!(entity, Some(EntityId(9)));
        assert!(registry.session_for_entity(EntityId(9)).await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_entity() {
        let registry = SessionRegistry::new();
        let (session, mut rx) = test_session();
        let id = session.id;
        registry.insert(session).await;
        registry.bind_entity(id, EntityId(2)).await;

        registry
            .send_to(
                EntityId(2),
                ServerEvent::Pong {
                    timestamp: 7,
                    server_time: 8,
                },
            )
            .await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ServerEvent::Pong { timestamp: 7, .. }));
    }

    #[tokio::test]
    async fn test_broadcast_skips_unjoined() {
        let registry = SessionRegistry::new();

        let (joined, mut joined_rx) = test_session();
        let joined_id = joined.id;
        registry.insert(joined).await;
        registry.bind_entity(joined_id, EntityId(1)).await;

        let (connecting, mut connecting_rx) = test_session();
        registry.insert(connecting).await;

        registry
            .broadcast(ServerEvent::Shutdown {
                reason: "maintenance".to_string(),
            })
            .await;

        assert!(joined_rx.recv().await.is_some());
        assert!(connecting_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_drops_for_stalled_client() {
        let registry = SessionRegistry::new();

        // A client that never drains its single-slot channel
        let (stalled_tx, mut stalled_rx) = mpsc::channel(1);
        let stalled = PlayerSession::new(stalled_tx);
        let stalled_id = stalled.id;
        registry.insert(stalled).await;
        registry.bind_entity(stalled_id, EntityId(1)).await;

        let (healthy, mut healthy_rx) = test_session();
        let healthy_id = healthy.id;
        registry.insert(healthy).await;
        registry.bind_entity(healthy_id, EntityId(2)).await;

        for timestamp in 0..3 {
            registry
                .broadcast(ServerEvent::Pong {
                    timestamp,
                    server_time: 0,
                })
                .await;
        }

        // The healthy client got everything; the stalled one kept only
        // what fit and never blocked the broadcast
        for _ in 0..3 {
            assert!(healthy_rx.try_recv().is_ok());
        }
        assert!(stalled_rx.try_recv().is_ok());
        assert!(stalled_rx.try_recv().is_err());
    }
}
