use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod message_types;

pub use message_types::{OnlineUser, WsInboundEvent, WsOutboundEvent};

/// Unique identifier for one WebSocket session.
///
/// Presence is last-write-wins per user: a new tab replaces the old entry.
/// The id lets the replaced session's disconnect handler detect that it no
/// longer owns the presence entry and skip the teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

struct PresenceEntry {
    session_id: SessionId,
    username: String,
    organization_code: String,
    sender: UnboundedSender<String>,
}

/// In-memory presence registry: user id -> live socket sender + metadata.
///
/// Entries exist only for the duration of a connection and are never
/// persisted. A Redis TTL mirror (services::presence_cache) covers the case
/// where a disconnect event is missed.
#[derive(Default, Clone)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<HashMap<Uuid, PresenceEntry>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user's session. Returns the session id plus the receiver
    /// end that the WebSocket actor drains. Replaces any previous entry for
    /// the same user (last-write-wins); the replaced sender is dropped, which
    /// surfaces as a send failure on the stale socket.
    pub async fn register(
        &self,
        user_id: Uuid,
        username: &str,
        organization_code: &str,
    ) -> (SessionId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let session_id = SessionId::new();

        let mut guard = self.inner.write().await;
        let replaced = guard
            .insert(
                user_id,
                PresenceEntry {
                    session_id,
                    username: username.to_string(),
                    organization_code: organization_code.to_string(),
                    sender: tx,
                },
            )
            .is_some();

        tracing::debug!(%user_id, ?session_id, replaced, "presence registered");

        (session_id, rx)
    }

    /// Remove a session's presence entry. No-op if another session has since
    /// replaced it. Returns whether the entry was actually removed.
    pub async fn remove(&self, user_id: Uuid, session_id: SessionId) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get(&user_id) {
            Some(entry) if entry.session_id == session_id => {
                guard.remove(&user_id);
                tracing::debug!(%user_id, ?session_id, "presence removed");
                true
            }
            _ => false,
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    pub async fn username_of(&self, user_id: Uuid) -> Option<String> {
        self.inner
            .read()
            .await
            .get(&user_id)
            .map(|e| e.username.clone())
    }

    /// Push a payload to a user's live socket. Returns false when the user is
    /// offline or the channel is dead (entry is dropped in the latter case).
    pub async fn send_to(&self, user_id: Uuid, payload: String) -> bool {
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get(&user_id) {
            if entry.sender.send(payload).is_ok() {
                return true;
            }
            guard.remove(&user_id);
            tracing::debug!(%user_id, "dropped dead presence entry");
        }
        false
    }

    /// Like `send_to`, but only delivers when the recipient's session belongs
    /// to the given organization. Relay events (typing, calendar) use this so
    /// nothing crosses tenants.
    pub async fn send_to_member(
        &self,
        user_id: Uuid,
        organization_code: &str,
        payload: String,
    ) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get(&user_id) {
            Some(entry) if entry.organization_code == organization_code => {
                if entry.sender.send(payload).is_ok() {
                    true
                } else {
                    guard.remove(&user_id);
                    tracing::debug!(%user_id, "dropped dead presence entry");
                    false
                }
            }
            _ => false,
        }
    }

    /// Roster of everyone currently online in an organization.
    pub async fn snapshot_org(&self, organization_code: &str) -> Vec<OnlineUser> {
        let guard = self.inner.read().await;
        let mut users: Vec<OnlineUser> = guard
            .iter()
            .filter(|(_, e)| e.organization_code == organization_code)
            .map(|(id, e)| OnlineUser {
                id: *id,
                username: e.username.clone(),
            })
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    /// Fan a payload out to every live member of an organization.
    /// Dead senders are cleaned up as they are found.
    pub async fn broadcast_org(&self, organization_code: &str, payload: String) {
        let mut guard = self.inner.write().await;
        let dead: Vec<Uuid> = guard
            .iter()
            .filter(|(_, e)| e.organization_code == organization_code)
            .filter(|(_, e)| e.sender.send(payload.clone()).is_err())
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            guard.remove(&id);
            tracing::debug!(user_id = %id, "dropped dead presence entry during broadcast");
        }
    }

    pub async fn online_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (_sid, _rx) = registry.register(user, "alice", "acme").await;

        assert!(registry.is_online(user).await);
        assert_eq!(registry.username_of(user).await.as_deref(), Some("alice"));
        assert_eq!(registry.online_count().await, 1);
    }

    #[tokio::test]
    async fn send_to_delivers_to_live_session() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (_sid, mut rx) = registry.register(user, "alice", "acme").await;

        assert!(registry.send_to(user, "hello".into()).await);
        assert_eq!(rx.recv().await.unwrap(), "hello");
        assert!(!registry.send_to(Uuid::new_v4(), "nobody".into()).await);
    }

    #[tokio::test]
    async fn second_tab_wins() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (old_sid, _old_rx) = registry.register(user, "alice", "acme").await;
        let (_new_sid, mut new_rx) = registry.register(user, "alice", "acme").await;

        assert!(registry.send_to(user, "hi".into()).await);
        assert_eq!(new_rx.recv().await.unwrap(), "hi");

        // The stale session's disconnect must not tear down the new entry.
        assert!(!registry.remove(user, old_sid).await);
        assert!(registry.is_online(user).await);
    }

    #[tokio::test]
    async fn remove_owned_session() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (sid, _rx) = registry.register(user, "alice", "acme").await;

        assert!(registry.remove(user, sid).await);
        assert!(!registry.is_online(user).await);
    }

    #[tokio::test]
    async fn send_to_member_stays_inside_the_org() {
        let registry = PresenceRegistry::new();
        let bob = Uuid::new_v4();
        let (_sid, mut rx) = registry.register(bob, "bob", "acme").await;

        assert!(registry.send_to_member(bob, "acme", "hello".into()).await);
        assert_eq!(rx.recv().await.unwrap(), "hello");

        // Same user id targeted from another tenant: nothing is delivered.
        assert!(!registry.send_to_member(bob, "globex", "intrusion".into()).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn snapshot_filters_by_org() {
        let registry = PresenceRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let (_s1, _r1) = registry.register(a, "alice", "acme").await;
        let (_s2, _r2) = registry.register(b, "bob", "acme").await;
        let (_s3, _r3) = registry.register(c, "carol", "globex").await;

        let acme = registry.snapshot_org("acme").await;
        assert_eq!(acme.len(), 2);
        assert!(acme.iter().all(|u| u.id != c));
        assert_eq!(acme[0].username, "alice"); // sorted by username
    }

    #[tokio::test]
    async fn broadcast_reaches_only_org_members() {
        let registry = PresenceRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (_s1, mut rx_a) = registry.register(a, "alice", "acme").await;
        let (_s2, mut rx_b) = registry.register(b, "bob", "globex").await;

        registry.broadcast_org("acme", "ping".into()).await;

        assert_eq!(rx_a.recv().await.unwrap(), "ping");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_sender_cleaned_up_on_send() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (_sid, rx) = registry.register(user, "alice", "acme").await;
        drop(rx);

        assert!(!registry.send_to(user, "hello".into()).await);
        assert!(!registry.is_online(user).await);
    }
}
