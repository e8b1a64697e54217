//! Delivery dispatcher: persist first, then push.
//!
//! A message is durable the moment the insert commits; the live push is an
//! optimization. If the recipient is offline (or the push fails) the row
//! simply stays unread and is flushed on their next connect, giving
//! at-least-once delivery without a client-side ack protocol.

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::message::{FileDescriptor, Message, MessageKind};
use crate::services::message_service::NewMessage;
use crate::services::{ConversationService, MessageService};
use crate::state::AppState;
use crate::websocket::{PresenceRegistry, WsOutboundEvent};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

/// Backing store for the connect-time unread flush.
#[async_trait]
pub trait UnreadStore {
    async fn unread_for(&self, recipient_id: Uuid) -> AppResult<Vec<Message>>;
    async fn mark_read(&self, message_ids: &[Uuid]) -> AppResult<u64>;
}

#[async_trait]
impl UnreadStore for Pool {
    async fn unread_for(&self, recipient_id: Uuid) -> AppResult<Vec<Message>> {
        MessageService::unread_for(self, recipient_id).await
    }

    async fn mark_read(&self, message_ids: &[Uuid]) -> AppResult<u64> {
        MessageService::mark_read(self, message_ids).await
    }
}

async fn recipient_in_org(
    state: &AppState,
    recipient_id: Uuid,
    organization_code: &str,
) -> AppResult<()> {
    let client = state.db.get().await?;
    let row = client
        .query_opt(
            "SELECT 1 FROM users WHERE id = $1 AND organization_code = $2",
            &[&recipient_id, &organization_code],
        )
        .await?;
    if row.is_none() {
        return Err(AppError::BadRequest(
            "recipient not found in your organization".into(),
        ));
    }
    Ok(())
}

fn outbound_event(message: &Message) -> Option<WsOutboundEvent> {
    match message.kind {
        MessageKind::Text => Some(WsOutboundEvent::NewMessage {
            message_id: message.id,
            sender_id: message.sender_id,
            sender_name: message.sender_name.clone(),
            body: message.body.clone().unwrap_or_default(),
            created_at: message.created_at,
        }),
        MessageKind::File => {
            let file = message.file.clone()?;
            Some(WsOutboundEvent::FileReceived {
                message_id: message.id,
                sender_id: message.sender_id,
                sender_name: message.sender_name.clone(),
                file,
                created_at: message.created_at,
            })
        }
    }
}

/// Try the live push. Absence or a dead socket is not an error; the stored
/// row covers delivery.
async fn push_live(state: &AppState, message: &Message) {
    let Some(event) = outbound_event(message) else {
        tracing::warn!(message_id = %message.id, "file message without descriptor, skipping push");
        return;
    };

    if state
        .registry
        .send_to(message.recipient_id, event.to_json())
        .await
    {
        tracing::debug!(message_id = %message.id, recipient = %message.recipient_id, "pushed live");
    } else {
        tracing::debug!(
            message_id = %message.id,
            recipient = %message.recipient_id,
            "recipient offline, message queued as unread"
        );
    }
}

pub async fn dispatch_text(
    state: &AppState,
    sender: &AuthUser,
    recipient_id: Uuid,
    body: &str,
) -> AppResult<Message> {
    recipient_in_org(state, recipient_id, &sender.organization_code).await?;

    let conversation = ConversationService::resolve(
        &state.db,
        sender.id,
        recipient_id,
        &sender.organization_code,
    )
    .await?;

    let message = MessageService::store_text(
        &state.db,
        NewMessage {
            conversation_id: conversation.id,
            sender_id: sender.id,
            sender_name: &sender.username,
            recipient_id,
            organization_code: &sender.organization_code,
        },
        body,
    )
    .await?;

    ConversationService::touch(&state.db, conversation.id).await?;
    push_live(state, &message).await;

    Ok(message)
}

pub async fn dispatch_file(
    state: &AppState,
    sender: &AuthUser,
    recipient_id: Uuid,
    file: &FileDescriptor,
) -> AppResult<Message> {
    recipient_in_org(state, recipient_id, &sender.organization_code).await?;

    let conversation = ConversationService::resolve(
        &state.db,
        sender.id,
        recipient_id,
        &sender.organization_code,
    )
    .await?;

    let message = MessageService::store_file(
        &state.db,
        NewMessage {
            conversation_id: conversation.id,
            sender_id: sender.id,
            sender_name: &sender.username,
            recipient_id,
            organization_code: &sender.organization_code,
        },
        file,
    )
    .await?;

    ConversationService::touch(&state.db, conversation.id).await?;
    push_live(state, &message).await;

    Ok(message)
}

/// On connect: scan unread rows addressed to the user, replay them over the
/// fresh socket, then mark the pushed ones read. Rows whose push fails stay
/// unread and are retried on the next connect.
pub async fn flush_unread(state: &AppState, user_id: Uuid) -> AppResult<usize> {
    flush_unread_from(&state.db, &state.registry, user_id).await
}

pub async fn flush_unread_from<S>(
    store: &S,
    registry: &PresenceRegistry,
    user_id: Uuid,
) -> AppResult<usize>
where
    S: UnreadStore + Sync,
{
    let pending = store.unread_for(user_id).await?;
    if pending.is_empty() {
        return Ok(0);
    }

    let mut delivered = Vec::with_capacity(pending.len());
    for message in &pending {
        let Some(event) = outbound_event(message) else {
            tracing::warn!(message_id = %message.id, "skipping unread message without payload");
            continue;
        };
        if registry.send_to(user_id, event.to_json()).await {
            delivered.push(message.id);
        } else {
            // Socket already gone; leave the rest unread for the next connect.
            break;
        }
    }

    store.mark_read(&delivered).await?;
    tracing::info!(%user_id, count = delivered.len(), "flushed unread messages");
    Ok(delivered.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    struct FakeStore {
        unread: Vec<Message>,
        marked: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl UnreadStore for FakeStore {
        async fn unread_for(&self, recipient_id: Uuid) -> AppResult<Vec<Message>> {
            Ok(self
                .unread
                .iter()
                .filter(|m| m.recipient_id == recipient_id)
                .cloned()
                .collect())
        }

        async fn mark_read(&self, message_ids: &[Uuid]) -> AppResult<u64> {
            self.marked.lock().unwrap().extend_from_slice(message_ids);
            Ok(message_ids.len() as u64)
        }
    }

    fn text_message(recipient_id: Uuid, body: &str, age_secs: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            sender_name: "alice".into(),
            recipient_id,
            kind: MessageKind::Text,
            body: Some(body.into()),
            file: None,
            organization_code: "acme".into(),
            created_at: Utc::now() - Duration::seconds(age_secs),
            read_at: None,
        }
    }

    fn file_message(recipient_id: Uuid) -> Message {
        Message {
            file: Some(FileDescriptor {
                original_name: "notes.txt".into(),
                stored_name: "1714000000000-7.txt".into(),
                size: 64,
                mime_type: "text/plain".into(),
            }),
            kind: MessageKind::File,
            body: None,
            ..text_message(recipient_id, "", 0)
        }
    }

    #[tokio::test]
    async fn messages_stored_while_offline_arrive_on_connect() {
        let recipient = Uuid::new_v4();
        let store = FakeStore {
            unread: vec![
                text_message(recipient, "first", 30),
                text_message(recipient, "second", 20),
                text_message(recipient, "third", 10),
            ],
            marked: Mutex::new(Vec::new()),
        };

        // Nobody was connected when the rows were stored; now they connect.
        let registry = PresenceRegistry::new();
        let (_sid, mut rx) = registry.register(recipient, "bob", "acme").await;

        let flushed = flush_unread_from(&store, &registry, recipient)
            .await
            .unwrap();
        assert_eq!(flushed, 3);

        for expected in ["first", "second", "third"] {
            let raw = rx.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(value["type"], "new_message");
            assert_eq!(value["body"], expected);
        }

        let marked = store.marked.lock().unwrap().clone();
        let expected: Vec<Uuid> = store.unread.iter().map(|m| m.id).collect();
        assert_eq!(marked, expected);
    }

    #[tokio::test]
    async fn dead_socket_keeps_queue_unread() {
        let recipient = Uuid::new_v4();
        let store = FakeStore {
            unread: vec![
                text_message(recipient, "first", 20),
                text_message(recipient, "second", 10),
            ],
            marked: Mutex::new(Vec::new()),
        };

        let registry = PresenceRegistry::new();
        let (_sid, rx) = registry.register(recipient, "bob", "acme").await;
        drop(rx); // socket died between register and flush

        let flushed = flush_unread_from(&store, &registry, recipient)
            .await
            .unwrap();
        assert_eq!(flushed, 0);
        assert!(store.marked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_rows_flush_as_file_received() {
        let recipient = Uuid::new_v4();
        let store = FakeStore {
            unread: vec![file_message(recipient)],
            marked: Mutex::new(Vec::new()),
        };

        let registry = PresenceRegistry::new();
        let (_sid, mut rx) = registry.register(recipient, "bob", "acme").await;

        let flushed = flush_unread_from(&store, &registry, recipient)
            .await
            .unwrap();
        assert_eq!(flushed, 1);

        let value: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(value["type"], "file_received");
        assert_eq!(value["file"]["original_name"], "notes.txt");
    }

    #[tokio::test]
    async fn flush_ignores_other_recipients() {
        let recipient = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let store = FakeStore {
            unread: vec![text_message(stranger, "not yours", 5)],
            marked: Mutex::new(Vec::new()),
        };

        let registry = PresenceRegistry::new();
        let (_sid, mut rx) = registry.register(recipient, "bob", "acme").await;

        let flushed = flush_unread_from(&store, &registry, recipient)
            .await
            .unwrap();
        assert_eq!(flushed, 0);
        assert!(rx.try_recv().is_err());
    }
}
