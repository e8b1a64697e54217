use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::message::Message;
use crate::services::{ConversationService, MessageService};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// GET /api/messages/{recipient_id}: full history of the conversation
/// between the caller and one peer, oldest first. Fetching the history
/// counts as reading it, so unread rows addressed to the caller get their
/// `read_at` stamped.
pub async fn history_with(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let recipient_id = path.into_inner();

    let conversation =
        ConversationService::find(&state.db, auth.id, recipient_id, &auth.organization_code)
            .await?;

    let Some(conversation) = conversation else {
        // No conversation yet; nothing has been said.
        return super::success("messages", Vec::<Message>::new());
    };

    let messages = MessageService::history(&state.db, conversation.id).await?;

    let unread_to_me: Vec<Uuid> = messages
        .iter()
        .filter(|m| m.recipient_id == auth.id && !m.is_read())
        .map(|m| m.id)
        .collect();
    MessageService::mark_read(&state.db, &unread_to_me).await?;

    super::success("messages", messages)
}

#[derive(Debug, Serialize)]
struct ConversationSummary {
    id: Uuid,
    peer_id: Uuid,
    created_at: DateTime<Utc>,
    last_message_at: DateTime<Utc>,
}

/// GET /api/conversations: the caller's conversations, newest activity first.
pub async fn list_conversations(
    state: web::Data<AppState>,
    auth: AuthUser,
) -> AppResult<HttpResponse> {
    let conversations =
        ConversationService::list_for_user(&state.db, auth.id, &auth.organization_code).await?;

    let summaries: Vec<ConversationSummary> = conversations
        .iter()
        .filter_map(|c| {
            c.peer_of(auth.id).map(|peer_id| ConversationSummary {
                id: c.id,
                peer_id,
                created_at: c.created_at,
                last_message_at: c.last_message_at,
            })
        })
        .collect();

    super::success("conversations", summaries)
}
