use crate::error::{AppError, AppResult};
use crate::models::message::{FileDescriptor, Message, MessageKind};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

const HISTORY_LIMIT: i64 = 100;

pub struct MessageService;

/// Fields common to every insert; body/file vary by kind.
pub struct NewMessage<'a> {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: &'a str,
    pub recipient_id: Uuid,
    pub organization_code: &'a str,
}

fn row_to_message(row: &Row) -> AppResult<Message> {
    let kind_str: String = row.get("kind");
    let kind = MessageKind::from_db(&kind_str)
        .ok_or_else(|| AppError::Database(format!("unknown message kind: {kind_str}")))?;

    let file: Option<serde_json::Value> = row.get("file");
    let file = file
        .map(serde_json::from_value::<FileDescriptor>)
        .transpose()
        .map_err(|e| AppError::Database(format!("malformed file descriptor: {e}")))?;

    Ok(Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        sender_name: row.get("sender_name"),
        recipient_id: row.get("recipient_id"),
        kind,
        body: row.get("body"),
        file,
        organization_code: row.get("organization_code"),
        created_at: row.get("created_at"),
        read_at: row.get("read_at"),
    })
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, sender_name, recipient_id, \
                               kind, body, file, organization_code, created_at, read_at";

impl MessageService {
    /// Persist a text message. Inserted unread.
    pub async fn store_text(db: &Pool, new: NewMessage<'_>, body: &str) -> AppResult<Message> {
        if body.trim().is_empty() {
            return Err(AppError::BadRequest("message body cannot be empty".into()));
        }

        let id = Uuid::new_v4();
        let client = db.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO messages \
                       (id, conversation_id, sender_id, sender_name, recipient_id, \
                        kind, body, organization_code) \
                     VALUES ($1, $2, $3, $4, $5, 'text', $6, $7) \
                     RETURNING {MESSAGE_COLUMNS}"
                ),
                &[
                    &id,
                    &new.conversation_id,
                    &new.sender_id,
                    &new.sender_name,
                    &new.recipient_id,
                    &body,
                    &new.organization_code,
                ],
            )
            .await?;

        row_to_message(&row)
    }

    /// Persist a file-reference message. Inserted unread.
    pub async fn store_file(
        db: &Pool,
        new: NewMessage<'_>,
        file: &FileDescriptor,
    ) -> AppResult<Message> {
        let id = Uuid::new_v4();
        let descriptor = serde_json::to_value(file).map_err(|e| {
            tracing::error!(error = %e, "serialize file descriptor");
            AppError::Internal
        })?;

        let client = db.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO messages \
                       (id, conversation_id, sender_id, sender_name, recipient_id, \
                        kind, file, organization_code) \
                     VALUES ($1, $2, $3, $4, $5, 'file', $6, $7) \
                     RETURNING {MESSAGE_COLUMNS}"
                ),
                &[
                    &id,
                    &new.conversation_id,
                    &new.sender_id,
                    &new.sender_name,
                    &new.recipient_id,
                    &descriptor,
                    &new.organization_code,
                ],
            )
            .await?;

        row_to_message(&row)
    }

    /// Message history of one conversation, oldest first.
    pub async fn history(db: &Pool, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let client = db.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE conversation_id = $1 \
                     ORDER BY created_at ASC \
                     LIMIT $2"
                ),
                &[&conversation_id, &HISTORY_LIMIT],
            )
            .await?;

        rows.iter().map(row_to_message).collect()
    }

    /// Unread messages addressed to a user, oldest first. Scanned on connect
    /// to flush deliveries that were queued while the user was offline.
    pub async fn unread_for(db: &Pool, recipient_id: Uuid) -> AppResult<Vec<Message>> {
        let client = db.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE recipient_id = $1 AND read_at IS NULL \
                     ORDER BY created_at ASC"
                ),
                &[&recipient_id],
            )
            .await?;

        rows.iter().map(row_to_message).collect()
    }

    /// Stamp `read_at` on a batch of messages. Already-read rows are skipped.
    pub async fn mark_read(db: &Pool, message_ids: &[Uuid]) -> AppResult<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        let client = db.get().await?;
        let updated = client
            .execute(
                "UPDATE messages SET read_at = NOW() WHERE id = ANY($1) AND read_at IS NULL",
                &[&message_ids],
            )
            .await?;
        Ok(updated)
    }

    /// Locate a stored file by its on-disk name, for the download endpoint.
    /// Returns the owning org and descriptor so access can be checked.
    pub async fn find_file(
        db: &Pool,
        stored_name: &str,
    ) -> AppResult<Option<(String, FileDescriptor)>> {
        let client = db.get().await?;
        let row = client
            .query_opt(
                "SELECT organization_code, file FROM messages \
                 WHERE file ->> 'stored_name' = $1 \
                 LIMIT 1",
                &[&stored_name],
            )
            .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let organization_code: String = row.get("organization_code");
                let file: serde_json::Value = row.get("file");
                let descriptor = serde_json::from_value(file)
                    .map_err(|e| AppError::Database(format!("malformed file descriptor: {e}")))?;
                Ok(Some((organization_code, descriptor)))
            }
        }
    }
}
