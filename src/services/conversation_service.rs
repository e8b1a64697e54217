use crate::error::{AppError, AppResult};
use crate::models::conversation::{normalize_pair, Conversation};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

pub struct ConversationService;

fn row_to_conversation(row: &Row) -> Conversation {
    Conversation {
        id: row.get("id"),
        participant_low: row.get("participant_low"),
        participant_high: row.get("participant_high"),
        organization_code: row.get("organization_code"),
        created_at: row.get("created_at"),
        last_message_at: row.get("last_message_at"),
    }
}

impl ConversationService {
    /// Find or create the conversation between two users within a tenant.
    ///
    /// The pair is normalized before the upsert so the relation is symmetric,
    /// and the unique index makes concurrent first-messages between the same
    /// pair converge on a single row instead of racing into duplicates.
    pub async fn resolve(
        db: &Pool,
        user_a: Uuid,
        user_b: Uuid,
        organization_code: &str,
    ) -> AppResult<Conversation> {
        if user_a == user_b {
            return Err(AppError::BadRequest(
                "cannot open a conversation with yourself".into(),
            ));
        }

        let (low, high) = normalize_pair(user_a, user_b);
        let id = Uuid::new_v4();
        let client = db.get().await?;

        // The no-op DO UPDATE makes RETURNING yield the existing row on
        // conflict, so lookup and creation are a single round trip.
        let row = client
            .query_one(
                r#"
                INSERT INTO conversations (id, participant_low, participant_high, organization_code)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (participant_low, participant_high, organization_code)
                DO UPDATE SET participant_low = EXCLUDED.participant_low
                RETURNING id, participant_low, participant_high, organization_code,
                          created_at, last_message_at
                "#,
                &[&id, &low, &high, &organization_code],
            )
            .await?;

        let conversation = row_to_conversation(&row);
        if conversation.id == id {
            tracing::info!(conversation_id = %conversation.id, "conversation created");
        }
        Ok(conversation)
    }

    /// Look up without creating. Used by history fetches, where an absent
    /// conversation just means an empty message list.
    pub async fn find(
        db: &Pool,
        user_a: Uuid,
        user_b: Uuid,
        organization_code: &str,
    ) -> AppResult<Option<Conversation>> {
        let (low, high) = normalize_pair(user_a, user_b);
        let client = db.get().await?;

        let row = client
            .query_opt(
                r#"
                SELECT id, participant_low, participant_high, organization_code,
                       created_at, last_message_at
                FROM conversations
                WHERE participant_low = $1 AND participant_high = $2 AND organization_code = $3
                "#,
                &[&low, &high, &organization_code],
            )
            .await?;

        Ok(row.as_ref().map(row_to_conversation))
    }

    /// Bump `last_message_at`, called after every persisted message.
    pub async fn touch(db: &Pool, conversation_id: Uuid) -> AppResult<()> {
        let client = db.get().await?;
        client
            .execute(
                "UPDATE conversations SET last_message_at = NOW() WHERE id = $1",
                &[&conversation_id],
            )
            .await?;
        Ok(())
    }

    /// All conversations the user participates in, newest activity first.
    pub async fn list_for_user(
        db: &Pool,
        user_id: Uuid,
        organization_code: &str,
    ) -> AppResult<Vec<Conversation>> {
        let client = db.get().await?;
        let rows = client
            .query(
                r#"
                SELECT id, participant_low, participant_high, organization_code,
                       created_at, last_message_at
                FROM conversations
                WHERE (participant_low = $1 OR participant_high = $1)
                  AND organization_code = $2
                ORDER BY last_message_at DESC
                LIMIT 100
                "#,
                &[&user_id, &organization_code],
            )
            .await?;

        Ok(rows.iter().map(row_to_conversation).collect())
    }
}
