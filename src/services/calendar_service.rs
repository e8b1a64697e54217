use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::calendar::{CalendarEvent, CalendarEventPayload};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

pub struct CalendarService;

const EVENT_COLUMNS: &str = "event_id, organization_code, title, description, starts_at, \
                             participants, tag, created_by, created_by_name, created_at, updated_at";

fn row_to_event(row: &Row) -> CalendarEvent {
    CalendarEvent {
        event_id: row.get("event_id"),
        organization_code: row.get("organization_code"),
        title: row.get("title"),
        description: row.get("description"),
        starts_at: row.get("starts_at"),
        participants: row.get("participants"),
        tag: row.get("tag"),
        created_by: row.get("created_by"),
        created_by_name: row.get("created_by_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl CalendarService {
    /// All events of the caller's organization, soonest first.
    pub async fn list_for_org(db: &Pool, organization_code: &str) -> AppResult<Vec<CalendarEvent>> {
        let client = db.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM calendar_events \
                     WHERE organization_code = $1 \
                     ORDER BY starts_at ASC"
                ),
                &[&organization_code],
            )
            .await?;
        Ok(rows.iter().map(row_to_event).collect())
    }

    /// Save an event. The id is client-generated, so a repeat save with the
    /// same id updates the existing row in place. `created_by` keeps the
    /// original author across updates.
    pub async fn upsert(
        db: &Pool,
        author: &AuthUser,
        payload: &CalendarEventPayload,
    ) -> AppResult<CalendarEvent> {
        payload.validate()?;

        let client = db.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO calendar_events \
                       (event_id, organization_code, title, description, starts_at, \
                        participants, tag, created_by, created_by_name) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                     ON CONFLICT (event_id, organization_code) \
                     DO UPDATE SET title = EXCLUDED.title, \
                                   description = EXCLUDED.description, \
                                   starts_at = EXCLUDED.starts_at, \
                                   participants = EXCLUDED.participants, \
                                   tag = EXCLUDED.tag, \
                                   updated_at = NOW() \
                     RETURNING {EVENT_COLUMNS}"
                ),
                &[
                    &payload.id,
                    &author.organization_code,
                    &payload.title,
                    &payload.description,
                    &payload.starts_at,
                    &payload.participants,
                    &payload.tag,
                    &author.id,
                    &author.username,
                ],
            )
            .await?;

        Ok(row_to_event(&row))
    }

    /// Delete one of the caller's own events. Deleting someone else's event,
    /// or one that does not exist, is a 404 either way.
    pub async fn delete(
        db: &Pool,
        event_id: &str,
        organization_code: &str,
        created_by: Uuid,
    ) -> AppResult<()> {
        let client = db.get().await?;
        let deleted = client
            .execute(
                "DELETE FROM calendar_events \
                 WHERE event_id = $1 AND organization_code = $2 AND created_by = $3",
                &[&event_id, &organization_code, &created_by],
            )
            .await?;

        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
