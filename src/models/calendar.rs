use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Calendar event row. `event_id` is client-generated so saves are upserts,
/// unique per organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub event_id: String,
    pub organization_code: String,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub participants: Vec<Uuid>,
    pub tag: String,
    pub created_by: Uuid,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    /// Listing visibility: the author and the invited participants.
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.participants.contains(&user_id)
    }
}

/// Client payload for saving an event (HTTP POST and the `calendar_event`
/// socket message share this shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventPayload {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<Uuid>,
    #[serde(default)]
    pub tag: String,
}

impl CalendarEventPayload {
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.id.trim().is_empty() {
            return Err(crate::error::AppError::BadRequest(
                "event id is required".into(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(crate::error::AppError::BadRequest(
                "title is required".into(),
            ));
        }
        if self.title.len() > 255 {
            return Err(crate::error::AppError::BadRequest(
                "title too long (max 255)".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(id: &str, title: &str) -> CalendarEventPayload {
        CalendarEventPayload {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            starts_at: Utc::now(),
            participants: vec![],
            tag: String::new(),
        }
    }

    #[test]
    fn validate_requires_id_and_title() {
        assert!(payload("evt-1", "Standup").validate().is_ok());
        assert!(payload("", "Standup").validate().is_err());
        assert!(payload("evt-1", "  ").validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_title() {
        assert!(payload("evt-1", &"x".repeat(256)).validate().is_err());
    }

    #[test]
    fn involves_author_and_participants_only() {
        let author = Uuid::new_v4();
        let invitee = Uuid::new_v4();
        let event = CalendarEvent {
            event_id: "evt-1".into(),
            organization_code: "acme".into(),
            title: "Standup".into(),
            description: String::new(),
            starts_at: Utc::now(),
            participants: vec![invitee],
            tag: String::new(),
            created_by: author,
            created_by_name: "alice".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(event.involves(author));
        assert!(event.involves(invitee));
        assert!(!event.involves(Uuid::new_v4()));
    }

    #[test]
    fn payload_defaults_optional_fields() {
        let p: CalendarEventPayload = serde_json::from_value(serde_json::json!({
            "id": "evt-9",
            "title": "Review",
            "starts_at": "2026-09-01T14:00:00Z"
        }))
        .unwrap();
        assert!(p.description.is_empty());
        assert!(p.participants.is_empty());
        assert!(p.tag.is_empty());
    }
}
