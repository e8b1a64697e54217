use crate::models::calendar::{CalendarEvent, CalendarEventPayload};
use crate::models::message::FileDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user visible in the `users_online` roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnlineUser {
    pub id: Uuid,
    pub username: String,
}

/// Inbound WebSocket events, client to server.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    #[serde(rename = "send_message")]
    SendMessage { recipient_id: Uuid, body: String },

    #[serde(rename = "typing")]
    Typing { recipient_id: Uuid },

    #[serde(rename = "stop_typing")]
    StopTyping { recipient_id: Uuid },

    /// Save a calendar event and relay it to one recipient if they are online.
    #[serde(rename = "calendar_event")]
    CalendarEvent {
        event: CalendarEventPayload,
        #[serde(default)]
        recipient_id: Option<Uuid>,
    },
}

/// Outbound WebSocket events, server to client.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    #[serde(rename = "new_message")]
    NewMessage {
        message_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        body: String,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "file_received")]
    FileReceived {
        message_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        file: FileDescriptor,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "users_online")]
    UsersOnline { users: Vec<OnlineUser> },

    #[serde(rename = "user_typing")]
    UserTyping { user_id: Uuid, username: String },

    #[serde(rename = "user_stopped_typing")]
    UserStoppedTyping { user_id: Uuid, username: String },

    #[serde(rename = "calendar_event")]
    CalendarEvent { event: CalendarEvent },

    /// Feedback for a rejected inbound event (bad payload, unknown recipient).
    #[serde(rename = "error")]
    Error { message: String },
}

impl WsOutboundEvent {
    /// Serialize for the socket channel. Event shapes are all serializable;
    /// a failure here would be a programming error, so it is logged and an
    /// empty payload returned rather than panicking in the delivery path.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize outbound ws event");
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_message() {
        let raw = r#"{"type":"send_message","recipient_id":"6a25c3e0-3a1a-4a08-9f9f-27a8a4f3f000","body":"hi"}"#;
        match serde_json::from_str::<WsInboundEvent>(raw).unwrap() {
            WsInboundEvent::SendMessage { body, .. } => assert_eq!(body, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_typing_events() {
        let raw = r#"{"type":"typing","recipient_id":"6a25c3e0-3a1a-4a08-9f9f-27a8a4f3f000"}"#;
        assert!(matches!(
            serde_json::from_str::<WsInboundEvent>(raw).unwrap(),
            WsInboundEvent::Typing { .. }
        ));

        let raw = r#"{"type":"stop_typing","recipient_id":"6a25c3e0-3a1a-4a08-9f9f-27a8a4f3f000"}"#;
        assert!(matches!(
            serde_json::from_str::<WsInboundEvent>(raw).unwrap(),
            WsInboundEvent::StopTyping { .. }
        ));
    }

    #[test]
    fn rejects_unknown_event_type() {
        let raw = r#"{"type":"launch_missiles"}"#;
        assert!(serde_json::from_str::<WsInboundEvent>(raw).is_err());
    }

    #[test]
    fn users_online_tags_type_field() {
        let event = WsOutboundEvent::UsersOnline {
            users: vec![OnlineUser {
                id: Uuid::new_v4(),
                username: "alice".into(),
            }],
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["type"], "users_online");
        assert_eq!(value["users"][0]["username"], "alice");
    }

    #[test]
    fn new_message_tags_type_field() {
        let event = WsOutboundEvent::NewMessage {
            message_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            sender_name: "alice".into(),
            body: "hello".into(),
            created_at: Utc::now(),
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["type"], "new_message");
        assert_eq!(value["body"], "hello");
    }
}
