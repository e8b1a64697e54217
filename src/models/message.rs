use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    File,
}

impl MessageKind {
    pub fn as_db(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::File => "file",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageKind::Text),
            "file" => Some(MessageKind::File),
            _ => None,
        }
    }
}

/// Metadata for an uploaded file, stored as JSONB on the message row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDescriptor {
    pub original_name: String,
    pub stored_name: String,
    pub size: i64,
    pub mime_type: String,
}

/// Message row. Immutable after insert except `read_at` (NULL = unread).
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub recipient_id: Uuid,
    pub kind: MessageKind,
    pub body: Option<String>,
    pub file: Option<FileDescriptor>,
    pub organization_code: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_db_round_trip() {
        assert_eq!(MessageKind::from_db("text"), Some(MessageKind::Text));
        assert_eq!(MessageKind::from_db("file"), Some(MessageKind::File));
        assert_eq!(MessageKind::from_db("audio"), None);
        assert_eq!(MessageKind::Text.as_db(), "text");
    }

    #[test]
    fn file_descriptor_serializes_flat() {
        let fd = FileDescriptor {
            original_name: "report.pdf".into(),
            stored_name: "1714000000000-42.pdf".into(),
            size: 2048,
            mime_type: "application/pdf".into(),
        };
        let json = serde_json::to_value(&fd).unwrap();
        assert_eq!(json["original_name"], "report.pdf");
        assert_eq!(json["size"], 2048);
        let back: FileDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, fd);
    }
}
