use serde::Serialize;
use uuid::Uuid;

/// Directory entry returned by GET /api/users (org-scoped).
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: String,
}
