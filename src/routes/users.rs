use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::user::DirectoryUser;
use crate::services::presence_cache;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DirectoryEntry {
    #[serde(flatten)]
    user: DirectoryUser,
    online: bool,
}

/// GET /api/users: every member of the caller's organization except the
/// caller, with a live-presence flag. Presence comes from the Redis mirror
/// so the answer holds across service instances.
pub async fn list_users(state: web::Data<AppState>, auth: AuthUser) -> AppResult<HttpResponse> {
    let client = state.db.get().await?;
    let rows = client
        .query(
            "SELECT id, username, display_name, email FROM users \
             WHERE organization_code = $1 AND id <> $2 \
             ORDER BY username ASC",
            &[&auth.organization_code, &auth.id],
        )
        .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        let user = DirectoryUser {
            id: row.get("id"),
            username: row.get("username"),
            display_name: row.get("display_name"),
            email: row.get("email"),
        };
        let online = presence_cache::is_online(&state.redis, user.id).await;
        users.push(DirectoryEntry { user, online });
    }

    super::success("users", users)
}
