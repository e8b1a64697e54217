use crate::error::{AppError, AppResult};
use actix_web::{web, HttpResponse};
use serde::Serialize;

pub mod calendar;
pub mod messages;
pub mod uploads;
pub mod users;
pub mod wsroute;

/// Success bodies mirror the error shape: `{"success": true, "<key>": ...}`.
pub(crate) fn success<T: Serialize>(key: &str, value: T) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(success_body(key, value)?))
}

fn success_body<T: Serialize>(key: &str, value: T) -> AppResult<serde_json::Value> {
    let value = serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "serialize response body");
        AppError::Internal
    })?;
    let mut body = serde_json::Map::new();
    body.insert("success".into(), serde_json::Value::Bool(true));
    body.insert(key.into(), value);
    Ok(serde_json::Value::Object(body))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/ws", web::get().to(wsroute::ws_entry))
        .service(
            web::scope("/api")
                .route("/users", web::get().to(users::list_users))
                .route(
                    "/messages/{recipient_id}",
                    web::get().to(messages::history_with),
                )
                .route("/conversations", web::get().to(messages::list_conversations))
                .route("/calendar/events", web::get().to(calendar::list_events))
                .route("/calendar/events", web::post().to(calendar::save_event))
                .route(
                    "/calendar/events/{event_id}",
                    web::delete().to(calendar::delete_event),
                ),
        )
        .route("/upload", web::post().to(uploads::upload_file))
        .route("/uploads/{stored_name}", web::get().to(uploads::download_file));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_wraps_value_under_key() {
        let body = success_body("users", vec!["alice", "bob"]).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["users"][0], "alice");
        assert_eq!(body["users"][1], "bob");
    }

    #[test]
    fn success_body_matches_error_envelope_shape() {
        let body = success_body("events", serde_json::json!([])).unwrap();
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert!(keys.contains(&&"success".to_string()));
        assert_eq!(body["events"].as_array().unwrap().len(), 0);
    }
}
