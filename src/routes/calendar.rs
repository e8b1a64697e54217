use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::calendar::{CalendarEvent, CalendarEventPayload};
use crate::services::CalendarService;
use crate::state::AppState;
use actix_web::{web, HttpResponse};

/// GET /api/calendar/events: events the caller created or is invited to.
pub async fn list_events(state: web::Data<AppState>, auth: AuthUser) -> AppResult<HttpResponse> {
    let events: Vec<CalendarEvent> = CalendarService::list_for_org(&state.db, &auth.organization_code)
        .await?
        .into_iter()
        .filter(|e| e.involves(auth.id))
        .collect();
    super::success("events", events)
}

/// POST /api/calendar/events: save an event. The client generates the id, so
/// posting the same id again updates the event in place.
pub async fn save_event(
    state: web::Data<AppState>,
    auth: AuthUser,
    payload: web::Json<CalendarEventPayload>,
) -> AppResult<HttpResponse> {
    let event = CalendarService::upsert(&state.db, &auth, &payload).await?;
    tracing::info!(event_id = %event.event_id, author = %auth.id, "calendar event saved");
    super::success("event", event)
}

/// DELETE /api/calendar/events/{event_id}: remove one of the caller's events.
pub async fn delete_event(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let event_id = path.into_inner();
    CalendarService::delete(&state.db, &event_id, &auth.organization_code, auth.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
