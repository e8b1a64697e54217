//! WebSocket session actor.
//!
//! One actor per connected client. On connect the session registers itself in
//! the presence registry, flushes messages queued while the user was offline,
//! and broadcasts the refreshed org roster. Inbound frames are small JSON
//! events; everything heavier (persistence, fan-out) runs in spawned tasks so
//! the actor loop stays responsive.

use crate::error::AppError;
use crate::middleware::auth::{bearer_token, verify_jwt};
use crate::middleware::AuthUser;
use crate::services::{delivery, presence_cache, CalendarService};
use crate::state::AppState;
use crate::websocket::{SessionId, WsInboundEvent, WsOutboundEvent};
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// GET /ws?token=... (or Authorization: Bearer). The token is verified
/// before presence is registered; a rejected upgrade rolls the registry
/// entry back.
pub async fn ws_entry(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    let token = query
        .into_inner()
        .token
        .or_else(|| bearer_token(&req))
        .ok_or(AppError::Unauthorized)?;
    let claims = verify_jwt(&token, &state.config.jwt_secret)?;
    let user = AuthUser::from(claims);
    let user_id = user.id;

    let (session_id, rx) = state
        .registry
        .register(user.id, &user.username, &user.organization_code)
        .await;

    let session = WsSession {
        state: state.get_ref().clone(),
        user,
        session_id,
        rx: Some(rx),
        hb: Instant::now(),
    };
    match ws::start(session, &req, stream) {
        Ok(resp) => {
            tracing::info!(%user_id, "websocket connected");
            Ok(resp)
        }
        Err(e) => {
            state.registry.remove(user_id, session_id).await;
            Err(e)
        }
    }
}

pub struct WsSession {
    state: AppState,
    user: AuthUser,
    session_id: SessionId,
    /// Receiver end of this session's registry channel; moved into the actor
    /// stream in `started`.
    rx: Option<UnboundedReceiver<String>>,
    hb: Instant,
}

impl WsSession {
    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let user_id = self.user.id;
        ctx.run_interval(HEARTBEAT_INTERVAL, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::info!(%user_id, "websocket heartbeat timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");

            let redis = act.state.redis.clone();
            let ttl = act.state.config.presence_ttl_secs;
            actix::spawn(async move {
                presence_cache::refresh(&redis, user_id, ttl).await;
            });
        });
    }

    /// User-facing text for a failed inbound event. Internal failures stay in
    /// the logs.
    fn client_error(e: &AppError) -> String {
        match e {
            AppError::BadRequest(msg) => msg.clone(),
            _ => "message delivery failed".into(),
        }
    }

    fn dispatch(&self, event: WsInboundEvent) {
        let state = self.state.clone();
        let user = self.user.clone();

        match event {
            WsInboundEvent::SendMessage { recipient_id, body } => {
                actix::spawn(async move {
                    if let Err(e) = delivery::dispatch_text(&state, &user, recipient_id, &body).await
                    {
                        tracing::warn!(sender = %user.id, %recipient_id, error = %e, "send_message failed");
                        let feedback = WsOutboundEvent::Error {
                            message: Self::client_error(&e),
                        };
                        state.registry.send_to(user.id, feedback.to_json()).await;
                    }
                });
            }
            WsInboundEvent::Typing { recipient_id } => {
                actix::spawn(async move {
                    let event = WsOutboundEvent::UserTyping {
                        user_id: user.id,
                        username: user.username.clone(),
                    };
                    state
                        .registry
                        .send_to_member(recipient_id, &user.organization_code, event.to_json())
                        .await;
                });
            }
            WsInboundEvent::StopTyping { recipient_id } => {
                actix::spawn(async move {
                    let event = WsOutboundEvent::UserStoppedTyping {
                        user_id: user.id,
                        username: user.username.clone(),
                    };
                    state
                        .registry
                        .send_to_member(recipient_id, &user.organization_code, event.to_json())
                        .await;
                });
            }
            WsInboundEvent::CalendarEvent {
                event,
                recipient_id,
            } => {
                actix::spawn(async move {
                    match CalendarService::upsert(&state.db, &user, &event).await {
                        Ok(saved) => {
                            let outbound = WsOutboundEvent::CalendarEvent { event: saved };
                            let payload = outbound.to_json();
                            // Echo the saved state back, then relay.
                            state.registry.send_to(user.id, payload.clone()).await;
                            if let Some(recipient_id) = recipient_id {
                                state
                                    .registry
                                    .send_to_member(
                                        recipient_id,
                                        &user.organization_code,
                                        payload,
                                    )
                                    .await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(author = %user.id, error = %e, "calendar_event failed");
                            let feedback = WsOutboundEvent::Error {
                                message: Self::client_error(&e),
                            };
                            state.registry.send_to(user.id, feedback.to_json()).await;
                        }
                    }
                });
            }
        }
    }
}

async fn broadcast_roster(state: &AppState, organization_code: &str) {
    let users = state.registry.snapshot_org(organization_code).await;
    let event = WsOutboundEvent::UsersOnline { users };
    state
        .registry
        .broadcast_org(organization_code, event.to_json())
        .await;
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);

        // Drain the registry channel into the socket. The stream ending means
        // another session replaced this one; the default finished() stops the
        // actor, which is exactly the takeover we want.
        if let Some(rx) = self.rx.take() {
            let forwarded = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|payload| (payload, rx))
            });
            ctx.add_stream(forwarded);
        }

        let state = self.state.clone();
        let user = self.user.clone();
        actix::spawn(async move {
            presence_cache::mark_online(&state.redis, user.id, state.config.presence_ttl_secs)
                .await;
            if let Err(e) = delivery::flush_unread(&state, user.id).await {
                tracing::warn!(user_id = %user.id, error = %e, "unread flush failed");
            }
            broadcast_roster(&state, &user.organization_code).await;
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let state = self.state.clone();
        let user_id = self.user.id;
        let organization_code = self.user.organization_code.clone();
        let session_id = self.session_id;

        actix::spawn(async move {
            // A replaced session no longer owns the entry; only the owner
            // tears presence down and announces the departure.
            if state.registry.remove(user_id, session_id).await {
                presence_cache::mark_offline(&state.redis, user_id).await;
                broadcast_roster(&state, &organization_code).await;
                tracing::info!(%user_id, "websocket disconnected");
            }
        });
    }
}

/// Outbound payloads from the registry channel.
impl StreamHandler<String> for WsSession {
    fn handle(&mut self, payload: String, ctx: &mut Self::Context) {
        if !payload.is_empty() {
            ctx.text(payload);
        }
    }
}

/// Frames from the client.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                match serde_json::from_str::<WsInboundEvent>(&text) {
                    Ok(event) => self.dispatch(event),
                    Err(e) => {
                        tracing::debug!(user_id = %self.user.id, error = %e, "unparseable ws event");
                        let feedback = WsOutboundEvent::Error {
                            message: "unrecognized event".into(),
                        };
                        ctx.text(feedback.to_json());
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::debug!(user_id = %self.user.id, "ignoring binary ws frame");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::debug!(user_id = %self.user.id, error = %e, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}
