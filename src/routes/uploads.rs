//! File relay: multipart upload that dispatches a file message, and an
//! org-checked download endpoint for the stored blobs.

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::message::FileDescriptor;
use crate::services::delivery;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Extension of the original filename, restricted to a short alphanumeric
/// suffix so client input never influences the path.
fn safe_extension(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

fn make_stored_name(original_name: &str) -> String {
    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        safe_extension(original_name)
    )
}

/// Download names are server-generated; anything outside that shape is a
/// traversal attempt or a typo, both worth a 404.
fn is_valid_stored_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !name.contains("..")
}

struct SavedUpload {
    descriptor: FileDescriptor,
    path: PathBuf,
}

async fn save_field(
    field: &mut actix_multipart::Field,
    upload_dir: &Path,
    max_bytes: usize,
) -> AppResult<SavedUpload> {
    let original_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(str::to_owned)
        .ok_or_else(|| AppError::BadRequest("file part must have a filename".into()))?;

    let mime_type = field
        .content_type()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".into());

    let stored_name = make_stored_name(&original_name);
    let path = upload_dir.join(&stored_name);

    let mut out = tokio::fs::File::create(&path).await.map_err(|e| {
        tracing::error!(error = %e, path = %path.display(), "failed to create upload file");
        AppError::Internal
    })?;

    let mut written: usize = 0;
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::warn!(error = %e, "multipart read failed mid-upload");
            AppError::BadRequest("upload interrupted".into())
        })?;
        written += chunk.len();
        if written > max_bytes {
            drop(out);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AppError::PayloadTooLarge { limit: max_bytes });
        }
        out.write_all(&chunk).await.map_err(|e| {
            tracing::error!(error = %e, "failed to write upload chunk");
            AppError::Internal
        })?;
    }
    out.flush().await.map_err(|e| {
        tracing::error!(error = %e, "failed to flush upload");
        AppError::Internal
    })?;

    Ok(SavedUpload {
        descriptor: FileDescriptor {
            original_name,
            stored_name,
            size: written as i64,
            mime_type,
        },
        path,
    })
}

async fn read_text_field(field: &mut actix_multipart::Field) -> AppResult<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|_| AppError::BadRequest("malformed form field".into()))?;
        buf.extend_from_slice(&chunk);
        if buf.len() > 256 {
            return Err(AppError::BadRequest("form field too long".into()));
        }
    }
    String::from_utf8(buf).map_err(|_| AppError::BadRequest("form field is not utf-8".into()))
}

/// Remove a stored blob whose upload was rejected.
async fn discard_blob(saved: &Option<SavedUpload>) {
    if let Some(saved) = saved {
        if let Err(e) = tokio::fs::remove_file(&saved.path).await {
            tracing::warn!(error = %e, path = %saved.path.display(), "failed to remove rejected upload");
        }
    }
}

/// POST /upload: multipart form with a `recipient_id` field and a `file`
/// part. The blob is written under a server-generated name, then a file
/// message is dispatched to the recipient exactly like a text message.
/// Every failure after the blob hits disk deletes it again; no orphans.
pub async fn upload_file(
    state: web::Data<AppState>,
    auth: AuthUser,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut saved: Option<SavedUpload> = None;

    match receive_and_dispatch(&state, &auth, &mut payload, &mut saved).await {
        Ok(message) => {
            tracing::info!(
                message_id = %message.id,
                sender = %auth.id,
                "file uploaded and dispatched"
            );
            super::success("message", message)
        }
        Err(e) => {
            discard_blob(&saved).await;
            Err(e)
        }
    }
}

/// Parse the multipart parts and dispatch the file message. The blob lands in
/// `saved` as soon as it is written so the caller can clean up on any error,
/// including ones raised mid-parse.
async fn receive_and_dispatch(
    state: &AppState,
    auth: &AuthUser,
    payload: &mut Multipart,
    saved: &mut Option<SavedUpload>,
) -> AppResult<crate::models::message::Message> {
    let mut recipient_id: Option<Uuid> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|_| AppError::BadRequest("malformed multipart body".into()))?
    {
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .unwrap_or("")
            .to_owned();

        match name.as_str() {
            "recipient_id" => {
                let raw = read_text_field(&mut field).await?;
                let id = raw
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest("recipient_id must be a uuid".into()))?;
                recipient_id = Some(id);
            }
            "file" => {
                if saved.is_some() {
                    return Err(AppError::BadRequest("only one file per upload".into()));
                }
                *saved = Some(
                    save_field(&mut field, &state.config.upload_dir, state.config.max_upload_bytes)
                        .await?,
                );
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    let recipient_id =
        recipient_id.ok_or_else(|| AppError::BadRequest("recipient_id is required".into()))?;
    let descriptor = saved
        .as_ref()
        .map(|s| s.descriptor.clone())
        .ok_or_else(|| AppError::BadRequest("file part is required".into()))?;

    delivery::dispatch_file(state, auth, recipient_id, &descriptor).await
}

/// GET /uploads/{stored_name}: serve a stored blob. The file must belong to
/// the caller's organization; anything else is indistinguishable from absent.
pub async fn download_file(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let stored_name = path.into_inner();
    if !is_valid_stored_name(&stored_name) {
        return Err(AppError::NotFound);
    }

    let found = crate::services::MessageService::find_file(&state.db, &stored_name).await?;
    let Some((organization_code, descriptor)) = found else {
        return Err(AppError::NotFound);
    };
    if organization_code != auth.organization_code {
        return Err(AppError::NotFound);
    }

    let file_path = state.config.upload_dir.join(&stored_name);
    let bytes = tokio::fs::read(&file_path).await.map_err(|e| {
        tracing::warn!(error = %e, %stored_name, "stored file missing on disk");
        AppError::NotFound
    })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        descriptor.original_name.replace(['"', '\\'], "_")
    );

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, descriptor.mime_type))
        .insert_header((header::CONTENT_DISPOSITION, disposition))
        .body(bytes))
}
