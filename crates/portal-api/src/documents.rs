use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use portal_core::PortalError;
use portal_core::access::ensure_can_view_student;
use portal_db::models::NewDocument;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

/// 20 MB upload limit for documents
pub const MAX_DOCUMENT_SIZE: usize = 20 * 1024 * 1024;

const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
}

/// POST /students/{id}/documents?file_name=..: raw bytes in the body, type
/// taken from `Content-Type`.
pub async fn upload_document(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = clean_file_name(&query.file_name)?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("document is empty"));
    }
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();

    session.ensure_student(&state, student_id).await?;

    let document_id = Uuid::new_v4();
    let sha256 = state.storage.write(document_id, &bytes).await.map_err(|e| {
        error!("Failed to write document {}: {}", document_id, e);
        ApiError::Internal
    })?;

    let uploader_id = session.user.id;
    let size = bytes.len() as u64;
    let inserted = state
        .with_db(move |db| {
            Ok(db.insert_document(&NewDocument {
                id: document_id,
                student_id,
                uploader_id,
                file_name: &file_name,
                content_type: &content_type,
                size,
                sha256: &sha256,
            })?)
        })
        .await;

    let document = match inserted {
        Ok(document) => document,
        Err(e) => {
            state.storage.remove(document_id).await;
            return Err(e);
        }
    };

    info!("Stored document {} ({} bytes) for {}", document.id, document.size, student_id);
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /students/{id}/documents
pub async fn list_documents(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    session.ensure_student(&state, student_id).await?;
    let documents = state.with_db(move |db| Ok(db.documents_for(student_id)?)).await?;
    Ok(Json(documents))
}

/// GET /documents/{id}: the stored bytes as an attachment.
pub async fn download_document(
    State(state): State<AppState>,
    session: Session,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = session.actor();
    let document = state
        .with_db(move |db| {
            let document = db.get_document(document_id)?.ok_or(PortalError::NotFound("document"))?;
            ensure_can_view_student(db, actor, document.student_id)?;
            Ok(document)
        })
        .await?;

    let bytes = state.storage.read(document_id).await.map_err(|e| {
        error!("Failed to read document {}: {}", document_id, e);
        ApiError::NotFound("document")
    })?;

    let content_type = HeaderValue::from_str(&document.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", document.file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        bytes,
    ))
}

/// DELETE /documents/{id}: the uploader or an admin.
pub async fn delete_document(
    State(state): State<AppState>,
    session: Session,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = session.actor();
    state
        .with_db(move |db| {
            let document = db.get_document(document_id)?.ok_or(PortalError::NotFound("document"))?;
            if !actor.is_admin() && document.uploader_id != actor.id {
                return Err(ApiError::forbidden("only the uploader or an admin may delete this document"));
            }
            db.delete_document(document_id)?;
            Ok(())
        })
        .await?;
    state.storage.remove(document_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Keeps the final path component and drops quotes and control characters.
fn clean_file_name(raw: &str) -> Result<String, ApiError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(ApiError::bad_request("file name is required"));
    }
    if cleaned.len() > MAX_FILE_NAME_LEN {
        return Err(ApiError::bad_request("file name is too long"));
    }
    Ok(cleaned.to_string())
}
