use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use portal_core::access::can_link_users;
use portal_db::LinkKind;
use portal_types::api::LinkRequest;
use portal_types::models::Role;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

fn parse_kind(raw: &str) -> Result<LinkKind, ApiError> {
    match raw {
        "guardians" => Ok(LinkKind::Guardian),
        "mentors" => Ok(LinkKind::Mentor),
        _ => Err(ApiError::NotFound("link type")),
    }
}

fn ensure_can_link(session: &Session) -> Result<(), ApiError> {
    if can_link_users(session.actor()) {
        Ok(())
    } else {
        Err(ApiError::forbidden("only admins manage links"))
    }
}

/// POST /admin/links/{kind}
pub async fn create_link(
    State(state): State<AppState>,
    session: Session,
    Path(kind): Path<String>,
    Json(req): Json<LinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_can_link(&session)?;
    let kind = parse_kind(&kind)?;
    let expected = match kind {
        LinkKind::Guardian => Role::Parent,
        LinkKind::Mentor => Role::Mentor,
    };

    let created = state
        .with_db(move |db| {
            let user = db.get_user(req.user_id)?.ok_or(ApiError::NotFound("user"))?;
            let student = db.get_user(req.student_id)?.ok_or(ApiError::NotFound("student"))?;
            if user.role != expected {
                return Err(ApiError::bad_request(format!("user must have role {}", expected)));
            }
            if student.role != Role::Student {
                return Err(ApiError::bad_request("only students can be linked to"));
            }
            Ok(db.link(kind, user.id, student.id)?)
        })
        .await?;

    if created {
        info!("Linked {} to student {} ({:?})", req.user_id, req.student_id, kind);
    }
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!({ "created": created }))))
}

/// DELETE /admin/links/{kind}
pub async fn delete_link(
    State(state): State<AppState>,
    session: Session,
    Path(kind): Path<String>,
    Json(req): Json<LinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_can_link(&session)?;
    let kind = parse_kind(&kind)?;
    let removed = state
        .with_db(move |db| Ok(db.unlink(kind, req.user_id, req.student_id)?))
        .await?;
    if !removed {
        return Err(ApiError::NotFound("link"));
    }
    info!("Unlinked {} from student {} ({:?})", req.user_id, req.student_id, kind);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /students/{id}/guardians
pub async fn guardians(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_can_link(&session)?;
    let list = state.with_db(move |db| Ok(db.guardians_for(student_id)?)).await?;
    Ok(Json(list))
}

/// GET /students/{id}/mentors
pub async fn mentors(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_can_link(&session)?;
    let list = state.with_db(move |db| Ok(db.mentors_for(student_id)?)).await?;
    Ok(Json(list))
}
