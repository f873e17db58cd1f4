use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use portal_core::PortalError;
use portal_core::access::{Actor, can_comment, can_edit_comment};
use portal_db::models::NewComment;
use portal_types::api::{CommentsQuery, CreateCommentRequest, UpdateCommentRequest};
use portal_types::models::Role;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

/// GET /students/{id}/comments?section=..&item_id=..
pub async fn list_comments(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
    Query(query): Query<CommentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    session.ensure_student(&state, student_id).await?;
    let comments = state
        .with_db(move |db| Ok(db.comments_for(student_id, query.section, query.item_id)?))
        .await?;
    Ok(Json(comments))
}

/// POST /students/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = req.body.trim().to_string();
    if body.is_empty() {
        return Err(ApiError::bad_request("comment body is empty"));
    }

    let actor = session.actor();
    let comment = state
        .with_db(move |db| {
            let student = db.get_user(student_id)?.ok_or(PortalError::NotFound("student"))?;
            if student.role != Role::Student {
                return Err(PortalError::NotFound("student").into());
            }

            let author = match req.author_id {
                Some(id) if id != actor.id => {
                    let user = db.get_user(id)?.ok_or(PortalError::NotFound("author"))?;
                    Actor::new(user.id, user.role)
                }
                _ => actor,
            };
            can_comment(db, actor, author, student_id)?;

            Ok(db.insert_comment(&NewComment {
                author_id: author.id,
                student_id,
                section: req.section,
                section_item_id: req.section_item_id,
                comment_type: req.comment_type,
                body: &body,
            })?)
        })
        .await?;

    info!("Comment {} on {} by {}", comment.id, comment.section, comment.author_id);
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PATCH /comments/{id}
pub async fn update_comment(
    State(state): State<AppState>,
    session: Session,
    Path(comment_id): Path<Uuid>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = req.body.map(|b| b.trim().to_string());
    if body.as_deref().is_some_and(str::is_empty) {
        return Err(ApiError::bad_request("comment body is empty"));
    }

    let actor = session.actor();
    let comment = state
        .with_db(move |db| {
            let existing = db.get_comment(comment_id)?.ok_or(PortalError::NotFound("comment"))?;
            if !can_edit_comment(actor, existing.author_id) {
                return Err(ApiError::forbidden("only the author or an admin may edit this comment"));
            }
            db.update_comment(comment_id, body.as_deref(), req.comment_type)?
                .ok_or(ApiError::NotFound("comment"))
        })
        .await?;
    Ok(Json(comment))
}

/// DELETE /comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    session: Session,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = session.actor();
    state
        .with_db(move |db| {
            let existing = db.get_comment(comment_id)?.ok_or(PortalError::NotFound("comment"))?;
            if !can_edit_comment(actor, existing.author_id) {
                return Err(ApiError::forbidden("only the author or an admin may delete this comment"));
            }
            db.delete_comment(comment_id)?;
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
