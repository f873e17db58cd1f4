use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};
use uuid::Uuid;

use portal_core::PortalError;
use portal_core::access::{Actor, can_message, ensure_can_view_student, message_context};
use portal_core::threading::{MessageDraft, build_threads, is_participant, plan_message};
use portal_types::api::{MarkReadResponse, MessagesQuery, SendMessageRequest, UnreadResponse};
use portal_types::models::{ApprovalStatus, Role, UserSummary};

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

/// POST /messages: starts a thread, or replies when `parent_message_id` is set.
pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = session.actor();
    // Replies take their student from the parent.
    let student_id = match req.parent_message_id {
        Some(_) => req.student_id,
        None => message_context(actor, req.student_id),
    };
    let draft = MessageDraft {
        sender_id: actor.id,
        recipient_id: req.recipient_id,
        student_id,
        body: req.body,
        subject: req.subject,
        parent_message_id: req.parent_message_id,
        thread_id: req.thread_id,
    };

    let message = state
        .with_db(move |db| {
            let parent = match draft.parent_message_id {
                Some(parent_id) => {
                    let parent = db.get_message(parent_id)?.ok_or(PortalError::NotFound("parent message"))?;
                    if !actor.is_admin()
                        && !db
                            .thread_messages(parent.thread_id)?
                            .iter()
                            .any(|m| is_participant(m, actor.id))
                    {
                        return Err(ApiError::forbidden("not a participant of this thread"));
                    }
                    Some(parent)
                }
                None => None,
            };

            let planned = plan_message(draft, parent.as_ref())?;

            if !planned.is_reply() {
                let recipient = match planned.recipient_id {
                    Some(id) => {
                        let user = db.get_user(id)?.ok_or(PortalError::NotFound("recipient"))?;
                        if user.approval_status != ApprovalStatus::Approved {
                            return Err(ApiError::bad_request("recipient account is not active"));
                        }
                        Some(Actor::new(user.id, user.role))
                    }
                    None => None,
                };
                if let Some(student_id) = planned.student_id {
                    match db.get_user(student_id)? {
                        Some(user) if user.role == Role::Student => {}
                        _ => return Err(PortalError::NotFound("student").into()),
                    }
                }
                if !can_message(db, actor, recipient, planned.student_id)? {
                    return Err(ApiError::forbidden("you cannot message this account"));
                }
            }

            Ok(db.insert_message(&planned)?)
        })
        .await?;

    debug!("Message {} stored in thread {}", message.id, message.thread_id);
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /messages: the viewer's threads, newest activity first.
pub async fn list_messages(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = mailbox_owner(&session, query.user_id)?;
    let messages = state
        .with_db(move |db| Ok(db.messages_for_user(user_id, query.student_id)?))
        .await?;
    Ok(Json(build_threads(messages)))
}

/// GET /messages/unread
pub async fn unread_count(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = mailbox_owner(&session, query.user_id)?;
    let count = state
        .with_db(move |db| Ok(db.unread_count(user_id, query.student_id)?))
        .await?;
    Ok(Json(UnreadResponse { count }))
}

/// POST /threads/{id}/read
pub async fn mark_thread_read(
    State(state): State<AppState>,
    session: Session,
    Path(thread_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = session.user.id;
    let updated = state
        .with_db(move |db| Ok(db.mark_thread_read(thread_id, user_id)?))
        .await?;
    if updated > 0 {
        info!("Marked {} message(s) read in thread {} for {}", updated, thread_id, user_id);
    }
    Ok(Json(MarkReadResponse { updated }))
}

/// GET /students/{id}/recipients: accounts the viewer may address about the
/// student.
pub async fn recipients(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = session.actor();
    let list = state
        .with_db(move |db| {
            ensure_can_view_student(db, actor, student_id)?;
            let student = match db.get_user(student_id)? {
                Some(user) if user.role == Role::Student => user,
                _ => return Err(PortalError::NotFound("student").into()),
            };

            let mut candidates = vec![UserSummary::from(&student)];
            candidates.extend(db.guardians_for(student_id)?);
            candidates.extend(db.mentors_for(student_id)?);
            candidates.extend(
                db.list_users(Some(Role::Admin), Some(ApprovalStatus::Approved))?
                    .iter()
                    .map(UserSummary::from),
            );

            let mut seen = std::collections::HashSet::new();
            let mut allowed = Vec::new();
            for candidate in candidates {
                if !seen.insert(candidate.id) {
                    continue;
                }
                let recipient = Actor::new(candidate.id, candidate.role);
                if can_message(db, actor, Some(recipient), Some(student_id))? {
                    allowed.push(candidate);
                }
            }
            Ok(allowed)
        })
        .await?;
    Ok(Json(list))
}

/// Admins may read another account's mailbox; everyone else reads their own.
fn mailbox_owner(session: &Session, requested: Option<Uuid>) -> Result<Uuid, ApiError> {
    match requested {
        Some(id) if id != session.user.id => {
            session.require_admin()?;
            Ok(id)
        }
        _ => Ok(session.user.id),
    }
}
