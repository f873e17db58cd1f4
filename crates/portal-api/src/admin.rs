use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Duration;
use futures_util::future::join_all;
use tracing::info;
use uuid::Uuid;

use portal_core::email::{is_valid_email, normalize_email, personalize};
use portal_core::identity::ADMIN_GRANT_TTL_SECS;
use portal_types::api::{
    AdminEmailRequest, AdminGrantResponse, AdminUpdateUserRequest, CreateGrantRequest, EmailOutcome,
    EmailPayload, UsersQuery,
};
use portal_types::models::{ApprovalStatus, User};

use crate::email::EmailKind;
use crate::error::ApiError;
use crate::profile::validate_profile;
use crate::session::Session;
use crate::state::AppState;

/// GET /admin/users?role=..&approval_status=..
pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<UsersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let users = state
        .with_db(move |db| Ok(db.list_users(query.role, query.approval_status)?))
        .await?;
    Ok(Json(users))
}

/// PATCH /admin/users/{id}: approval decisions, role changes and profile edits.
pub async fn update_user(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    validate_profile(&req.profile)?;
    if user_id == session.user.id
        && (req.approval_status.is_some_and(|s| s != ApprovalStatus::Approved)
            || req.role.is_some_and(|r| r != session.user.role))
    {
        return Err(ApiError::bad_request("admins cannot demote or unapprove themselves"));
    }

    let admin_id = session.user.id;
    let user = state
        .with_db(move |db| db.admin_update_user(user_id, &req)?.ok_or(ApiError::NotFound("user")))
        .await?;
    info!(
        "Admin {} updated {}: role={} approval={} onboarding={}",
        admin_id, user.id, user.role, user.approval_status, user.onboarding_status
    );
    Ok(Json(user))
}

/// POST /admin/grants: the named email becomes admin if it signs up or in
/// within the hour.
pub async fn create_grant(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateGrantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("invalid email address"));
    }

    let admin_id = session.user.id;
    let stored = email.clone();
    let granted_at = state
        .with_db(move |db| Ok(db.put_admin_grant(&stored, admin_id)?))
        .await?;
    info!("Admin {} granted admin to {}", admin_id, email);

    Ok((
        StatusCode::CREATED,
        Json(AdminGrantResponse {
            email,
            granted_at,
            expires_at: granted_at + Duration::seconds(ADMIN_GRANT_TTL_SECS),
        }),
    ))
}

/// POST /admin/email: one personalized mail per recipient.
pub async fn send_email(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<AdminEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    if req.subject.trim().is_empty() {
        return Err(ApiError::bad_request("subject is required"));
    }
    if req.html_content.trim().is_empty() && req.text_content.trim().is_empty() {
        return Err(ApiError::bad_request("email content is required"));
    }

    let ids = req.recipient_ids.clone();
    let role = req.role;
    let recipients = state
        .with_db(move |db| {
            let mut users = db.get_users(&ids)?;
            users.retain(|u| u.approval_status == ApprovalStatus::Approved);
            if let Some(role) = role {
                users.extend(db.list_users(Some(role), Some(ApprovalStatus::Approved))?);
            }
            let mut seen = HashSet::new();
            users.retain(|u| seen.insert(u.id));
            Ok(users)
        })
        .await?;
    if recipients.is_empty() {
        return Err(ApiError::bad_request("no recipients selected"));
    }

    let outcomes = join_all(recipients.iter().map(|user| send_one(&state, &req, user))).await;
    let sent = outcomes.iter().filter(|o| o.success).count();
    info!("Admin {} emailed {}/{} recipients", session.user.id, sent, outcomes.len());
    Ok(Json(outcomes))
}

async fn send_one(state: &AppState, req: &AdminEmailRequest, user: &User) -> EmailOutcome {
    let payload = EmailPayload {
        recipients: vec![user.email.clone()],
        subject: personalize(&req.subject, user),
        html_content: personalize(&req.html_content, user),
        text_content: personalize(&req.text_content, user),
        from_name: state.config.email_from_name.clone(),
    };
    let result = state.mailer.send(EmailKind::Admin, &payload).await;
    EmailOutcome {
        email: user.email.clone(),
        success: result.success,
        error: result.error,
    }
}
