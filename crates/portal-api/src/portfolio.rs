use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use portal_core::PortalError;
use portal_core::access::can_edit_records;
use portal_core::scores::{
    chronological, days_until, highest_total, portfolio_completeness, recent_average,
    validate_activity,
};
use portal_types::api::{DashboardResponse, PortfolioActivityInput};

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;
use crate::ucat::ensure_can_edit;

/// GET /students/{id}/portfolio
pub async fn list_activities(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    session.ensure_student(&state, student_id).await?;
    let activities = state.with_db(move |db| Ok(db.activities_for(student_id)?)).await?;
    Ok(Json(activities))
}

/// POST /students/{id}/portfolio
pub async fn create_activity(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
    Json(req): Json<PortfolioActivityInput>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_can_edit(&session, student_id)?;
    validate_activity(&req)?;
    session.ensure_student(&state, student_id).await?;

    let activity = state
        .with_db(move |db| Ok(db.insert_activity(student_id, &req)?))
        .await?;
    info!("Recorded {} activity {} for {}", activity.category, activity.id, student_id);
    Ok((StatusCode::CREATED, Json(activity)))
}

/// DELETE /portfolio/{id}
pub async fn delete_activity(
    State(state): State<AppState>,
    session: Session,
    Path(activity_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = session.actor();
    state
        .with_db(move |db| {
            let activity = db.get_activity(activity_id)?.ok_or(PortalError::NotFound("activity"))?;
            if !can_edit_records(actor, activity.student_id) {
                return Err(ApiError::forbidden("only the student or an admin may change these records"));
            }
            db.delete_activity(activity_id)?;
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /students/{id}/dashboard: headline figures for one student, plus the
/// viewer's own unread count about them.
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    session.ensure_student(&state, student_id).await?;
    let viewer = session.user.id;
    let (mut mocks, portfolio_count, unread_messages) = state
        .with_db(move |db| {
            let mocks = db.mocks_for(student_id)?;
            let activities = db.activities_for(student_id)?;
            let unread = db.unread_count(viewer, Some(student_id))?;
            Ok((mocks, activities.len(), unread))
        })
        .await?;
    chronological(&mut mocks);

    let config = &state.config;
    Ok(Json(DashboardResponse {
        student_id,
        mock_count: mocks.len(),
        highest_total: highest_total(&mocks),
        recent_average: recent_average(&mocks, config.average_window),
        average_window: config.average_window,
        portfolio_count,
        portfolio_completeness: portfolio_completeness(portfolio_count, config.portfolio_target),
        days_until_deadline: days_until(Utc::now().date_naive(), config.deadline),
        unread_messages,
    }))
}
