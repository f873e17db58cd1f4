use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use portal_core::PortalError;
use portal_core::identity::resolve_subject;
use portal_db::{Database, LinkKind};
use portal_types::api::{SubjectQuery, SubjectResponse, UpdateProfileRequest};
use portal_types::models::{Role, User, UserSummary};

use crate::error::ApiError;
use crate::session::{AnySession, Session};
use crate::state::AppState;

/// Earliest and latest university entry years accepted on a profile.
const ENTRY_YEARS: std::ops::RangeInclusive<i32> = 2000..=2100;

/// GET /me
pub async fn me(session: AnySession) -> Json<User> {
    Json(session.user)
}

/// PATCH /me/profile
pub async fn update_profile(
    State(state): State<AppState>,
    session: AnySession,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_profile(&req)?;
    let id = session.user.id;
    let user = state
        .with_db(move |db| db.update_profile(id, &req)?.ok_or(ApiError::NotFound("user")))
        .await?;
    Ok(Json(user))
}

/// POST /me/onboarding
pub async fn complete_onboarding(
    State(state): State<AppState>,
    session: AnySession,
) -> Result<impl IntoResponse, ApiError> {
    let id = session.user.id;
    let user = state
        .with_db(move |db| db.complete_onboarding(id)?.ok_or(ApiError::NotFound("user")))
        .await?;
    Ok(Json(user))
}

/// GET /me/subject: whose records the dashboard shows, and who else the
/// viewer could switch to.
pub async fn subject(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SubjectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = session.actor();
    let viewer = session.user;
    let response = state
        .with_db(move |db| {
            let available = available_students(db, &viewer)?;
            let linked: Vec<Uuid> = available.iter().map(|s| s.id).collect();
            let subject_id = resolve_subject(actor, &linked, query.student_id)?;

            let subject = match subject_id {
                None => None,
                Some(id) if id == viewer.id => Some(UserSummary::from(&viewer)),
                Some(id) => match available.iter().find(|s| s.id == id) {
                    Some(found) => Some(found.clone()),
                    None => {
                        let user = db
                            .get_user(id)?
                            .filter(|u| u.role == Role::Student)
                            .ok_or(PortalError::NotFound("student"))?;
                        Some(UserSummary::from(&user))
                    }
                },
            };
            Ok(SubjectResponse { subject, available })
        })
        .await?;
    Ok(Json(response))
}

/// GET /me/students
pub async fn my_students(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = session.user;
    let students = state.with_db(move |db| available_students(db, &viewer)).await?;
    Ok(Json(students))
}

/// Students the viewer may pick as subject: linked ones in link order for
/// parents and mentors, every student for admins, themselves for students.
fn available_students(db: &Database, viewer: &User) -> Result<Vec<UserSummary>, ApiError> {
    Ok(match viewer.role {
        Role::Student => vec![UserSummary::from(viewer)],
        Role::Parent => db.students_for(LinkKind::Guardian, viewer.id)?,
        Role::Mentor => db.students_for(LinkKind::Mentor, viewer.id)?,
        Role::Admin => db
            .list_users(Some(Role::Student), None)?
            .iter()
            .map(UserSummary::from)
            .collect(),
    })
}

pub(crate) fn validate_profile(req: &UpdateProfileRequest) -> Result<(), ApiError> {
    if req.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("full name cannot be blank"));
    }
    if req.entry_year.is_some_and(|y| !ENTRY_YEARS.contains(&y)) {
        return Err(ApiError::bad_request("entry year is out of range"));
    }
    Ok(())
}
