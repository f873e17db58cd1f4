use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;
use uuid::Uuid;

use portal_core::PortalError;
use portal_core::access::{Actor, can_manage_users, ensure_can_view_student};
use portal_core::identity::{PortalAccess, portal_access};
use portal_types::api::Claims;
use portal_types::models::{Role, User};

use crate::error::ApiError;
use crate::state::AppState;

/// Any signed-in account that has not been rejected. Pending accounts get
/// this far, so only holding endpoints (profile, onboarding) take it.
#[derive(Debug, Clone)]
pub struct AnySession {
    pub user: User,
}

/// A signed-in, approved account.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
}

impl Session {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user.id, self.user.role)
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if can_manage_users(self.actor()) {
            Ok(())
        } else {
            Err(ApiError::forbidden("admin only"))
        }
    }

    /// Checks that the account may see `student_id` and that it names a student.
    pub async fn ensure_student(&self, state: &AppState, student_id: Uuid) -> Result<User, ApiError> {
        let actor = self.actor();
        state
            .with_db(move |db| {
                ensure_can_view_student(db, actor, student_id)?;
                match db.get_user(student_id)? {
                    Some(user) if user.role == Role::Student => Ok(user),
                    _ => Err(PortalError::NotFound("student").into()),
                }
            })
            .await
    }
}

impl FromRequestParts<AppState> for AnySession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(ApiError::Unauthorized)?;

        // A valid token whose account has since disappeared is treated as signed out.
        let user = state
            .with_db(move |db| Ok(db.get_user(claims.sub)?))
            .await?
            .ok_or(ApiError::Unauthorized)?;

        match portal_access(user.approval_status) {
            PortalAccess::SignedOut => {
                debug!("Rejected account {} signed out", user.id);
                Err(ApiError::Unauthorized)
            }
            PortalAccess::Dashboard | PortalAccess::Holding => Ok(AnySession { user }),
        }
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AnySession { user } = AnySession::from_request_parts(parts, state).await?;
        match portal_access(user.approval_status) {
            PortalAccess::Dashboard => Ok(Session { user }),
            _ => Err(PortalError::AwaitingApproval.into()),
        }
    }
}
