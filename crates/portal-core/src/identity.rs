use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use portal_types::models::{ApprovalStatus, Role};

use crate::PortalError;
use crate::access::Actor;

/// How long an admin grant stays usable after it was issued.
pub const ADMIN_GRANT_TTL_SECS: i64 = 60 * 60;

/// Reason a signing-in account is silently promoted to admin. Only the
/// configured primary admin address and freshly issued grants qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    PrimaryAdmin,
    RecentGrant,
}

pub fn auto_elevation(
    email: &str,
    primary_admin_email: Option<&str>,
    grant_issued_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<Elevation> {
    if primary_admin_email.is_some_and(|primary| primary.eq_ignore_ascii_case(email.trim())) {
        return Some(Elevation::PrimaryAdmin);
    }
    match grant_issued_at {
        Some(issued) if issued <= now && now - issued <= Duration::seconds(ADMIN_GRANT_TTL_SECS) => {
            Some(Elevation::RecentGrant)
        }
        _ => None,
    }
}

/// What a signed-in account may reach given its approval status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalAccess {
    Dashboard,
    /// Signed in, but only the holding screen and profile are reachable.
    Holding,
    /// The session must be ended.
    SignedOut,
}

pub fn portal_access(status: ApprovalStatus) -> PortalAccess {
    match status {
        ApprovalStatus::Approved => PortalAccess::Dashboard,
        ApprovalStatus::Pending => PortalAccess::Holding,
        ApprovalStatus::Rejected => PortalAccess::SignedOut,
    }
}

/// Picks the student whose records populate the viewer's dashboard.
///
/// `linked_students` must be in link creation order; parents and mentors
/// default to the first one. Admins default to their own record. `None`
/// means a parent or mentor without any linked student.
pub fn resolve_subject(
    actor: Actor,
    linked_students: &[Uuid],
    requested: Option<Uuid>,
) -> Result<Option<Uuid>, PortalError> {
    match actor.role {
        Role::Student => match requested {
            Some(id) if id != actor.id => {
                Err(PortalError::forbidden("students can only view their own records"))
            }
            _ => Ok(Some(actor.id)),
        },
        Role::Admin => Ok(Some(requested.unwrap_or(actor.id))),
        Role::Parent | Role::Mentor => match requested {
            Some(id) if linked_students.contains(&id) => Ok(Some(id)),
            Some(_) => Err(PortalError::forbidden("student is not linked to this account")),
            None => Ok(linked_students.first().copied()),
        },
    }
}
