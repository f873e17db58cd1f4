//! Capability checks. Every authorization decision in the portal goes through
//! one of the functions here; handlers never compare roles directly.

use anyhow::Result;
use uuid::Uuid;

use portal_types::models::Role;

use crate::PortalError;

/// The account performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Read access to the parent/mentor link tables.
pub trait LinkLookup {
    fn is_guardian_of(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool>;
    fn is_mentor_of(&self, mentor_id: Uuid, student_id: Uuid) -> Result<bool>;
}

/// A parent or mentor sees a student only through a live link row.
pub fn can_view_student(links: &impl LinkLookup, actor: Actor, student_id: Uuid) -> Result<bool> {
    match actor.role {
        Role::Admin => Ok(true),
        Role::Student => Ok(actor.id == student_id),
        Role::Parent => links.is_guardian_of(actor.id, student_id),
        Role::Mentor => links.is_mentor_of(actor.id, student_id),
    }
}

pub fn ensure_can_view_student(
    links: &impl LinkLookup,
    actor: Actor,
    student_id: Uuid,
) -> Result<(), PortalError> {
    if can_view_student(links, actor, student_id)? {
        Ok(())
    } else {
        Err(PortalError::forbidden("no access to this student"))
    }
}

/// Whether `actor` may start a conversation with `recipient` about `student_id`.
///
/// With a student context both parties must belong to that student's circle
/// (the student, a linked parent or mentor, or an admin). A `None` recipient
/// addresses the student themselves. Without a student context, students
/// talk about themselves and parents/mentors may only address admins or
/// their linked students directly.
pub fn can_message(
    links: &impl LinkLookup,
    actor: Actor,
    recipient: Option<Actor>,
    student_id: Option<Uuid>,
) -> Result<bool> {
    if recipient.is_some_and(|r| r.id == actor.id) {
        return Ok(false);
    }
    if actor.is_admin() {
        return Ok(true);
    }

    match (message_context(actor, student_id), recipient) {
        (Some(student), Some(recipient)) => Ok(can_view_student(links, actor, student)?
            && can_view_student(links, recipient, student)?),
        (Some(student), None) => {
            Ok(actor.id != student && can_view_student(links, actor, student)?)
        }
        (None, Some(recipient)) => Ok(match recipient.role {
            Role::Admin => true,
            Role::Student => can_view_student(links, actor, recipient.id)?,
            Role::Parent | Role::Mentor => false,
        }),
        (None, None) => Ok(false),
    }
}

/// The student a new conversation is about. Students without an explicit
/// context talk about themselves.
pub fn message_context(actor: Actor, student_id: Option<Uuid>) -> Option<Uuid> {
    match (student_id, actor.role) {
        (Some(student), _) => Some(student),
        (None, Role::Student) => Some(actor.id),
        (None, _) => None,
    }
}

/// Checks comment authorship. `author` is whose name goes on the comment; it
/// differs from `actor` only when an admin writes on a mentor's behalf.
pub fn can_comment(
    links: &impl LinkLookup,
    actor: Actor,
    author: Actor,
    student_id: Uuid,
) -> Result<(), PortalError> {
    if actor.id != author.id && !actor.is_admin() {
        return Err(PortalError::forbidden("only admins may comment on behalf of a mentor"));
    }
    match author.role {
        Role::Admin => Ok(()),
        Role::Mentor => {
            if actor.is_admin() || links.is_mentor_of(author.id, student_id)? {
                Ok(())
            } else {
                Err(PortalError::forbidden("mentor is not linked to this student"))
            }
        }
        Role::Student | Role::Parent => {
            Err(PortalError::forbidden("only mentors and admins may comment"))
        }
    }
}

/// Scores, portfolio entries and other self-reported records are written by
/// the student or by an admin on their behalf.
pub fn can_edit_records(actor: Actor, student_id: Uuid) -> bool {
    actor.is_admin() || (actor.role == Role::Student && actor.id == student_id)
}

pub fn can_edit_comment(actor: Actor, author_id: Uuid) -> bool {
    actor.is_admin() || actor.id == author_id
}

pub fn can_link_users(actor: Actor) -> bool {
    actor.is_admin()
}

pub fn can_manage_users(actor: Actor) -> bool {
    actor.is_admin()
}
