//! Row-level types that have no API counterpart. Everything else is read
//! straight into `portal_types::models`.

use portal_types::models::{CommentType, Role, Section, User};
use uuid::Uuid;

/// A user together with the stored password hash. Never serialized.
pub struct UserRow {
    pub user: User,
    pub password: String,
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub role: Role,
}

pub struct NewComment<'a> {
    pub author_id: Uuid,
    pub student_id: Uuid,
    pub section: Section,
    pub section_item_id: Option<Uuid>,
    pub comment_type: CommentType,
    pub body: &'a str,
}

pub struct NewDocument<'a> {
    pub id: Uuid,
    pub student_id: Uuid,
    pub uploader_id: Uuid,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size: u64,
    pub sha256: &'a str,
}

pub struct NewResource<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
    pub url: &'a str,
    pub created_by: Uuid,
}
