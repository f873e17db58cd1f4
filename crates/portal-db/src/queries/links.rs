use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use portal_core::access::LinkLookup;
use portal_types::models::UserSummary;

use super::{enum_at, format_ts, uuid_at};
use crate::Database;

/// Which association table a link lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Guardian,
    Mentor,
}

impl LinkKind {
    fn table(self) -> &'static str {
        match self {
            LinkKind::Guardian => "parent_student_links",
            LinkKind::Mentor => "mentor_student_links",
        }
    }

    fn column(self) -> &'static str {
        match self {
            LinkKind::Guardian => "parent_id",
            LinkKind::Mentor => "mentor_id",
        }
    }
}

impl Database {
    // -- Links --

    /// Idempotent. Returns whether a new row was written.
    pub fn link(&self, kind: LinkKind, user_id: Uuid, student_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} ({}, student_id, created_at) VALUES (?1, ?2, ?3)",
                    kind.table(),
                    kind.column()
                ),
                params![user_id.to_string(), student_id.to_string(), format_ts(Utc::now())],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Removes only the association row. Returns whether one existed.
    pub fn unlink(&self, kind: LinkKind, user_id: Uuid, student_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                &format!("DELETE FROM {} WHERE {} = ?1 AND student_id = ?2", kind.table(), kind.column()),
                params![user_id.to_string(), student_id.to_string()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn is_linked(&self, kind: LinkKind, user_id: Uuid, student_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND student_id = ?2)",
                    kind.table(),
                    kind.column()
                ),
                params![user_id.to_string(), student_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    /// Students linked to a parent or mentor, oldest link first.
    pub fn students_for(&self, kind: LinkKind, user_id: Uuid) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT u.id, u.full_name, u.email, u.role
                 FROM {} l JOIN users u ON u.id = l.student_id
                 WHERE l.{} = ?1
                 ORDER BY l.seq",
                kind.table(),
                kind.column()
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], map_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Parents or mentors linked to a student, oldest link first.
    pub fn linked_to_student(&self, kind: LinkKind, student_id: Uuid) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT u.id, u.full_name, u.email, u.role
                 FROM {} l JOIN users u ON u.id = l.{}
                 WHERE l.student_id = ?1
                 ORDER BY l.seq",
                kind.table(),
                kind.column()
            ))?;
            let rows = stmt
                .query_map([student_id.to_string()], map_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn guardians_for(&self, student_id: Uuid) -> Result<Vec<UserSummary>> {
        self.linked_to_student(LinkKind::Guardian, student_id)
    }

    pub fn mentors_for(&self, student_id: Uuid) -> Result<Vec<UserSummary>> {
        self.linked_to_student(LinkKind::Mentor, student_id)
    }
}

fn map_summary(row: &rusqlite::Row) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: uuid_at(row, 0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        role: enum_at(row, 3)?,
    })
}

impl LinkLookup for Database {
    fn is_guardian_of(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool> {
        self.is_linked(LinkKind::Guardian, parent_id, student_id)
    }

    fn is_mentor_of(&self, mentor_id: Uuid, student_id: Uuid) -> Result<bool> {
        self.is_linked(LinkKind::Mentor, mentor_id, student_id)
    }
}

#[cfg(test)]
mod tests {
    use portal_core::access::{Actor, can_view_student};
    use portal_types::models::Role;

    use super::*;
    use crate::queries::users::tests::seed_user;

    #[test]
    fn link_is_idempotent_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        let parent = seed_user(&db, "pat@example.com", Role::Parent);
        let first = seed_user(&db, "ann@example.com", Role::Student);
        let second = seed_user(&db, "ben@example.com", Role::Student);

        assert!(db.link(LinkKind::Guardian, parent.id, second.id).unwrap());
        assert!(db.link(LinkKind::Guardian, parent.id, first.id).unwrap());
        assert!(!db.link(LinkKind::Guardian, parent.id, second.id).unwrap());

        let students: Vec<Uuid> = db
            .students_for(LinkKind::Guardian, parent.id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(students, vec![second.id, first.id]);
        assert_eq!(db.guardians_for(first.id).unwrap()[0].id, parent.id);
        assert!(db.mentors_for(first.id).unwrap().is_empty());
    }

    #[test]
    fn unlink_revokes_visibility() {
        let db = Database::open_in_memory().unwrap();
        let mentor = seed_user(&db, "mo@example.com", Role::Mentor);
        let student = seed_user(&db, "ann@example.com", Role::Student);
        let actor = Actor::new(mentor.id, Role::Mentor);

        assert!(!can_view_student(&db, actor, student.id).unwrap());
        db.link(LinkKind::Mentor, mentor.id, student.id).unwrap();
        assert!(can_view_student(&db, actor, student.id).unwrap());
        assert!(!db.is_guardian_of(mentor.id, student.id).unwrap());

        assert!(db.unlink(LinkKind::Mentor, mentor.id, student.id).unwrap());
        assert!(!db.unlink(LinkKind::Mentor, mentor.id, student.id).unwrap());
        assert!(!can_view_student(&db, actor, student.id).unwrap());
        assert!(db.students_for(LinkKind::Mentor, mentor.id).unwrap().is_empty());
    }
}
