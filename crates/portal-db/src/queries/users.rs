use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use portal_types::api::{AdminUpdateUserRequest, UpdateProfileRequest};
use portal_types::models::{ApprovalStatus, OnboardingStatus, Role, User};

use super::{OptionalExt, enum_at, format_ts, opt_enum_at, ts_at, uuid_at};
use crate::Database;
use crate::models::{NewUser, UserRow};

pub(crate) const USER_COLUMNS: &str = "id, email, role, approval_status, onboarding_status, full_name, \
     phone, school, academic_summary, target_course, entry_year, created_at";

pub(crate) fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        role: enum_at(row, 2)?,
        approval_status: enum_at(row, 3)?,
        onboarding_status: enum_at(row, 4)?,
        full_name: row.get(5)?,
        phone: row.get(6)?,
        school: row.get(7)?,
        academic_summary: row.get(8)?,
        target_course: opt_enum_at(row, 9)?,
        entry_year: row.get(10)?,
        created_at: ts_at(row, 11)?,
    })
}

impl Database {
    // -- Users --

    /// Inserts a signup as pending/pending. Returns `None` when the email is
    /// already registered.
    pub fn create_user(&self, new: &NewUser) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, role, full_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(email) DO NOTHING",
                params![
                    new.id.to_string(),
                    new.email,
                    new.password_hash,
                    new.role.as_str(),
                    new.full_name,
                    format_ts(Utc::now()),
                ],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            query_user(conn, new.id)
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {}, password FROM users WHERE email = ?1", USER_COLUMNS),
                [email],
                |row| {
                    Ok(UserRow {
                        user: map_user(row)?,
                        password: row.get(12)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.get_user(*id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    pub fn list_users(&self, role: Option<Role>, status: Option<ApprovalStatus>) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users
                 WHERE (?1 IS NULL OR role = ?1) AND (?2 IS NULL OR approval_status = ?2)
                 ORDER BY created_at",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![role.map(|r| r.as_str()), status.map(|s| s.as_str())],
                    map_user,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies the non-empty fields of a profile edit. Returns the updated user.
    pub fn update_profile(&self, id: Uuid, req: &UpdateProfileRequest) -> Result<Option<User>> {
        self.with_conn(|conn| {
            apply_profile(conn, id, req)?;
            query_user(conn, id)
        })
    }

    /// Admin edit: role, approval, onboarding and any profile field.
    pub fn admin_update_user(&self, id: Uuid, req: &AdminUpdateUserRequest) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    role = COALESCE(?2, role),
                    approval_status = COALESCE(?3, approval_status),
                    onboarding_status = COALESCE(?4, onboarding_status)
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    req.role.map(|r| r.as_str()),
                    req.approval_status.map(|s| s.as_str()),
                    req.onboarding_status.map(|s| s.as_str()),
                ],
            )?;
            apply_profile(conn, id, &req.profile)?;
            query_user(conn, id)
        })
    }

    pub fn complete_onboarding(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET onboarding_status = ?2 WHERE id = ?1",
                params![id.to_string(), OnboardingStatus::Complete.as_str()],
            )?;
            query_user(conn, id)
        })
    }

    /// Makes the user an approved, onboarded admin.
    pub fn elevate_to_admin(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET role = ?2, approval_status = ?3, onboarding_status = ?4 WHERE id = ?1",
                params![
                    id.to_string(),
                    Role::Admin.as_str(),
                    ApprovalStatus::Approved.as_str(),
                    OnboardingStatus::Complete.as_str(),
                ],
            )?;
            query_user(conn, id)
        })
    }

    // -- Admin grants --

    pub fn put_admin_grant(&self, email: &str, granted_by: Uuid) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO admin_grants (email, granted_by, granted_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET granted_by = ?2, granted_at = ?3",
                params![email, granted_by.to_string(), format_ts(now)],
            )?;
            Ok(now)
        })
    }

    pub fn get_admin_grant(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT granted_at FROM admin_grants WHERE email = ?1", [email], |row| {
                ts_at(row, 0)
            })
            .optional()
        })
    }

    pub fn delete_admin_grant(&self, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM admin_grants WHERE email = ?1", [email])?;
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id.to_string()],
        map_user,
    )
    .optional()
}

fn apply_profile(conn: &Connection, id: Uuid, req: &UpdateProfileRequest) -> Result<()> {
    conn.execute(
        "UPDATE users SET
            full_name = COALESCE(?2, full_name),
            phone = COALESCE(?3, phone),
            school = COALESCE(?4, school),
            academic_summary = COALESCE(?5, academic_summary),
            target_course = COALESCE(?6, target_course),
            entry_year = COALESCE(?7, entry_year)
         WHERE id = ?1",
        params![
            id.to_string(),
            req.full_name,
            req.phone,
            req.school,
            req.academic_summary,
            req.target_course.map(|c| c.as_str()),
            req.entry_year,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use portal_types::models::TargetCourse;

    pub(crate) fn seed_user(db: &Database, email: &str, role: Role) -> User {
        db.create_user(&NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash: "hash",
            full_name: email.split('@').next().unwrap_or(email),
            role,
        })
        .unwrap()
        .unwrap()
    }

    #[test]
    fn duplicate_email_is_not_inserted() {
        let db = Database::open_in_memory().unwrap();
        let first = seed_user(&db, "sam@example.com", Role::Student);

        let second = db
            .create_user(&NewUser {
                id: Uuid::new_v4(),
                email: "sam@example.com",
                password_hash: "other",
                full_name: "Impostor",
                role: Role::Parent,
            })
            .unwrap();
        assert!(second.is_none());

        let row = db.get_user_by_email("sam@example.com").unwrap().unwrap();
        assert_eq!(row.user.id, first.id);
        assert_eq!(row.password, "hash");
    }

    #[test]
    fn signup_starts_pending() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "sam@example.com", Role::Student);

        assert_eq!(user.approval_status, ApprovalStatus::Pending);
        assert_eq!(user.onboarding_status, OnboardingStatus::Pending);

        let row = db.get_user_by_email("sam@example.com").unwrap().unwrap();
        assert_eq!(row.user.id, user.id);
        assert_eq!(row.password, "hash");
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn profile_edit_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "sam@example.com", Role::Student);

        let updated = db
            .update_profile(
                user.id,
                &UpdateProfileRequest {
                    school: Some("Kingsway Academy".into()),
                    target_course: Some(TargetCourse::Medicine),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.full_name, "sam");
        assert_eq!(updated.school.as_deref(), Some("Kingsway Academy"));
        assert_eq!(updated.target_course, Some(TargetCourse::Medicine));
    }

    #[test]
    fn admin_edits_and_filters() {
        let db = Database::open_in_memory().unwrap();
        let sam = seed_user(&db, "sam@example.com", Role::Student);
        seed_user(&db, "pat@example.com", Role::Parent);

        db.admin_update_user(
            sam.id,
            &AdminUpdateUserRequest {
                approval_status: Some(ApprovalStatus::Approved),
                ..Default::default()
            },
        )
        .unwrap();

        let approved = db.list_users(None, Some(ApprovalStatus::Approved)).unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, sam.id);
        assert_eq!(db.list_users(Some(Role::Parent), None).unwrap().len(), 1);
        assert_eq!(db.list_users(None, None).unwrap().len(), 2);
    }

    #[test]
    fn elevation_completes_approval_and_onboarding() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "owner@example.com", Role::Mentor);
        let admin = db.elevate_to_admin(user.id).unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.approval_status, ApprovalStatus::Approved);
        assert_eq!(admin.onboarding_status, OnboardingStatus::Complete);
    }

    #[test]
    fn grants_are_replaced_and_deleted() {
        let db = Database::open_in_memory().unwrap();
        let admin = seed_user(&db, "owner@example.com", Role::Admin);

        assert!(db.get_admin_grant("new@example.com").unwrap().is_none());
        let first = db.put_admin_grant("new@example.com", admin.id).unwrap();
        let second = db.put_admin_grant("new@example.com", admin.id).unwrap();
        assert!(second >= first);
        let stored = db.get_admin_grant("new@example.com").unwrap().unwrap();
        assert!((stored - second).num_milliseconds().abs() < 1);

        db.delete_admin_grant("new@example.com").unwrap();
        assert!(db.get_admin_grant("new@example.com").unwrap().is_none());
    }
}
