use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use portal_types::models::{CommentType, MentorComment, Section};

use super::{OptionalExt, enum_at, format_ts, opt_uuid_at, ts_at, uuid_at};
use crate::Database;
use crate::models::NewComment;

const COMMENT_COLUMNS: &str =
    "id, author_id, student_id, section, section_item_id, comment_type, body, created_at, updated_at";

fn map_comment(row: &Row) -> rusqlite::Result<MentorComment> {
    Ok(MentorComment {
        id: uuid_at(row, 0)?,
        author_id: uuid_at(row, 1)?,
        student_id: uuid_at(row, 2)?,
        section: enum_at(row, 3)?,
        section_item_id: opt_uuid_at(row, 4)?,
        comment_type: enum_at(row, 5)?,
        body: row.get(6)?,
        created_at: ts_at(row, 7)?,
        updated_at: ts_at(row, 8)?,
    })
}

impl Database {
    // -- Mentor comments --

    pub fn insert_comment(&self, new: &NewComment) -> Result<MentorComment> {
        let id = Uuid::new_v4();
        let now = format_ts(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mentor_comments
                    (id, author_id, student_id, section, section_item_id, comment_type, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id.to_string(),
                    new.author_id.to_string(),
                    new.student_id.to_string(),
                    new.section.as_str(),
                    new.section_item_id.map(|i| i.to_string()),
                    new.comment_type.as_str(),
                    new.body,
                    now,
                ],
            )?;
            query_comment(conn, id)?.ok_or_else(|| anyhow::anyhow!("comment {} vanished after insert", id))
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<MentorComment>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// Exact scope match: `item_id = None` returns only section-level comments.
    pub fn comments_for(
        &self,
        student_id: Uuid,
        section: Section,
        item_id: Option<Uuid>,
    ) -> Result<Vec<MentorComment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM mentor_comments
                 WHERE student_id = ?1 AND section = ?2 AND section_item_id IS ?3
                 ORDER BY created_at",
                COMMENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![student_id.to_string(), section.as_str(), item_id.map(|i| i.to_string())],
                    map_comment,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_comment(
        &self,
        id: Uuid,
        body: Option<&str>,
        comment_type: Option<CommentType>,
    ) -> Result<Option<MentorComment>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE mentor_comments SET
                    body = COALESCE(?2, body),
                    comment_type = COALESCE(?3, comment_type),
                    updated_at = ?4
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    body,
                    comment_type.map(|t| t.as_str()),
                    format_ts(Utc::now()),
                ],
            )?;
            query_comment(conn, id)
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM mentor_comments WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }
}

fn query_comment(conn: &Connection, id: Uuid) -> Result<Option<MentorComment>> {
    conn.query_row(
        &format!("SELECT {} FROM mentor_comments WHERE id = ?1", COMMENT_COLUMNS),
        [id.to_string()],
        map_comment,
    )
    .optional()
}
