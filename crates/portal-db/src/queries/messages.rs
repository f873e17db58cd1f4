use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use portal_core::threading::PlannedMessage;
use portal_types::models::Message;

use super::{OptionalExt, format_ts, opt_uuid_at, ts_at, uuid_at};
use crate::Database;

const MESSAGE_COLUMNS: &str = "id, thread_id, sender_id, recipient_id, student_id, subject, body, \
     parent_message_id, is_read, created_at";

/// Rows addressed to `:user`: explicitly, or as the subject student of a message
/// without a recipient that they did not send themselves.
const ADDRESSED_TO_USER: &str = "(recipient_id = :user
      OR (recipient_id IS NULL AND student_id = :user AND sender_id != :user))";

fn map_message(row: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, 0)?,
        thread_id: uuid_at(row, 1)?,
        sender_id: uuid_at(row, 2)?,
        recipient_id: opt_uuid_at(row, 3)?,
        student_id: opt_uuid_at(row, 4)?,
        subject: row.get(5)?,
        body: row.get(6)?,
        parent_message_id: opt_uuid_at(row, 7)?,
        is_read: row.get(8)?,
        created_at: ts_at(row, 9)?,
    })
}

impl Database {
    // -- Messages --

    pub fn insert_message(&self, planned: &PlannedMessage) -> Result<Message> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, thread_id, sender_id, recipient_id, student_id, subject, body, parent_message_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    planned.thread_id.to_string(),
                    planned.sender_id.to_string(),
                    planned.recipient_id.map(|r| r.to_string()),
                    planned.student_id.map(|s| s.to_string()),
                    planned.subject,
                    planned.body,
                    planned.parent_message_id.map(|p| p.to_string()),
                    format_ts(Utc::now()),
                ],
            )?;
            query_message(conn, id)?.ok_or_else(|| anyhow::anyhow!("message {} vanished after insert", id))
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Every message of every thread the user takes part in as sender,
    /// recipient or subject student, oldest first. `student_id` narrows the
    /// result to threads about one student.
    pub fn messages_for_user(&self, user_id: Uuid, student_id: Option<Uuid>) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages
                 WHERE thread_id IN (
                     SELECT thread_id FROM messages
                     WHERE sender_id = :user OR recipient_id = :user OR student_id = :user
                 )
                 AND (:student IS NULL OR student_id = :student)
                 ORDER BY created_at, seq",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::named_params! {
                        ":user": user_id.to_string(),
                        ":student": student_id.map(|s| s.to_string()),
                    },
                    map_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn thread_messages(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE thread_id = ?1 ORDER BY created_at, seq",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([thread_id.to_string()], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Sets `is_read` on the thread's messages addressed to the user. A plain
    /// set-to-true: repeating it changes nothing. Returns rows flipped.
    pub fn mark_thread_read(&self, thread_id: Uuid, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                &format!(
                    "UPDATE messages SET is_read = 1
                     WHERE thread_id = :thread AND is_read = 0 AND {}",
                    ADDRESSED_TO_USER
                ),
                rusqlite::named_params! {
                    ":thread": thread_id.to_string(),
                    ":user": user_id.to_string(),
                },
            )?;
            Ok(updated)
        })
    }

    pub fn unread_count(&self, user_id: Uuid, student_id: Option<Uuid>) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM messages
                     WHERE is_read = 0 AND {}
                     AND (:student IS NULL OR student_id = :student)",
                    ADDRESSED_TO_USER
                ),
                rusqlite::named_params! {
                    ":user": user_id.to_string(),
                    ":student": student_id.map(|s| s.to_string()),
                },
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

fn query_message(conn: &Connection, id: Uuid) -> Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
        [id.to_string()],
        map_message,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use portal_core::threading::{MessageDraft, build_threads, plan_message};
    use portal_types::models::{Role, User};

    use super::*;
    use crate::LinkKind;
    use crate::queries::users::tests::seed_user;

    struct Family {
        db: Database,
        parent: User,
        student: User,
        mentor: User,
    }

    fn family() -> Family {
        let db = Database::open_in_memory().unwrap();
        let parent = seed_user(&db, "pat@example.com", Role::Parent);
        let student = seed_user(&db, "ann@example.com", Role::Student);
        let mentor = seed_user(&db, "mo@example.com", Role::Mentor);
        db.link(LinkKind::Guardian, parent.id, student.id).unwrap();
        db.link(LinkKind::Mentor, mentor.id, student.id).unwrap();
        Family { db, parent, student, mentor }
    }

    fn send(db: &Database, draft: MessageDraft) -> Message {
        let parent = match draft.parent_message_id {
            Some(id) => db.get_message(id).unwrap(),
            None => None,
        };
        let planned = plan_message(draft, parent.as_ref()).unwrap();
        db.insert_message(&planned).unwrap()
    }

    fn root(sender: Uuid, recipient: Option<Uuid>, student: Uuid, body: &str) -> MessageDraft {
        MessageDraft {
            sender_id: sender,
            recipient_id: recipient,
            student_id: Some(student),
            body: body.into(),
            subject: Some("Personal statement".into()),
            ..Default::default()
        }
    }

    fn reply(sender: Uuid, parent: &Message, body: &str) -> MessageDraft {
        MessageDraft {
            sender_id: sender,
            body: body.into(),
            parent_message_id: Some(parent.id),
            ..Default::default()
        }
    }

    #[test]
    fn conversation_between_parent_and_mentor_about_student() {
        let f = family();
        let first = send(&f.db, root(f.parent.id, Some(f.mentor.id), f.student.id, "How is Ann doing?"));
        let answer = send(&f.db, reply(f.mentor.id, &first, "Very well."));
        let follow_up = send(&f.db, reply(f.parent.id, &answer, "Great, thanks."));

        assert_eq!(answer.recipient_id, Some(f.parent.id));
        assert_eq!(follow_up.recipient_id, Some(f.mentor.id));
        assert_eq!(follow_up.thread_id, first.thread_id);
        assert_eq!(follow_up.student_id, Some(f.student.id));

        for user in [f.parent.id, f.mentor.id, f.student.id] {
            let threads = build_threads(f.db.messages_for_user(user, None).unwrap());
            assert_eq!(threads.len(), 1, "user {} should see the thread", user);
            assert_eq!(threads[0].message.id, first.id);
            assert_eq!(threads[0].replies[0].replies[0].message.id, follow_up.id);
        }
    }

    #[test]
    fn read_state_is_idempotent_and_scoped_to_recipient() {
        let f = family();
        let a = send(&f.db, root(f.mentor.id, Some(f.parent.id), f.student.id, "Update one"));
        send(&f.db, reply(f.mentor.id, &a, "And another thing"));
        let b = send(&f.db, root(f.mentor.id, Some(f.parent.id), f.student.id, "Separate topic"));

        assert_eq!(f.db.unread_count(f.parent.id, None).unwrap(), 3);
        assert_eq!(f.db.mark_thread_read(a.thread_id, f.parent.id).unwrap(), 2);
        assert_eq!(f.db.mark_thread_read(a.thread_id, f.parent.id).unwrap(), 0);
        assert_eq!(f.db.unread_count(f.parent.id, None).unwrap(), 1);

        // The sender's view of the same thread is untouched.
        assert_eq!(f.db.mark_thread_read(b.thread_id, f.mentor.id).unwrap(), 0);
        assert!(!f.db.get_message(b.id).unwrap().unwrap().is_read);
    }

    #[test]
    fn message_without_recipient_counts_for_the_student() {
        let f = family();
        let note = send(&f.db, root(f.parent.id, None, f.student.id, "Dinner at six"));

        assert_eq!(f.db.unread_count(f.student.id, None).unwrap(), 1);
        assert_eq!(f.db.unread_count(f.parent.id, None).unwrap(), 0);

        let answer = send(&f.db, reply(f.student.id, &note, "OK"));
        assert_eq!(answer.recipient_id, Some(f.parent.id));
        assert_eq!(f.db.unread_count(f.parent.id, Some(f.student.id)).unwrap(), 1);

        assert_eq!(f.db.mark_thread_read(note.thread_id, f.student.id).unwrap(), 1);
        assert_eq!(f.db.unread_count(f.student.id, None).unwrap(), 0);
    }

    #[test]
    fn student_filter_and_unlink_keep_history() {
        let f = family();
        let other = seed_user(&f.db, "ben@example.com", Role::Student);
        f.db.link(LinkKind::Guardian, f.parent.id, other.id).unwrap();

        send(&f.db, root(f.parent.id, Some(f.mentor.id), f.student.id, "About Ann"));
        send(&f.db, root(f.parent.id, None, other.id, "About Ben"));

        assert_eq!(build_threads(f.db.messages_for_user(f.parent.id, None).unwrap()).len(), 2);
        let about_ann = build_threads(f.db.messages_for_user(f.parent.id, Some(f.student.id)).unwrap());
        assert_eq!(about_ann.len(), 1);
        assert_eq!(about_ann[0].message.body, "About Ann");

        f.db.unlink(LinkKind::Guardian, f.parent.id, f.student.id).unwrap();
        let after = build_threads(f.db.messages_for_user(f.parent.id, Some(f.student.id)).unwrap());
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn unrelated_users_see_nothing() {
        let f = family();
        let outsider = seed_user(&f.db, "zed@example.com", Role::Parent);
        send(&f.db, root(f.parent.id, Some(f.mentor.id), f.student.id, "Private"));
        assert!(f.db.messages_for_user(outsider.id, None).unwrap().is_empty());
        assert_eq!(f.db.thread_messages(Uuid::new_v4()).unwrap().len(), 0);
    }
}
