use anyhow::Result;
use chrono::Utc;
use rusqlite::{Row, params};
use uuid::Uuid;

use portal_types::models::{Document, Resource};

use super::{OptionalExt, format_ts, ts_at, uuid_at};
use crate::Database;
use crate::models::{NewDocument, NewResource};

const DOCUMENT_COLUMNS: &str = "id, student_id, uploader_id, file_name, content_type, size, sha256, created_at";
const RESOURCE_COLUMNS: &str = "id, title, description, category, url, created_by, created_at";

fn map_document(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: uuid_at(row, 0)?,
        student_id: uuid_at(row, 1)?,
        uploader_id: uuid_at(row, 2)?,
        file_name: row.get(3)?,
        content_type: row.get(4)?,
        size: row.get(5)?,
        sha256: row.get(6)?,
        created_at: ts_at(row, 7)?,
    })
}

fn map_resource(row: &Row) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        url: row.get(4)?,
        created_by: uuid_at(row, 5)?,
        created_at: ts_at(row, 6)?,
    })
}

impl Database {
    // -- Documents --

    /// Records metadata for a file already written to storage under `new.id`.
    pub fn insert_document(&self, new: &NewDocument) -> Result<Document> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", DOCUMENT_COLUMNS),
                params![
                    new.id.to_string(),
                    new.student_id.to_string(),
                    new.uploader_id.to_string(),
                    new.file_name,
                    new.content_type,
                    new.size,
                    new.sha256,
                    format_ts(Utc::now()),
                ],
            )?;
            conn.query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                [new.id.to_string()],
                map_document,
            )
            .map_err(Into::into)
        })
    }

    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                [id.to_string()],
                map_document,
            )
            .optional()
        })
    }

    /// Newest upload first.
    pub fn documents_for(&self, student_id: Uuid) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM documents WHERE student_id = ?1 ORDER BY created_at DESC",
                DOCUMENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([student_id.to_string()], map_document)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_document(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM documents WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }

    // -- Resources --

    pub fn insert_resource(&self, new: &NewResource) -> Result<Resource> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO resources ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)", RESOURCE_COLUMNS),
                params![
                    id.to_string(),
                    new.title,
                    new.description,
                    new.category,
                    new.url,
                    new.created_by.to_string(),
                    format_ts(Utc::now()),
                ],
            )?;
            conn.query_row(
                &format!("SELECT {} FROM resources WHERE id = ?1", RESOURCE_COLUMNS),
                [id.to_string()],
                map_resource,
            )
            .map_err(Into::into)
        })
    }

    pub fn list_resources(&self) -> Result<Vec<Resource>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM resources ORDER BY category IS NULL, category, title",
                RESOURCE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], map_resource)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_resource(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM resources WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use portal_types::models::Role;

    use super::*;
    use crate::queries::users::tests::seed_user;

    #[test]
    fn documents_list_per_student() {
        let db = Database::open_in_memory().unwrap();
        let ann = seed_user(&db, "ann@example.com", Role::Student);
        let ben = seed_user(&db, "ben@example.com", Role::Student);

        let doc = db
            .insert_document(&NewDocument {
                id: Uuid::new_v4(),
                student_id: ann.id,
                uploader_id: ann.id,
                file_name: "statement-v2.pdf",
                content_type: "application/pdf",
                size: 48_213,
                sha256: "ab12",
            })
            .unwrap();

        assert_eq!(doc.size, 48_213);
        assert_eq!(db.documents_for(ann.id).unwrap().len(), 1);
        assert!(db.documents_for(ben.id).unwrap().is_empty());
        assert_eq!(db.get_document(doc.id).unwrap().unwrap().file_name, "statement-v2.pdf");

        assert!(db.delete_document(doc.id).unwrap());
        assert!(db.get_document(doc.id).unwrap().is_none());
    }

    #[test]
    fn resources_group_by_category() {
        let db = Database::open_in_memory().unwrap();
        let admin = seed_user(&db, "owner@example.com", Role::Admin);

        for (title, category) in [("Zeta notes", None), ("Interview bank", Some("interviews")), ("UCAT drills", Some("ucat"))] {
            db.insert_resource(&NewResource {
                title,
                description: None,
                category,
                url: "https://example.com/r",
                created_by: admin.id,
            })
            .unwrap();
        }

        let titles: Vec<String> = db.list_resources().unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["Interview bank", "UCAT drills", "Zeta notes"]);
    }
}
