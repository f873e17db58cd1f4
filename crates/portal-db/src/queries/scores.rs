use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use portal_types::api::{PortfolioActivityInput, UcatMockInput};
use portal_types::models::{PortfolioActivity, UcatMock};

use super::{OptionalExt, enum_at, format_date, format_ts, opt_date_at, ts_at, uuid_at};
use crate::Database;

const MOCK_COLUMNS: &str = "id, student_id, mock_name, test_date, verbal_reasoning, decision_making, \
     quantitative_reasoning, total, sjt_band, notes, created_at";

const ACTIVITY_COLUMNS: &str =
    "id, student_id, category, title, organisation, start_date, end_date, hours, reflection, created_at";

fn map_mock(row: &Row) -> rusqlite::Result<UcatMock> {
    Ok(UcatMock {
        id: uuid_at(row, 0)?,
        student_id: uuid_at(row, 1)?,
        mock_name: row.get(2)?,
        test_date: opt_date_at(row, 3)?,
        verbal_reasoning: row.get(4)?,
        decision_making: row.get(5)?,
        quantitative_reasoning: row.get(6)?,
        total: row.get(7)?,
        sjt_band: row.get(8)?,
        notes: row.get(9)?,
        created_at: ts_at(row, 10)?,
    })
}

fn map_activity(row: &Row) -> rusqlite::Result<PortfolioActivity> {
    Ok(PortfolioActivity {
        id: uuid_at(row, 0)?,
        student_id: uuid_at(row, 1)?,
        category: enum_at(row, 2)?,
        title: row.get(3)?,
        organisation: row.get(4)?,
        start_date: opt_date_at(row, 5)?,
        end_date: opt_date_at(row, 6)?,
        hours: row.get(7)?,
        reflection: row.get(8)?,
        created_at: ts_at(row, 9)?,
    })
}

impl Database {
    // -- UCAT mocks --

    /// `total` must already be validated against the subtest bounds.
    pub fn insert_mock(&self, student_id: Uuid, mock: &UcatMockInput, total: u16) -> Result<UcatMock> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO ucat_mocks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)", MOCK_COLUMNS),
                params![
                    id.to_string(),
                    student_id.to_string(),
                    mock.mock_name.trim(),
                    format_date(mock.test_date),
                    mock.verbal_reasoning,
                    mock.decision_making,
                    mock.quantitative_reasoning,
                    total,
                    mock.sjt_band,
                    mock.notes,
                    format_ts(Utc::now()),
                ],
            )?;
            query_mock(conn, id)?.ok_or_else(|| anyhow::anyhow!("mock {} vanished after insert", id))
        })
    }

    /// Updates a mock owned by `student_id`. `None` when no such mock exists.
    pub fn update_mock(
        &self,
        id: Uuid,
        student_id: Uuid,
        mock: &UcatMockInput,
        total: u16,
    ) -> Result<Option<UcatMock>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE ucat_mocks SET
                    mock_name = ?3, test_date = ?4, verbal_reasoning = ?5, decision_making = ?6,
                    quantitative_reasoning = ?7, total = ?8, sjt_band = ?9, notes = ?10
                 WHERE id = ?1 AND student_id = ?2",
                params![
                    id.to_string(),
                    student_id.to_string(),
                    mock.mock_name.trim(),
                    format_date(mock.test_date),
                    mock.verbal_reasoning,
                    mock.decision_making,
                    mock.quantitative_reasoning,
                    total,
                    mock.sjt_band,
                    mock.notes,
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_mock(conn, id)
        })
    }

    pub fn delete_mock(&self, id: Uuid, student_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM ucat_mocks WHERE id = ?1 AND student_id = ?2",
                params![id.to_string(), student_id.to_string()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn mocks_for(&self, student_id: Uuid) -> Result<Vec<UcatMock>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM ucat_mocks WHERE student_id = ?1 ORDER BY created_at",
                MOCK_COLUMNS
            ))?;
            let rows = stmt
                .query_map([student_id.to_string()], map_mock)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Portfolio --

    pub fn insert_activity(&self, student_id: Uuid, activity: &PortfolioActivityInput) -> Result<PortfolioActivity> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO portfolio_activities ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)", ACTIVITY_COLUMNS),
                params![
                    id.to_string(),
                    student_id.to_string(),
                    activity.category.as_str(),
                    activity.title.trim(),
                    activity.organisation,
                    format_date(activity.start_date),
                    format_date(activity.end_date),
                    activity.hours,
                    activity.reflection,
                    format_ts(Utc::now()),
                ],
            )?;
            conn.query_row(
                &format!("SELECT {} FROM portfolio_activities WHERE id = ?1", ACTIVITY_COLUMNS),
                [id.to_string()],
                map_activity,
            )
            .map_err(Into::into)
        })
    }

    pub fn get_activity(&self, id: Uuid) -> Result<Option<PortfolioActivity>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM portfolio_activities WHERE id = ?1", ACTIVITY_COLUMNS),
                [id.to_string()],
                map_activity,
            )
            .optional()
        })
    }

    pub fn activities_for(&self, student_id: Uuid) -> Result<Vec<PortfolioActivity>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM portfolio_activities WHERE student_id = ?1
                 ORDER BY start_date IS NULL, start_date DESC, created_at DESC",
                ACTIVITY_COLUMNS
            ))?;
            let rows = stmt
                .query_map([student_id.to_string()], map_activity)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_activity(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM portfolio_activities WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }
}

fn query_mock(conn: &Connection, id: Uuid) -> Result<Option<UcatMock>> {
    conn.query_row(
        &format!("SELECT {} FROM ucat_mocks WHERE id = ?1", MOCK_COLUMNS),
        [id.to_string()],
        map_mock,
    )
    .optional()
}
