use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, links, messages, comments)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE,
                password            TEXT NOT NULL,
                role                TEXT NOT NULL,
                approval_status     TEXT NOT NULL DEFAULT 'pending',
                onboarding_status   TEXT NOT NULL DEFAULT 'pending',
                full_name           TEXT NOT NULL,
                phone               TEXT,
                school              TEXT,
                academic_summary    TEXT,
                target_course       TEXT,
                entry_year          INTEGER,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE parent_student_links (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id   TEXT NOT NULL REFERENCES users(id),
                student_id  TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                UNIQUE(parent_id, student_id)
            );

            CREATE TABLE mentor_student_links (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                mentor_id   TEXT NOT NULL REFERENCES users(id),
                student_id  TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                UNIQUE(mentor_id, student_id)
            );

            CREATE INDEX idx_parent_links_student ON parent_student_links(student_id);
            CREATE INDEX idx_mentor_links_student ON mentor_student_links(student_id);

            CREATE TABLE messages (
                seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
                id                  TEXT NOT NULL UNIQUE,
                thread_id           TEXT NOT NULL,
                sender_id           TEXT NOT NULL REFERENCES users(id),
                recipient_id        TEXT REFERENCES users(id),
                student_id          TEXT REFERENCES users(id),
                subject             TEXT,
                body                TEXT NOT NULL,
                parent_message_id   TEXT REFERENCES messages(id),
                is_read             INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_messages_thread ON messages(thread_id, created_at);
            CREATE INDEX idx_messages_recipient ON messages(recipient_id, is_read);
            CREATE INDEX idx_messages_student ON messages(student_id);

            CREATE TABLE mentor_comments (
                id              TEXT PRIMARY KEY,
                author_id       TEXT NOT NULL REFERENCES users(id),
                student_id      TEXT NOT NULL REFERENCES users(id),
                section         TEXT NOT NULL,
                section_item_id TEXT,
                comment_type    TEXT NOT NULL,
                body            TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_comments_scope
                ON mentor_comments(student_id, section, section_item_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (scores, portfolio, documents, resources, grants)");
        conn.execute_batch(
            "
            CREATE TABLE ucat_mocks (
                id                      TEXT PRIMARY KEY,
                student_id              TEXT NOT NULL REFERENCES users(id),
                mock_name               TEXT NOT NULL,
                test_date               TEXT,
                verbal_reasoning        INTEGER NOT NULL,
                decision_making         INTEGER NOT NULL,
                quantitative_reasoning  INTEGER NOT NULL,
                total                   INTEGER NOT NULL,
                sjt_band                INTEGER,
                notes                   TEXT,
                created_at              TEXT NOT NULL
            );

            CREATE INDEX idx_ucat_student ON ucat_mocks(student_id);

            CREATE TABLE portfolio_activities (
                id              TEXT PRIMARY KEY,
                student_id      TEXT NOT NULL REFERENCES users(id),
                category        TEXT NOT NULL,
                title           TEXT NOT NULL,
                organisation    TEXT,
                start_date      TEXT,
                end_date        TEXT,
                hours           REAL,
                reflection      TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_portfolio_student ON portfolio_activities(student_id);

            CREATE TABLE documents (
                id              TEXT PRIMARY KEY,
                student_id      TEXT NOT NULL REFERENCES users(id),
                uploader_id     TEXT NOT NULL REFERENCES users(id),
                file_name       TEXT NOT NULL,
                content_type    TEXT NOT NULL,
                size            INTEGER NOT NULL,
                sha256          TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE resources (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT,
                category        TEXT,
                url             TEXT NOT NULL,
                created_by      TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL
            );

            CREATE TABLE admin_grants (
                email           TEXT PRIMARY KEY,
                granted_by      TEXT NOT NULL REFERENCES users(id),
                granted_at      TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
