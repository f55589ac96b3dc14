use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            name TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS course_sections (
            course_id TEXT NOT NULL,
            id TEXT NOT NULL,
            ordinal INTEGER NOT NULL CHECK (ordinal >= 0),
            title TEXT,
            PRIMARY KEY (course_id, id),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lectures (
            course_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            id TEXT NOT NULL,
            ordinal INTEGER NOT NULL CHECK (ordinal >= 0),
            title TEXT NOT NULL,
            description TEXT,
            media_url TEXT NOT NULL,
            duration_secs REAL NOT NULL CHECK (duration_secs >= 0),
            PRIMARY KEY (course_id, id),
            FOREIGN KEY (course_id, section_id)
                REFERENCES course_sections(course_id, id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            enrolled_at TEXT NOT NULL,
            PRIMARY KEY (user_id, course_id),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    // Keyed by enrollment rather than lecture rows, so replacing a course's
    // lectures keeps recorded progress.
    r"
        CREATE TABLE IF NOT EXISTS course_progress (
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            sub_section_id TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            PRIMARY KEY (user_id, course_id, sub_section_id),
            FOREIGN KEY (user_id, course_id)
                REFERENCES enrollments(user_id, course_id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS otps (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL,
            code TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_sections_course_ordinal
            ON course_sections (course_id, ordinal);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lectures_section_ordinal
            ON lectures (course_id, section_id, ordinal);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_otps_email_created
            ON otps (email, created_at);
    ",
];

/// Runs the versioned migrations for the current schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: courses, enrollments, progress, otps.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
