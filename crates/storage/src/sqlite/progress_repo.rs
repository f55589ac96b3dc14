use chrono::{DateTime, Utc};
use course_core::model::{CompletionSet, CourseId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, sub_section_id_from_row};
use crate::repository::{CompletionRecord, ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn enroll(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let exists = sqlx::query("SELECT 1 FROM courses WHERE id = ?1")
            .bind(course_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(
            r"
            INSERT INTO enrollments (user_id, course_id, enrolled_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, course_id) DO NOTHING
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .bind(enrolled_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }

    async fn is_enrolled(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM enrollments WHERE user_id = ?1 AND course_id = ?2")
            .bind(user_id.as_str())
            .bind(course_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn record_completion(&self, record: &CompletionRecord) -> Result<bool, StorageError> {
        if !self.is_enrolled(&record.user_id, &record.course_id).await? {
            return Err(StorageError::Conflict);
        }

        let res = sqlx::query(
            r"
            INSERT INTO course_progress (user_id, course_id, sub_section_id, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, course_id, sub_section_id) DO NOTHING
            ",
        )
        .bind(record.user_id.as_str())
        .bind(record.course_id.as_str())
        .bind(record.sub_section_id.as_str())
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }

    async fn completed_lectures(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CompletionSet, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT sub_section_id
            FROM course_progress
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY completed_at ASC
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lectures = Vec::with_capacity(rows.len());
        for row in &rows {
            lectures.push(sub_section_id_from_row(row, "sub_section_id")?);
        }
        Ok(CompletionSet::from_persisted(
            user_id.clone(),
            course_id.clone(),
            lectures,
        ))
    }
}
