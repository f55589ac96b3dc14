use course_core::model::{CourseId, CourseTree};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    assemble_tree, conn, course_id_from_row, lecture_draft_from_row, ordinal_to_i64, ser,
    section_draft_from_row,
};
use crate::repository::{CourseListItem, CourseRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, tree: &CourseTree) -> Result<(), StorageError> {
        let course_id = tree.course_id().as_str();
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO courses (id, name)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(course_id)
        .bind(tree.name())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // lectures go with their sections (ON DELETE CASCADE)
        sqlx::query("DELETE FROM course_sections WHERE course_id = ?1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (section_ordinal, section) in tree.sections().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO course_sections (course_id, id, ordinal, title)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(course_id)
            .bind(section.id().as_str())
            .bind(ordinal_to_i64("section ordinal", section_ordinal)?)
            .bind(section.title())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (lecture_ordinal, lecture) in section.lectures().iter().enumerate() {
                sqlx::query(
                    r"
                    INSERT INTO lectures (
                        course_id, section_id, id, ordinal,
                        title, description, media_url, duration_secs
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ",
                )
                .bind(course_id)
                .bind(section.id().as_str())
                .bind(lecture.id().as_str())
                .bind(ordinal_to_i64("lecture ordinal", lecture_ordinal)?)
                .bind(lecture.title())
                .bind(lecture.description())
                .bind(lecture.media_url().as_str())
                .bind(lecture.duration().as_secs_f64())
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_course(&self, id: &CourseId) -> Result<Option<CourseTree>, StorageError> {
        let Some(course_row) = sqlx::query("SELECT id, name FROM courses WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
        else {
            return Ok(None);
        };
        let name: Option<String> = course_row.try_get("name").map_err(ser)?;

        let section_rows = sqlx::query(
            r"
            SELECT id, title
            FROM course_sections
            WHERE course_id = ?1
            ORDER BY ordinal ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let lecture_rows = sqlx::query(
            r"
            SELECT l.section_id, l.id, l.title, l.description, l.media_url, l.duration_secs
            FROM lectures l
            JOIN course_sections s ON s.course_id = l.course_id AND s.id = l.section_id
            WHERE l.course_id = ?1
            ORDER BY s.ordinal ASC, l.ordinal ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut sections = Vec::with_capacity(section_rows.len());
        for row in &section_rows {
            sections.push(section_draft_from_row(row)?);
        }
        let mut lectures = Vec::with_capacity(lecture_rows.len());
        for row in &lecture_rows {
            let section_id: String = row.try_get("section_id").map_err(ser)?;
            lectures.push((section_id, lecture_draft_from_row(row)?));
        }

        let draft = assemble_tree(name, sections, lectures)?;
        draft.validate(id.clone()).map(Some).map_err(ser)
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<CourseListItem>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT c.id, c.name, COUNT(l.id) AS lecture_count
            FROM courses c
            LEFT JOIN lectures l ON l.course_id = c.id
            GROUP BY c.id, c.name
            ORDER BY c.id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("lecture_count").map_err(ser)?;
            out.push(CourseListItem {
                id: course_id_from_row(&row, "id")?,
                name: row.try_get("name").map_err(ser)?,
                lecture_count: u32::try_from(count)
                    .map_err(|_| StorageError::Serialization(format!("invalid lecture_count: {count}")))?,
            });
        }
        Ok(out)
    }
}
