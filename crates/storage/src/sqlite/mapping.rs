use course_core::model::{
    CourseId, CourseTreeDraft, Email, LectureDraft, OtpCode, OtpRecord, SectionDraft, SubSectionId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn ordinal_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn course_id_from_row(row: &SqliteRow, column: &str) -> Result<CourseId, StorageError> {
    CourseId::new(row.try_get::<String, _>(column).map_err(ser)?).map_err(ser)
}

pub(crate) fn sub_section_id_from_row(
    row: &SqliteRow,
    column: &str,
) -> Result<SubSectionId, StorageError> {
    SubSectionId::new(row.try_get::<String, _>(column).map_err(ser)?).map_err(ser)
}

pub(crate) fn section_draft_from_row(row: &SqliteRow) -> Result<SectionDraft, StorageError> {
    Ok(SectionDraft {
        id: row.try_get("id").map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        sub_sections: Vec::new(),
    })
}

pub(crate) fn lecture_draft_from_row(row: &SqliteRow) -> Result<LectureDraft, StorageError> {
    Ok(LectureDraft {
        id: row.try_get("id").map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        media_url: row.try_get("media_url").map_err(ser)?,
        duration: row.try_get("duration_secs").map_err(ser)?,
    })
}

/// Attach lecture rows (ordered by section, then ordinal) to their sections.
pub(crate) fn assemble_tree(
    name: Option<String>,
    mut sections: Vec<SectionDraft>,
    lectures: Vec<(String, LectureDraft)>,
) -> Result<CourseTreeDraft, StorageError> {
    for (section_id, lecture) in lectures {
        let section = sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or_else(|| {
                StorageError::Serialization(format!("lecture {} has no section", lecture.id))
            })?;
        section.sub_sections.push(lecture);
    }
    Ok(CourseTreeDraft { name, sections })
}

pub(crate) fn map_otp_row(row: &SqliteRow) -> Result<OtpRecord, StorageError> {
    let email = Email::parse(row.try_get::<String, _>("email").map_err(ser)?).map_err(ser)?;
    let code = OtpCode::parse(&row.try_get::<String, _>("code").map_err(ser)?).map_err(ser)?;
    Ok(OtpRecord::new(
        email,
        code,
        row.try_get("created_at").map_err(ser)?,
    ))
}
