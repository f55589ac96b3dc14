use std::fmt;

use thiserror::Error;

use crate::model::ids::{CourseId, ParseIdError, SectionId, SubSectionId};

/// Where the viewer currently is inside a course tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub section_id: SectionId,
    pub sub_section_id: SubSectionId,
}

impl Position {
    #[must_use]
    pub fn new(section_id: SectionId, sub_section_id: SubSectionId) -> Self {
        Self {
            section_id,
            sub_section_id,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("not a lecture route: {path}")]
    Malformed { path: String },

    #[error(transparent)]
    InvalidId(#[from] ParseIdError),
}

/// Navigation target for the lecture viewer: course, section and lecture ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LectureRoute {
    pub course_id: CourseId,
    pub section_id: SectionId,
    pub sub_section_id: SubSectionId,
}

impl LectureRoute {
    /// Mount point of the viewer inside the student dashboard.
    pub const DASHBOARD_PREFIX: &'static str = "/dashboard/enrolled-courses";

    #[must_use]
    pub fn new(course_id: CourseId, position: Position) -> Self {
        Self {
            course_id,
            section_id: position.section_id,
            sub_section_id: position.sub_section_id,
        }
    }

    #[must_use]
    pub fn position(&self) -> Position {
        Position::new(self.section_id.clone(), self.sub_section_id.clone())
    }

    /// Path relative to the dashboard mount point.
    #[must_use]
    pub fn path(&self) -> String {
        format!(
            "/view-course/{}/section/{}/sub-section/{}",
            self.course_id, self.section_id, self.sub_section_id
        )
    }

    /// Full dashboard path.
    #[must_use]
    pub fn dashboard_path(&self) -> String {
        format!("{}{}", Self::DASHBOARD_PREFIX, self.path())
    }

    /// Parse a viewer path, with or without the dashboard prefix.
    ///
    /// # Errors
    ///
    /// Returns `RouteError::Malformed` if the segments do not match the
    /// viewer layout, or `RouteError::InvalidId` for blank ids.
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let malformed = || RouteError::Malformed {
            path: path.to_owned(),
        };

        let trimmed = path.trim().trim_end_matches('/');
        let rest = trimmed
            .strip_prefix(Self::DASHBOARD_PREFIX)
            .unwrap_or(trimmed);
        let segments: Vec<&str> = rest.split('/').skip_while(|s| s.is_empty()).collect();

        match segments.as_slice() {
            ["view-course", course, "section", section, "sub-section", lecture] => Ok(Self {
                course_id: course.parse()?,
                section_id: section.parse()?,
                sub_section_id: lecture.parse()?,
            }),
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for LectureRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dashboard_path())
    }
}
