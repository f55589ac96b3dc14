use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{CourseId, ParseIdError, SectionId, SubSectionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseTreeError {
    #[error(transparent)]
    InvalidId(#[from] ParseIdError),

    #[error("section {section_id} has no lectures")]
    EmptySection { section_id: SectionId },

    #[error("section {section_id} appears more than once")]
    DuplicateSection { section_id: SectionId },

    #[error("lecture {lecture_id} appears more than once")]
    DuplicateLecture { lecture_id: SubSectionId },

    #[error("lecture {lecture_id} has an empty title")]
    EmptyTitle { lecture_id: SubSectionId },

    #[error("lecture {lecture_id} has an invalid media url: {reason}")]
    InvalidMediaUrl {
        lecture_id: SubSectionId,
        reason: String,
    },

    #[error("lecture {lecture_id} has an invalid duration")]
    InvalidDuration { lecture_id: SubSectionId },
}

//
// ─── WIRE SHAPE ────────────────────────────────────────────────────────────────
//

/// Unvalidated course content as delivered by the course-details fetch.
///
/// Mirrors `{ sections: [ { id, subSections: [ { id, title, description,
/// mediaUrl, duration } ] } ] }`. Call [`CourseTreeDraft::validate`] to obtain
/// a [`CourseTree`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTreeDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub sections: Vec<SectionDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDraft {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub sub_sections: Vec<LectureDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureDraft {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub media_url: String,
    /// Length in seconds.
    #[serde(default)]
    pub duration: f64,
}

impl SectionDraft {
    #[must_use]
    pub fn new(id: impl Into<String>, sub_sections: Vec<LectureDraft>) -> Self {
        Self {
            id: id.into(),
            title: None,
            sub_sections,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl LectureDraft {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, media_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            media_url: media_url.into(),
            duration: 0.0,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_duration_secs(mut self, secs: f64) -> Self {
        self.duration = secs;
        self
    }

    fn validate(self) -> Result<Lecture, CourseTreeError> {
        let id = SubSectionId::new(self.id)?;

        let title = self.title.trim();
        if title.is_empty() {
            return Err(CourseTreeError::EmptyTitle { lecture_id: id });
        }
        let title = title.to_owned();

        let media_url = match Url::parse(self.media_url.trim()) {
            Ok(url) => url,
            Err(e) => {
                return Err(CourseTreeError::InvalidMediaUrl {
                    lecture_id: id,
                    reason: e.to_string(),
                });
            }
        };

        let Ok(duration) = Duration::try_from_secs_f64(self.duration) else {
            return Err(CourseTreeError::InvalidDuration { lecture_id: id });
        };

        let description = self
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Lecture {
            id,
            title,
            description,
            media_url,
            duration,
        })
    }
}

impl CourseTreeDraft {
    /// Validate the draft into an immutable tree for `course_id`.
    ///
    /// Sections without lectures are rejected rather than skipped, so every
    /// position handed out by the navigator points at a real lecture.
    ///
    /// # Errors
    ///
    /// Returns `CourseTreeError` for blank ids, empty sections, duplicate ids,
    /// blank titles, unparsable media urls or negative durations.
    pub fn validate(self, course_id: CourseId) -> Result<CourseTree, CourseTreeError> {
        let mut seen_sections = HashSet::new();
        let mut seen_lectures = HashSet::new();
        let mut sections = Vec::with_capacity(self.sections.len());

        for draft in self.sections {
            let section_id = SectionId::new(draft.id)?;
            if !seen_sections.insert(section_id.clone()) {
                return Err(CourseTreeError::DuplicateSection { section_id });
            }
            if draft.sub_sections.is_empty() {
                return Err(CourseTreeError::EmptySection { section_id });
            }

            let mut lectures = Vec::with_capacity(draft.sub_sections.len());
            for lecture in draft.sub_sections {
                let lecture = lecture.validate()?;
                if !seen_lectures.insert(lecture.id.clone()) {
                    return Err(CourseTreeError::DuplicateLecture {
                        lecture_id: lecture.id,
                    });
                }
                lectures.push(lecture);
            }

            sections.push(Section {
                id: section_id,
                title: draft
                    .title
                    .map(|t| t.trim().to_owned())
                    .filter(|t| !t.is_empty()),
                lectures,
            });
        }

        Ok(CourseTree {
            course_id,
            name: self
                .name
                .map(|n| n.trim().to_owned())
                .filter(|n| !n.is_empty()),
            sections,
        })
    }
}

//
// ─── VALIDATED TREE ────────────────────────────────────────────────────────────
//

/// A single playable lecture (sub-section).
#[derive(Debug, Clone, PartialEq)]
pub struct Lecture {
    id: SubSectionId,
    title: String,
    description: Option<String>,
    media_url: Url,
    duration: Duration,
}

impl Lecture {
    #[must_use]
    pub fn id(&self) -> &SubSectionId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn media_url(&self) -> &Url {
        &self.media_url
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn to_draft(&self) -> LectureDraft {
        LectureDraft {
            id: self.id.to_string(),
            title: self.title.clone(),
            description: self.description.clone(),
            media_url: self.media_url.to_string(),
            duration: self.duration.as_secs_f64(),
        }
    }
}

/// An ordered, non-empty group of lectures.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    id: SectionId,
    title: Option<String>,
    lectures: Vec<Lecture>,
}

impl Section {
    #[must_use]
    pub fn id(&self) -> &SectionId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn lectures(&self) -> &[Lecture] {
        &self.lectures
    }
}

/// Read-only hierarchical view of a course: ordered sections of ordered lectures.
///
/// A tree without sections is valid and stands for content that has not been
/// loaded (or authored) yet.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseTree {
    course_id: CourseId,
    name: Option<String>,
    sections: Vec<Section>,
}

impl CourseTree {
    /// A tree with no content, used while the real tree is being fetched.
    #[must_use]
    pub fn empty(course_id: CourseId) -> Self {
        Self {
            course_id,
            name: None,
            sections: Vec::new(),
        }
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    #[must_use]
    pub fn lecture_count(&self) -> usize {
        self.sections.iter().map(|s| s.lectures.len()).sum()
    }

    /// Sum of all lecture durations.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.lectures().map(|(_, l)| l.duration).sum()
    }

    /// Iterates `(section, lecture)` pairs in viewing order.
    pub fn lectures(&self) -> impl Iterator<Item = (&Section, &Lecture)> {
        self.sections
            .iter()
            .flat_map(|s| s.lectures.iter().map(move |l| (s, l)))
    }

    /// Finds a lecture anywhere in the tree.
    #[must_use]
    pub fn find_lecture(&self, id: &SubSectionId) -> Option<(&Section, &Lecture)> {
        self.lectures().find(|(_, l)| &l.id == id)
    }

    #[must_use]
    pub fn contains_lecture(&self, id: &SubSectionId) -> bool {
        self.find_lecture(id).is_some()
    }

    /// Converts back to the wire shape, e.g. for persistence.
    #[must_use]
    pub fn to_draft(&self) -> CourseTreeDraft {
        CourseTreeDraft {
            name: self.name.clone(),
            sections: self
                .sections
                .iter()
                .map(|s| SectionDraft {
                    id: s.id.to_string(),
                    title: s.title.clone(),
                    sub_sections: s.lectures.iter().map(Lecture::to_draft).collect(),
                })
                .collect(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> CourseId {
        CourseId::new("course-1").unwrap()
    }

    fn lecture(id: &str) -> LectureDraft {
        LectureDraft::new(id, format!("Lecture {id}"), format!("https://cdn.example.com/{id}.mp4"))
    }

    #[test]
    fn parses_wire_shape() {
        let json = r#"{
            "sections": [
                { "id": "s1", "subSections": [
                    { "id": "l1", "title": "Intro", "description": "  hello ",
                      "mediaUrl": "https://cdn.example.com/l1.mp4", "duration": 61.5 }
                ] }
            ]
        }"#;
        let draft: CourseTreeDraft = serde_json::from_str(json).unwrap();
        let tree = draft.validate(course()).unwrap();

        assert_eq!(tree.sections().len(), 1);
        let lecture = &tree.sections()[0].lectures()[0];
        assert_eq!(lecture.title(), "Intro");
        assert_eq!(lecture.description(), Some("hello"));
        assert_eq!(lecture.duration(), Duration::from_secs_f64(61.5));
        assert_eq!(lecture.media_url().host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn rejects_empty_section() {
        let draft = CourseTreeDraft {
            name: None,
            sections: vec![
                SectionDraft::new("s1", vec![lecture("a")]),
                SectionDraft::new("s2", vec![]),
            ],
        };
        let err = draft.validate(course()).unwrap_err();
        assert_eq!(
            err,
            CourseTreeError::EmptySection {
                section_id: SectionId::new("s2").unwrap()
            }
        );
    }

    #[test]
    fn rejects_duplicate_lecture_across_sections() {
        let draft = CourseTreeDraft {
            name: None,
            sections: vec![
                SectionDraft::new("s1", vec![lecture("a")]),
                SectionDraft::new("s2", vec![lecture("a")]),
            ],
        };
        assert!(matches!(
            draft.validate(course()),
            Err(CourseTreeError::DuplicateLecture { .. })
        ));
    }

    #[test]
    fn rejects_bad_media_url_and_duration() {
        let bad_url = CourseTreeDraft {
            name: None,
            sections: vec![SectionDraft::new(
                "s1",
                vec![LectureDraft::new("a", "A", "not a url")],
            )],
        };
        assert!(matches!(
            bad_url.validate(course()),
            Err(CourseTreeError::InvalidMediaUrl { .. })
        ));

        let bad_duration = CourseTreeDraft {
            name: None,
            sections: vec![SectionDraft::new(
                "s1",
                vec![lecture("a").with_duration_secs(-3.0)],
            )],
        };
        assert!(matches!(
            bad_duration.validate(course()),
            Err(CourseTreeError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn empty_tree_is_valid() {
        let tree = CourseTreeDraft::default().validate(course()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.lecture_count(), 0);
    }

    #[test]
    fn lectures_iterate_in_course_order() {
        let tree = CourseTreeDraft {
            name: Some(" Rust 101 ".into()),
            sections: vec![
                SectionDraft::new("s1", vec![lecture("a"), lecture("b")]),
                SectionDraft::new("s2", vec![lecture("c")]),
            ],
        }
        .validate(course())
        .unwrap();

        let order: Vec<&str> = tree.lectures().map(|(_, l)| l.id().as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert_eq!(tree.name(), Some("Rust 101"));
        let (section, _) = tree
            .find_lecture(&SubSectionId::new("c").unwrap())
            .unwrap();
        assert_eq!(section.id().as_str(), "s2");
    }

    #[test]
    fn draft_survives_conversion_back() {
        let draft = CourseTreeDraft {
            name: Some("Course".into()),
            sections: vec![SectionDraft::new(
                "s1",
                vec![lecture("a").with_description("desc").with_duration_secs(30.0)],
            )
            .with_title("Basics")],
        };
        let tree = draft.clone().validate(course()).unwrap();
        assert_eq!(tree.to_draft(), draft);
    }
}
