//! Sequential traversal of a course tree.
//!
//! Positions are resolved to `(section index, lecture index)` on every call;
//! the tree is small and immutable for a viewing session.

use thiserror::Error;

use crate::model::{CourseTree, Lecture, LectureRoute, Position, SectionId, SubSectionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NavigationError {
    /// The tree has no sections yet; callers show a loading state.
    #[error("course content is still loading")]
    Loading,

    #[error("section {section_id} not found in course")]
    SectionNotFound { section_id: SectionId },

    #[error("lecture {sub_section_id} not found in section {section_id}")]
    LectureNotFound {
        section_id: SectionId,
        sub_section_id: SubSectionId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    section: usize,
    lecture: usize,
}

/// Computes first/last/next/previous lectures over a borrowed tree.
#[derive(Debug, Clone, Copy)]
pub struct LectureNavigator<'a> {
    tree: &'a CourseTree,
}

impl<'a> LectureNavigator<'a> {
    #[must_use]
    pub fn new(tree: &'a CourseTree) -> Self {
        Self { tree }
    }

    #[must_use]
    pub fn tree(&self) -> &'a CourseTree {
        self.tree
    }

    fn locate(&self, position: &Position) -> Result<Cursor, NavigationError> {
        if self.tree.is_empty() {
            return Err(NavigationError::Loading);
        }
        let sections = self.tree.sections();
        let section = sections
            .iter()
            .position(|s| s.id() == &position.section_id)
            .ok_or_else(|| NavigationError::SectionNotFound {
                section_id: position.section_id.clone(),
            })?;
        let lecture = sections[section]
            .lectures()
            .iter()
            .position(|l| l.id() == &position.sub_section_id)
            .ok_or_else(|| NavigationError::LectureNotFound {
                section_id: position.section_id.clone(),
                sub_section_id: position.sub_section_id.clone(),
            })?;
        Ok(Cursor { section, lecture })
    }

    fn position_at(&self, cursor: Cursor) -> Position {
        let section = &self.tree.sections()[cursor.section];
        Position::new(
            section.id().clone(),
            section.lectures()[cursor.lecture].id().clone(),
        )
    }

    fn last_index_in(&self, section: usize) -> usize {
        self.tree.sections()[section].lectures().len().saturating_sub(1)
    }

    /// The opening lecture, or `None` while the tree is empty.
    #[must_use]
    pub fn first(&self) -> Option<Position> {
        if self.tree.is_empty() {
            return None;
        }
        Some(self.position_at(Cursor {
            section: 0,
            lecture: 0,
        }))
    }

    /// The closing lecture, or `None` while the tree is empty.
    #[must_use]
    pub fn last(&self) -> Option<Position> {
        let section = self.tree.sections().len().checked_sub(1)?;
        Some(self.position_at(Cursor {
            section,
            lecture: self.last_index_in(section),
        }))
    }

    /// # Errors
    ///
    /// Returns `NavigationError` if the tree is loading or the position is unknown.
    pub fn is_first(&self, position: &Position) -> Result<bool, NavigationError> {
        let cursor = self.locate(position)?;
        Ok(cursor.section == 0 && cursor.lecture == 0)
    }

    /// # Errors
    ///
    /// Returns `NavigationError` if the tree is loading or the position is unknown.
    pub fn is_last(&self, position: &Position) -> Result<bool, NavigationError> {
        let cursor = self.locate(position)?;
        let last_section = self.tree.sections().len() - 1;
        Ok(cursor.section == last_section && cursor.lecture == self.last_index_in(last_section))
    }

    /// The lecture after `position`; `Ok(None)` on the last lecture.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError` if the tree is loading or the position is unknown.
    pub fn next(&self, position: &Position) -> Result<Option<Position>, NavigationError> {
        if self.is_last(position)? {
            return Ok(None);
        }
        let cursor = self.locate(position)?;
        let target = if cursor.lecture < self.last_index_in(cursor.section) {
            Cursor {
                section: cursor.section,
                lecture: cursor.lecture + 1,
            }
        } else {
            Cursor {
                section: cursor.section + 1,
                lecture: 0,
            }
        };
        Ok(Some(self.position_at(target)))
    }

    /// The lecture before `position`; `Ok(None)` on the first lecture.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError` if the tree is loading or the position is unknown.
    pub fn previous(&self, position: &Position) -> Result<Option<Position>, NavigationError> {
        if self.is_first(position)? {
            return Ok(None);
        }
        let cursor = self.locate(position)?;
        let target = if cursor.lecture > 0 {
            Cursor {
                section: cursor.section,
                lecture: cursor.lecture - 1,
            }
        } else {
            let section = cursor.section - 1;
            Cursor {
                section,
                lecture: self.last_index_in(section),
            }
        };
        Ok(Some(self.position_at(target)))
    }

    /// # Errors
    ///
    /// Returns `NavigationError` if the tree is loading or the position is unknown.
    pub fn resolve(&self, position: &Position) -> Result<&'a Lecture, NavigationError> {
        let cursor = self.locate(position)?;
        Ok(&self.tree.sections()[cursor.section].lectures()[cursor.lecture])
    }

    /// Route for `position` within this course.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError` if the tree is loading or the position is unknown.
    pub fn route(&self, position: &Position) -> Result<LectureRoute, NavigationError> {
        self.locate(position)?;
        Ok(LectureRoute::new(
            self.tree.course_id().clone(),
            position.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, CourseTreeDraft, LectureDraft, SectionDraft};

    fn lecture(id: &str) -> LectureDraft {
        LectureDraft::new(id, id, format!("https://media.example.com/{id}"))
    }

    fn tree(shape: &[(&str, &[&str])]) -> CourseTree {
        CourseTreeDraft {
            name: None,
            sections: shape
                .iter()
                .map(|(section, lectures)| {
                    SectionDraft::new(*section, lectures.iter().map(|l| lecture(l)).collect())
                })
                .collect(),
        }
        .validate(CourseId::new("course").unwrap())
        .unwrap()
    }

    fn two_by_two() -> CourseTree {
        tree(&[("S1", &["S1a", "S1b"]), ("S2", &["S2a", "S2b"])])
    }

    fn pos(section: &str, lecture: &str) -> Position {
        Position::new(
            SectionId::new(section).unwrap(),
            SubSectionId::new(lecture).unwrap(),
        )
    }

    fn all_positions(tree: &CourseTree) -> Vec<Position> {
        tree.lectures()
            .map(|(s, l)| Position::new(s.id().clone(), l.id().clone()))
            .collect()
    }

    #[test]
    fn steps_forward_through_sections() {
        let tree = two_by_two();
        let nav = LectureNavigator::new(&tree);

        assert_eq!(nav.next(&pos("S1", "S1a")).unwrap(), Some(pos("S1", "S1b")));
        assert_eq!(nav.next(&pos("S1", "S1b")).unwrap(), Some(pos("S2", "S2a")));
        assert_eq!(nav.next(&pos("S2", "S2b")).unwrap(), None);
        assert!(nav.is_last(&pos("S2", "S2b")).unwrap());
    }

    #[test]
    fn steps_back_into_previous_section() {
        let tree = two_by_two();
        let nav = LectureNavigator::new(&tree);

        assert_eq!(nav.previous(&pos("S2", "S2a")).unwrap(), Some(pos("S1", "S1b")));
        assert_eq!(nav.previous(&pos("S1", "S1a")).unwrap(), None);
        assert!(nav.is_first(&pos("S1", "S1a")).unwrap());
    }

    #[test]
    fn boundaries_match_no_op_steps() {
        let tree = tree(&[("A", &["a1"]), ("B", &["b1", "b2", "b3"]), ("C", &["c1"])]);
        let nav = LectureNavigator::new(&tree);

        for p in all_positions(&tree) {
            assert_eq!(nav.is_first(&p).unwrap(), nav.previous(&p).unwrap().is_none());
            assert_eq!(nav.is_last(&p).unwrap(), nav.next(&p).unwrap().is_none());
        }
    }

    #[test]
    fn next_and_previous_are_inverse() {
        let tree = tree(&[("A", &["a1", "a2"]), ("B", &["b1"]), ("C", &["c1", "c2", "c3"])]);
        let nav = LectureNavigator::new(&tree);

        for p in all_positions(&tree) {
            if let Some(prev) = nav.previous(&p).unwrap() {
                assert_eq!(nav.next(&prev).unwrap(), Some(p.clone()));
            }
            if let Some(next) = nav.next(&p).unwrap() {
                assert_eq!(nav.previous(&next).unwrap(), Some(p.clone()));
            }
        }
    }

    #[test]
    fn single_lecture_is_both_first_and_last() {
        let tree = tree(&[("only", &["one"])]);
        let nav = LectureNavigator::new(&tree);
        let p = pos("only", "one");

        assert!(nav.is_first(&p).unwrap());
        assert!(nav.is_last(&p).unwrap());
        assert_eq!(nav.first(), nav.last());
    }

    #[test]
    fn empty_tree_reports_loading() {
        let tree = CourseTree::empty(CourseId::new("c").unwrap());
        let nav = LectureNavigator::new(&tree);

        assert_eq!(nav.first(), None);
        assert_eq!(nav.next(&pos("S1", "S1a")), Err(NavigationError::Loading));
        assert_eq!(nav.is_first(&pos("S1", "S1a")), Err(NavigationError::Loading));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let tree = two_by_two();
        let nav = LectureNavigator::new(&tree);

        assert!(matches!(
            nav.next(&pos("S9", "S1a")),
            Err(NavigationError::SectionNotFound { .. })
        ));
        // lecture exists, but under a different section
        assert!(matches!(
            nav.resolve(&pos("S1", "S2a")),
            Err(NavigationError::LectureNotFound { .. })
        ));
    }

    #[test]
    fn route_carries_course_section_and_lecture() {
        let tree = two_by_two();
        let nav = LectureNavigator::new(&tree);
        let route = nav.route(&pos("S2", "S2b")).unwrap();

        assert_eq!(route.course_id.as_str(), "course");
        assert_eq!(route.section_id.as_str(), "S2");
        assert_eq!(route.sub_section_id.as_str(), "S2b");
    }
}
