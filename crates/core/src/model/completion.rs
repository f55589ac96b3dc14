use std::collections::BTreeSet;

use crate::model::ids::{CourseId, SubSectionId, UserId};

/// Lectures a user has finished in one course.
///
/// Grows monotonically; there is no way to un-complete a lecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSet {
    user_id: UserId,
    course_id: CourseId,
    lectures: BTreeSet<SubSectionId>,
}

impl CompletionSet {
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            lectures: BTreeSet::new(),
        }
    }

    /// Rehydrate a set from persisted lecture ids.
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        course_id: CourseId,
        lectures: impl IntoIterator<Item = SubSectionId>,
    ) -> Self {
        Self {
            user_id,
            course_id,
            lectures: lectures.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    /// Adds a lecture. Returns `false` when it was already present.
    pub fn insert(&mut self, lecture: SubSectionId) -> bool {
        self.lectures.insert(lecture)
    }

    #[must_use]
    pub fn contains(&self, lecture: &SubSectionId) -> bool {
        self.lectures.contains(lecture)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lectures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lectures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubSectionId> {
        self.lectures.iter()
    }

    /// Share of `total_lectures` already completed, in percent (0–100).
    ///
    /// Returns 0 for an empty course.
    #[must_use]
    pub fn progress_percent(&self, total_lectures: usize) -> f64 {
        if total_lectures == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = self.lectures.len() as f64 / total_lectures as f64 * 100.0;
        pct.min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> CompletionSet {
        CompletionSet::new(UserId::new("u1").unwrap(), CourseId::new("c1").unwrap())
    }

    fn lecture(id: &str) -> SubSectionId {
        SubSectionId::new(id).unwrap()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut set = set();
        assert!(set.insert(lecture("S1a")));
        let after_first = set.clone();
        assert!(!set.insert(lecture("S1a")));
        assert_eq!(set, after_first);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn progress_percent_handles_edges() {
        let mut set = set();
        assert!((set.progress_percent(0) - 0.0).abs() < f64::EPSILON);
        set.insert(lecture("a"));
        assert!((set.progress_percent(4) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn from_persisted_dedupes() {
        let set = CompletionSet::from_persisted(
            UserId::new("u").unwrap(),
            CourseId::new("c").unwrap(),
            vec![lecture("a"), lecture("a"), lecture("b")],
        );
        assert_eq!(set.len(), 2);
        assert!(set.contains(&lecture("b")));
    }
}
