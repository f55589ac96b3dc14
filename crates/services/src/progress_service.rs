use std::sync::Arc;

use course_core::model::{CompletionSet, CourseId, CourseTree, SubSectionId, UserId};
use storage::repository::{
    CompletionRecord, CourseRepository, ProgressRepository, StorageError,
};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Enrollment and lecture-completion bookkeeping on the backend side.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            progress,
        }
    }

    async fn course(&self, course_id: &CourseId) -> Result<CourseTree, ProgressServiceError> {
        self.courses
            .get_course(course_id)
            .await?
            .ok_or_else(|| ProgressServiceError::CourseNotFound(course_id.clone()))
    }

    /// Enroll a student. Returns `false` if they already were.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::CourseNotFound` for an unknown course.
    pub async fn enroll(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<bool, ProgressServiceError> {
        match self.progress.enroll(user_id, course_id, self.clock.now()).await {
            Ok(created) => Ok(created),
            Err(StorageError::NotFound) => {
                Err(ProgressServiceError::CourseNotFound(course_id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Record that a student finished a lecture.
    ///
    /// Returns `false` when the lecture was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound`, `LectureNotFound` or `NotEnrolled` when the
    /// request does not match stored data, `Storage` on repository failures.
    pub async fn record_completion(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        sub_section_id: &SubSectionId,
    ) -> Result<bool, ProgressServiceError> {
        let tree = self.course(course_id).await?;
        if !tree.contains_lecture(sub_section_id) {
            return Err(ProgressServiceError::LectureNotFound {
                course_id: course_id.clone(),
                sub_section_id: sub_section_id.clone(),
            });
        }

        let record = CompletionRecord {
            user_id: user_id.clone(),
            course_id: course_id.clone(),
            sub_section_id: sub_section_id.clone(),
            completed_at: self.clock.now(),
        };
        let created = match self.progress.record_completion(&record).await {
            Ok(created) => created,
            Err(StorageError::Conflict) => {
                return Err(ProgressServiceError::NotEnrolled(course_id.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        if created {
            tracing::info!(%user_id, %course_id, %sub_section_id, "lecture completed");
        } else {
            tracing::debug!(%user_id, %course_id, %sub_section_id, "lecture already completed");
        }
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn completed(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CompletionSet, ProgressServiceError> {
        Ok(self.progress.completed_lectures(user_id, course_id).await?)
    }

    /// Completed share of the course, in percent.
    ///
    /// Only lectures still present in the course count.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound` for an unknown course, `Storage` on repository failures.
    pub async fn progress_percent(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<f64, ProgressServiceError> {
        let tree = self.course(course_id).await?;
        let done = self.completed(user_id, course_id).await?;
        let current = CompletionSet::from_persisted(
            user_id.clone(),
            course_id.clone(),
            done.iter().filter(|id| tree.contains_lecture(id)).cloned(),
        );
        Ok(current.progress_percent(tree.lecture_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{CourseTreeDraft, LectureDraft, SectionDraft};
    use course_core::time::fixed_now;
    use storage::repository::Storage;

    async fn setup() -> (ProgressService, CourseId) {
        let storage = Storage::in_memory();
        let course_id = CourseId::new("rust-101").unwrap();
        let tree = CourseTreeDraft {
            name: Some("Rust 101".into()),
            sections: vec![SectionDraft::new(
                "s1",
                vec![
                    LectureDraft::new("l1", "Ownership", "https://cdn.example.com/1.mp4"),
                    LectureDraft::new("l2", "Borrowing", "https://cdn.example.com/2.mp4"),
                    LectureDraft::new("l3", "Lifetimes", "https://cdn.example.com/3.mp4"),
                    LectureDraft::new("l4", "Traits", "https://cdn.example.com/4.mp4"),
                ],
            )],
        }
        .validate(course_id.clone())
        .unwrap();
        storage.courses.upsert_course(&tree).await.unwrap();
        let service = ProgressService::new(
            Clock::fixed(fixed_now()),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.progress),
        );
        (service, course_id)
    }

    fn lecture(id: &str) -> SubSectionId {
        SubSectionId::new(id).unwrap()
    }

    #[tokio::test]
    async fn records_completion_once() {
        let (service, course) = setup().await;
        let user = UserId::new("u1").unwrap();
        assert!(service.enroll(&user, &course).await.unwrap());

        assert!(service.record_completion(&user, &course, &lecture("l1")).await.unwrap());
        assert!(!service.record_completion(&user, &course, &lecture("l1")).await.unwrap());

        let done = service.completed(&user, &course).await.unwrap();
        assert_eq!(done.len(), 1);
        let pct = service.progress_percent(&user, &course).await.unwrap();
        assert!((pct - 25.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn rejects_unknown_lecture_and_course() {
        let (service, course) = setup().await;
        let user = UserId::new("u1").unwrap();
        service.enroll(&user, &course).await.unwrap();

        let err = service
            .record_completion(&user, &course, &lecture("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::LectureNotFound { .. }));

        let missing = CourseId::new("missing").unwrap();
        let err = service
            .record_completion(&user, &missing, &lecture("l1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::CourseNotFound(_)));

        let err = service.enroll(&user, &missing).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn requires_enrollment() {
        let (service, course) = setup().await;
        let user = UserId::new("stranger").unwrap();
        let err = service
            .record_completion(&user, &course, &lecture("l2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::NotEnrolled(_)));
    }
}
