//! Per-student completion state on the viewer side.
//!
//! Marking a lecture updates the local [`CompletionSet`] before the remote
//! call is made, and the local update stays even if that call fails. A
//! lecture sits in the pending list until its call succeeds, so a failed or
//! abandoned call can be retried later.

use std::sync::Arc;

use course_core::model::{CompletionSet, CourseId, SubSectionId, UserId};

use crate::completion_client::{CompletionRequest, CompletionSink};

/// Result of [`CompletionTracker::mark_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkOutcome {
    /// `false` when the lecture was already complete; nothing was sent.
    pub newly_completed: bool,
    /// Whether the remote call succeeded. `false` for a no-op mark.
    pub persisted: bool,
}

pub struct CompletionTracker {
    completed: CompletionSet,
    sink: Arc<dyn CompletionSink>,
    pending: Vec<SubSectionId>,
}

impl CompletionTracker {
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId, sink: Arc<dyn CompletionSink>) -> Self {
        Self::with_completed(CompletionSet::new(user_id, course_id), sink)
    }

    /// Start from a set loaded from the backend.
    #[must_use]
    pub fn with_completed(completed: CompletionSet, sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            completed,
            sink,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn completed(&self) -> &CompletionSet {
        &self.completed
    }

    #[must_use]
    pub fn is_complete(&self, lecture: &SubSectionId) -> bool {
        self.completed.contains(lecture)
    }

    /// Lectures marked locally whose remote call has not succeeded yet.
    #[must_use]
    pub fn pending(&self) -> &[SubSectionId] {
        &self.pending
    }

    fn request_for(&self, lecture: &SubSectionId) -> CompletionRequest {
        CompletionRequest {
            user_id: self.completed.user_id().clone(),
            course_id: self.completed.course_id().clone(),
            sub_section_id: lecture.clone(),
        }
    }

    /// Mark a lecture complete.
    ///
    /// Repeating the call for a completed lecture changes nothing and sends nothing.
    pub async fn mark_complete(&mut self, lecture: &SubSectionId) -> MarkOutcome {
        if !self.completed.insert(lecture.clone()) {
            return MarkOutcome {
                newly_completed: false,
                persisted: false,
            };
        }

        // queued before the call so a dropped future still leaves it retryable
        self.pending.push(lecture.clone());
        let request = self.request_for(lecture);
        let persisted = match self.sink.persist(&request).await {
            Ok(()) => {
                self.settle(lecture);
                true
            }
            Err(err) => {
                tracing::warn!(
                    course_id = %request.course_id,
                    sub_section_id = %lecture,
                    error = %err,
                    "failed to persist completion; keeping local state"
                );
                false
            }
        };

        MarkOutcome {
            newly_completed: true,
            persisted,
        }
    }

    fn settle(&mut self, lecture: &SubSectionId) {
        self.pending.retain(|queued| queued != lecture);
    }

    /// Re-send every pending completion. Returns how many went through.
    ///
    /// A lecture leaves the pending list only once its call succeeds.
    pub async fn retry_pending(&mut self) -> usize {
        let queued = self.pending.clone();
        let mut sent = 0;
        for lecture in queued {
            let request = self.request_for(&lecture);
            match self.sink.persist(&request).await {
                Ok(()) => {
                    self.settle(&lecture);
                    sent += 1;
                }
                Err(err) => {
                    tracing::warn!(sub_section_id = %lecture, error = %err, "retry failed");
                }
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<CompletionRequest>>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl CompletionSink for RecordingSink {
        async fn persist(&self, request: &CompletionRequest) -> Result<(), CompletionError> {
            self.calls.lock().unwrap().push(request.clone());
            if self.failing.load(Ordering::SeqCst) {
                Err(CompletionError::Disabled)
            } else {
                Ok(())
            }
        }
    }

    fn tracker(sink: &Arc<RecordingSink>) -> CompletionTracker {
        let sink: Arc<dyn CompletionSink> = sink.clone();
        CompletionTracker::new(
            UserId::new("u1").unwrap(),
            CourseId::new("c1").unwrap(),
            sink,
        )
    }

    fn lecture(id: &str) -> SubSectionId {
        SubSectionId::new(id).unwrap()
    }

    #[tokio::test]
    async fn marks_once_and_sends_once() {
        let sink = Arc::new(RecordingSink::default());
        let mut tracker = tracker(&sink);

        let first = tracker.mark_complete(&lecture("S1a")).await;
        assert_eq!(
            first,
            MarkOutcome {
                newly_completed: true,
                persisted: true
            }
        );
        let second = tracker.mark_complete(&lecture("S1a")).await;
        assert!(!second.newly_completed);

        assert!(tracker.is_complete(&lecture("S1a")));
        assert_eq!(tracker.completed().len(), 1);
        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].sub_section_id, lecture("S1a"));
    }

    #[tokio::test]
    async fn failed_call_keeps_local_state_and_queues_retry() {
        let sink = Arc::new(RecordingSink::default());
        sink.failing.store(true, Ordering::SeqCst);
        let mut tracker = tracker(&sink);

        let outcome = tracker.mark_complete(&lecture("S1a")).await;
        assert!(outcome.newly_completed);
        assert!(!outcome.persisted);
        assert!(tracker.is_complete(&lecture("S1a")));
        assert_eq!(tracker.pending(), &[lecture("S1a")]);

        assert_eq!(tracker.retry_pending().await, 0);
        assert_eq!(tracker.pending().len(), 1);

        sink.failing.store(false, Ordering::SeqCst);
        assert_eq!(tracker.retry_pending().await, 1);
        assert!(tracker.pending().is_empty());
        assert_eq!(sink.calls.lock().unwrap().len(), 3);
    }

    struct HangingSink;

    #[async_trait]
    impl CompletionSink for HangingSink {
        async fn persist(&self, _request: &CompletionRequest) -> Result<(), CompletionError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn abandoned_call_leaves_lecture_pending() {
        let mut tracker = CompletionTracker::new(
            UserId::new("u1").unwrap(),
            CourseId::new("c1").unwrap(),
            Arc::new(HangingSink),
        );

        let marked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            tracker.mark_complete(&lecture("S1a")),
        )
        .await;
        assert!(marked.is_err());
        assert!(tracker.is_complete(&lecture("S1a")));
        assert_eq!(tracker.pending(), &[lecture("S1a")]);

        let repeat = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            tracker.mark_complete(&lecture("S1a")),
        )
        .await
        .unwrap();
        assert!(!repeat.newly_completed);
        assert_eq!(tracker.pending(), &[lecture("S1a")]);
    }

    #[tokio::test]
    async fn retry_sends_every_pending_lecture() {
        let sink = Arc::new(RecordingSink::default());
        sink.failing.store(true, Ordering::SeqCst);
        let mut tracker = tracker(&sink);
        tracker.mark_complete(&lecture("S1a")).await;
        tracker.mark_complete(&lecture("S2b")).await;
        assert_eq!(tracker.pending().len(), 2);

        sink.failing.store(false, Ordering::SeqCst);
        assert_eq!(tracker.retry_pending().await, 2);
        assert!(tracker.pending().is_empty());
    }
}
