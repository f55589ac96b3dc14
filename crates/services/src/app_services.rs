use std::sync::Arc;

use course_core::model::{CourseId, UserId};
use storage::repository::{CourseListItem, CourseRepository, Storage};

use crate::Clock;
use crate::completion_client::{
    CompletionClientConfig, CompletionSink, HttpCompletionClient, ProgressServiceSink,
};
use crate::completion_tracker::CompletionTracker;
use crate::error::AppServicesError;
use crate::otp_service::{LogMailer, Mailer, OtpService};
use crate::progress_service::ProgressService;
use crate::viewer::CourseViewer;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    progress: Arc<ProgressService>,
    otp: Arc<OtpService>,
    completion_sink: Arc<dyn CompletionSink>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// Completions go to the remote endpoint when `remote` is set, otherwise
    /// they are recorded locally.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        remote: Option<CompletionClientConfig>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, remote, Arc::new(LogMailer)))
    }

    #[must_use]
    pub fn from_storage(
        storage: Storage,
        clock: Clock,
        remote: Option<CompletionClientConfig>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.progress),
        ));
        let otp = Arc::new(OtpService::new(clock, Arc::clone(&storage.otps), mailer));
        let completion_sink: Arc<dyn CompletionSink> = match remote {
            Some(config) => {
                tracing::info!(base_url = %config.base_url, "recording completions remotely");
                Arc::new(HttpCompletionClient::new(Some(config)))
            }
            None => Arc::new(ProgressServiceSink::new(Arc::clone(&progress))),
        };

        Self {
            storage,
            progress,
            otp,
            completion_sink,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn otp(&self) -> Arc<OtpService> {
        Arc::clone(&self.otp)
    }

    #[must_use]
    pub fn completion_sink(&self) -> Arc<dyn CompletionSink> {
        Arc::clone(&self.completion_sink)
    }

    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if repository access fails.
    pub async fn list_courses(&self, limit: u32) -> Result<Vec<CourseListItem>, AppServicesError> {
        Ok(self.storage.courses.list_courses(limit).await?)
    }

    /// Open the viewer for a student, with content and prior completions loaded.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound` for an unknown course, `Progress` or `Storage`
    /// if loading fails.
    pub async fn open_viewer(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CourseViewer, AppServicesError> {
        let tree = self
            .storage
            .courses
            .get_course(course_id)
            .await?
            .ok_or_else(|| AppServicesError::CourseNotFound(course_id.clone()))?;
        let completed = self.progress.completed(user_id, course_id).await?;

        let tracker = CompletionTracker::with_completed(completed, self.completion_sink());
        let mut viewer = CourseViewer::new(tracker);
        viewer.load_tree(tree);
        Ok(viewer)
    }
}
