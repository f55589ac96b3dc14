use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use course_core::model::{CourseId, SubSectionId, UserId};
use reqwest::Client;
use serde::Serialize;

use crate::error::CompletionError;
use crate::progress_service::ProgressService;

/// Payload of the "lecture completed" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub sub_section_id: SubSectionId,
}

/// Destination for completion facts recorded by the viewer.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    /// # Errors
    ///
    /// Returns `CompletionError` if the completion could not be persisted.
    async fn persist(&self, request: &CompletionRequest) -> Result<(), CompletionError>;
}

#[derive(Clone, Debug)]
pub struct CompletionClientConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl CompletionClientConfig {
    /// Reads `COURSE_API_BASE_URL` and `COURSE_API_TOKEN`.
    ///
    /// `None` when no base URL is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("COURSE_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let token = env::var("COURSE_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self { base_url, token })
    }
}

/// Posts completions to the marketplace backend.
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: Client,
    config: Option<CompletionClientConfig>,
}

impl HttpCompletionClient {
    pub const PROGRESS_PATH: &'static str = "/course/updateCourseProgress";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(CompletionClientConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<CompletionClientConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn endpoint(config: &CompletionClientConfig) -> String {
        format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            Self::PROGRESS_PATH
        )
    }
}

#[async_trait]
impl CompletionSink for HttpCompletionClient {
    async fn persist(&self, request: &CompletionRequest) -> Result<(), CompletionError> {
        let config = self.config.as_ref().ok_or(CompletionError::Disabled)?;

        let mut builder = self
            .client
            .post(Self::endpoint(config))
            .timeout(Self::REQUEST_TIMEOUT)
            .json(request);
        if let Some(token) = &config.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(CompletionError::HttpStatus(response.status()));
        }
        tracing::debug!(
            course_id = %request.course_id,
            sub_section_id = %request.sub_section_id,
            "progress persisted remotely"
        );
        Ok(())
    }
}

/// Records completions in-process through [`ProgressService`].
#[derive(Clone)]
pub struct ProgressServiceSink {
    progress: Arc<ProgressService>,
}

impl ProgressServiceSink {
    #[must_use]
    pub fn new(progress: Arc<ProgressService>) -> Self {
        Self { progress }
    }
}

#[async_trait]
impl CompletionSink for ProgressServiceSink {
    async fn persist(&self, request: &CompletionRequest) -> Result<(), CompletionError> {
        self.progress
            .record_completion(&request.user_id, &request.course_id, &request.sub_section_id)
            .await?;
        Ok(())
    }
}
