//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{CourseId, Email, OtpError, SubSectionId};
use course_core::{NavigationError, PlayerError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while persisting a completion remotely.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("remote progress endpoint is not configured")]
    Disabled,
    #[error("progress request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("lecture {sub_section_id} is not part of course {course_id}")]
    LectureNotFound {
        course_id: CourseId,
        sub_section_id: SubSectionId,
    },
    #[error("student is not enrolled in course {0}")]
    NotEnrolled(CourseId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors a `Mailer` reports when a verification mail is not delivered.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("recipient {0} was rejected")]
    Rejected(Email),
}

/// Errors emitted by `OtpService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OtpServiceError {
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error("no verification code was issued for this email")]
    NotFound,
    #[error("verification code has expired")]
    Expired,
    #[error("verification code does not match")]
    Mismatch,
    #[error("failed to send verification email: {0}")]
    Mail(#[from] MailError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CourseViewer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ViewerError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Player(#[from] PlayerError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
}
