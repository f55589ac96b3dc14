#![forbid(unsafe_code)]

pub mod app_services;
pub mod completion_client;
pub mod completion_tracker;
pub mod error;
pub mod otp_service;
pub mod progress_service;
pub mod viewer;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use completion_client::{
    CompletionClientConfig, CompletionRequest, CompletionSink, HttpCompletionClient,
    ProgressServiceSink,
};
pub use completion_tracker::{CompletionTracker, MarkOutcome};
pub use error::{
    AppServicesError, CompletionError, MailError, OtpServiceError, ProgressServiceError,
    ViewerError,
};
pub use otp_service::{LogMailer, Mailer, OtpService};
pub use progress_service::ProgressService;
pub use viewer::{CourseViewer, EndOverlay};
