use thiserror::Error;

use crate::model::{CourseTreeError, OtpError, ParseIdError, RouteError};
use crate::navigator::NavigationError;
use crate::player::PlayerError;

/// Umbrella error for callers that do not care which domain check failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] ParseIdError),
    #[error(transparent)]
    CourseTree(#[from] CourseTreeError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error(transparent)]
    Otp(#[from] OtpError),
}
