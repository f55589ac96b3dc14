#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod navigator;
pub mod player;
pub mod time;

pub use error::Error;
pub use navigator::{LectureNavigator, NavigationError};
pub use player::{Milestone, PlaybackState, PlayerController, PlayerError};
pub use time::Clock;
