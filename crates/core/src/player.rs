//! Playback state machine for the lecture player.
//!
//! The controller does not drive media itself. The host player reports events
//! (play, pause, progress ticks, end of stream, errors) and the controller
//! decides which state the lecture view is in.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::model::Position;

/// Fraction of a lecture that counts as watched.
pub const COMPLETION_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Ready,
    Playing,
    Paused,
    Ended,
}

impl PlaybackState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a lecture reached the `Ended` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    /// Progress reached [`COMPLETION_THRESHOLD`].
    Watched,
    /// The media element reported the end of the stream.
    EndOfStream,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlayerError {
    #[error("no lecture loaded")]
    NoLecture,

    #[error("cannot {event} while {from}")]
    InvalidTransition {
        from: PlaybackState,
        event: &'static str,
    },
}

/// Tracks the playback state of the lecture currently on screen.
#[derive(Debug, Clone)]
pub struct PlayerController {
    state: PlaybackState,
    position: Option<Position>,
    played: f64,
    duration: Option<Duration>,
    last_error: Option<String>,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            position: None,
            played: 0.0,
            duration: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Fraction of the lecture played, in `[0, 1]`.
    #[must_use]
    pub fn played(&self) -> f64 {
        self.played
    }

    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state == PlaybackState::Ended
    }

    /// Time watched so far, when the duration is known.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.duration.map(|d| d.mul_f64(self.played))
    }

    /// Show a lecture. Always lands in `Ready`, whatever came before.
    pub fn load(&mut self, position: Position) {
        self.state = PlaybackState::Ready;
        self.position = Some(position);
        self.played = 0.0;
        self.duration = None;
        self.last_error = None;
    }

    /// # Errors
    ///
    /// `NoLecture` when idle; `InvalidTransition` when ended (use [`Self::replay`]).
    pub fn play(&mut self) -> Result<PlaybackState, PlayerError> {
        match self.state {
            PlaybackState::Idle => Err(PlayerError::NoLecture),
            PlaybackState::Ended => Err(PlayerError::InvalidTransition {
                from: self.state,
                event: "play",
            }),
            PlaybackState::Ready | PlaybackState::Paused | PlaybackState::Playing => {
                self.state = PlaybackState::Playing;
                Ok(self.state)
            }
        }
    }

    /// Pausing an already paused lecture is a no-op.
    ///
    /// # Errors
    ///
    /// `NoLecture` when idle; `InvalidTransition` from `Ready` or `Ended`.
    pub fn pause(&mut self) -> Result<PlaybackState, PlayerError> {
        match self.state {
            PlaybackState::Idle => Err(PlayerError::NoLecture),
            PlaybackState::Playing | PlaybackState::Paused => {
                self.state = PlaybackState::Paused;
                Ok(self.state)
            }
            PlaybackState::Ready | PlaybackState::Ended => Err(PlayerError::InvalidTransition {
                from: self.state,
                event: "pause",
            }),
        }
    }

    /// # Errors
    ///
    /// Same as [`Self::play`] / [`Self::pause`].
    pub fn toggle(&mut self) -> Result<PlaybackState, PlayerError> {
        if self.state == PlaybackState::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        if self.state != PlaybackState::Idle {
            self.duration = Some(duration);
        }
    }

    /// Progress tick from the media element, `played` being a fraction.
    ///
    /// Ticks outside `Playing` and non-finite values are ignored.
    pub fn progress(&mut self, played: f64) -> Option<Milestone> {
        if self.state != PlaybackState::Playing || !played.is_finite() {
            return None;
        }
        self.played = played.clamp(0.0, 1.0);
        if self.played >= COMPLETION_THRESHOLD {
            self.state = PlaybackState::Ended;
            return Some(Milestone::Watched);
        }
        None
    }

    /// End-of-stream from the media element.
    pub fn media_ended(&mut self) -> Option<Milestone> {
        match self.state {
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused => {
                self.state = PlaybackState::Ended;
                self.played = 1.0;
                Some(Milestone::EndOfStream)
            }
            PlaybackState::Idle | PlaybackState::Ended => None,
        }
    }

    /// A playback failure never counts as reaching the end.
    pub fn media_error(&mut self, message: impl Into<String>) {
        if self.state == PlaybackState::Idle {
            return;
        }
        self.last_error = Some(message.into());
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Restart an ended lecture from the beginning.
    ///
    /// Returns the position the media element must seek to.
    ///
    /// # Errors
    ///
    /// `NoLecture` when idle; `InvalidTransition` unless ended.
    pub fn replay(&mut self) -> Result<Duration, PlayerError> {
        match self.state {
            PlaybackState::Idle => Err(PlayerError::NoLecture),
            PlaybackState::Ended => {
                self.played = 0.0;
                self.state = PlaybackState::Playing;
                Ok(Duration::ZERO)
            }
            from => Err(PlayerError::InvalidTransition {
                from,
                event: "replay",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SectionId, SubSectionId};

    fn position(lecture: &str) -> Position {
        Position::new(SectionId::new("s").unwrap(), SubSectionId::new(lecture).unwrap())
    }

    fn playing() -> PlayerController {
        let mut player = PlayerController::new();
        player.load(position("a"));
        player.play().unwrap();
        player
    }

    #[test]
    fn starts_idle_and_rejects_play() {
        let mut player = PlayerController::new();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.play(), Err(PlayerError::NoLecture));
    }

    #[test]
    fn progress_past_threshold_ends() {
        let mut player = playing();
        assert_eq!(player.progress(0.5), None);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.progress(0.95), Some(Milestone::Watched));
        assert!(player.is_ended());
    }

    #[test]
    fn progress_exactly_at_threshold_ends() {
        let mut player = playing();
        assert_eq!(player.progress(COMPLETION_THRESHOLD), Some(Milestone::Watched));
    }

    #[test]
    fn progress_ignored_unless_playing() {
        let mut player = playing();
        player.pause().unwrap();
        assert_eq!(player.progress(0.99), None);
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.progress(f64::NAN), None);
    }

    #[test]
    fn toggles_between_playing_and_paused() {
        let mut player = playing();
        assert_eq!(player.toggle(), Ok(PlaybackState::Paused));
        assert_eq!(player.toggle(), Ok(PlaybackState::Playing));
    }

    #[test]
    fn end_of_stream_ends_from_paused() {
        let mut player = playing();
        player.pause().unwrap();
        assert_eq!(player.media_ended(), Some(Milestone::EndOfStream));
        assert!(player.is_ended());
        assert_eq!(player.media_ended(), None);
    }

    #[test]
    fn media_error_pauses_without_ending() {
        let mut player = playing();
        player.media_error("decoder failed");
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.last_error(), Some("decoder failed"));
    }

    #[test]
    fn replay_restarts_ended_lecture() {
        let mut player = playing();
        player.progress(0.92);
        assert_eq!(player.replay(), Ok(Duration::ZERO));
        assert_eq!(player.state(), PlaybackState::Playing);
        assert!(player.played().abs() < f64::EPSILON);
        assert!(!player.is_ended());
    }

    #[test]
    fn replay_requires_ended() {
        let mut player = playing();
        assert!(matches!(
            player.replay(),
            Err(PlayerError::InvalidTransition { from: PlaybackState::Playing, .. })
        ));
    }

    #[test]
    fn play_after_end_requires_replay() {
        let mut player = playing();
        player.media_ended();
        assert!(player.play().is_err());
    }

    #[test]
    fn load_resets_from_any_state() {
        let mut player = playing();
        player.set_duration(Duration::from_secs(100));
        player.progress(0.95);
        player.load(position("b"));

        assert_eq!(player.state(), PlaybackState::Ready);
        assert_eq!(player.position(), Some(&position("b")));
        assert_eq!(player.duration(), None);
        assert!(!player.is_ended());
    }

    #[test]
    fn elapsed_follows_duration() {
        let mut player = playing();
        player.set_duration(Duration::from_secs(200));
        player.progress(0.5);
        assert_eq!(player.elapsed(), Some(Duration::from_secs(100)));
    }
}
