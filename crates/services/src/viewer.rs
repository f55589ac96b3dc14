use std::time::Duration;

use course_core::model::{
    CompletionSet, CourseId, CourseTree, Lecture, LectureRoute, Position, SectionId, SubSectionId,
};
use course_core::{LectureNavigator, Milestone, NavigationError, PlaybackState, PlayerController};

use crate::completion_tracker::{CompletionTracker, MarkOutcome};
use crate::error::ViewerError;

/// Controls shown over the player once a lecture has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOverlay {
    pub show_mark_complete: bool,
    pub show_previous: bool,
    pub show_next: bool,
    pub show_replay: bool,
}

//
// ─── VIEWER ────────────────────────────────────────────────────────────────────
//

/// State behind the lecture page for one student in one course.
///
/// Until a non-empty tree is loaded the viewer is "loading": navigation and
/// completion calls return `None` and touch nothing.
pub struct CourseViewer {
    course_id: CourseId,
    tree: Option<CourseTree>,
    position: Option<Position>,
    player: PlayerController,
    tracker: CompletionTracker,
}

impl CourseViewer {
    #[must_use]
    pub fn new(tracker: CompletionTracker) -> Self {
        Self {
            course_id: tracker.completed().course_id().clone(),
            tree: None,
            position: None,
            player: PlayerController::new(),
            tracker,
        }
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    /// Install (or replace) the course content.
    pub fn load_tree(&mut self, tree: CourseTree) {
        if tree.course_id() != &self.course_id {
            tracing::warn!(
                expected = %self.course_id,
                got = %tree.course_id(),
                "loaded tree belongs to another course"
            );
        }
        self.tree = Some(tree);
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.tree.as_ref().is_none_or(CourseTree::is_empty)
    }

    #[must_use]
    pub fn tree(&self) -> Option<&CourseTree> {
        self.tree.as_ref()
    }

    #[must_use]
    pub fn player(&self) -> &PlayerController {
        &self.player
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.player.state()
    }

    #[must_use]
    pub fn completion(&self) -> &CompletionSet {
        self.tracker.completed()
    }

    #[must_use]
    pub fn pending_completions(&self) -> &[SubSectionId] {
        self.tracker.pending()
    }

    /// Completed share of the loaded course, in percent.
    ///
    /// Completions for lectures no longer in the tree are not counted.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        let Some(tree) = self.tree.as_ref() else {
            return 0.0;
        };
        let done = self.tracker.completed();
        let current = CompletionSet::from_persisted(
            done.user_id().clone(),
            done.course_id().clone(),
            done.iter().filter(|id| tree.contains_lecture(id)).cloned(),
        );
        current.progress_percent(tree.lecture_count())
    }

    fn navigator(&self) -> Option<LectureNavigator<'_>> {
        self.tree
            .as_ref()
            .filter(|tree| !tree.is_empty())
            .map(LectureNavigator::new)
    }

    fn show(&mut self, position: Position) -> LectureRoute {
        let route = LectureRoute::new(self.course_id.clone(), position.clone());
        self.player.load(position.clone());
        self.position = Some(position);
        route
    }

    /// Show a lecture by id.
    ///
    /// An unknown section or lecture falls back to the first lecture.
    /// Returns the route actually shown, `None` while loading.
    pub fn open(
        &mut self,
        section_id: &SectionId,
        sub_section_id: &SubSectionId,
    ) -> Option<LectureRoute> {
        let nav = self.navigator()?;
        let requested = Position::new(section_id.clone(), sub_section_id.clone());
        let target = match nav.resolve(&requested) {
            Ok(_) => requested,
            Err(err) => {
                tracing::warn!(error = %err, "falling back to the first lecture");
                nav.first()?
            }
        };
        Some(self.show(target))
    }

    /// Show the opening lecture of the course. `None` while loading.
    pub fn open_first(&mut self) -> Option<LectureRoute> {
        let first = self.navigator()?.first()?;
        Some(self.show(first))
    }

    /// Show the lecture a route points at.
    pub fn open_route(&mut self, route: &LectureRoute) -> Option<LectureRoute> {
        if route.course_id != self.course_id {
            tracing::warn!(course_id = %route.course_id, "route for another course");
        }
        self.open(&route.section_id, &route.sub_section_id)
    }

    fn step(&mut self, forward: bool) -> Result<Option<LectureRoute>, ViewerError> {
        let (Some(nav), Some(current)) = (self.navigator(), self.position.as_ref()) else {
            return Ok(None);
        };
        let target = if forward {
            nav.next(current)?
        } else {
            nav.previous(current)?
        };
        Ok(target.map(|position| self.show(position)))
    }

    /// Move to the following lecture. `Ok(None)` on the last lecture or while loading.
    ///
    /// # Errors
    ///
    /// Returns `ViewerError::Navigation` if the current lecture is no longer in the tree.
    pub fn next(&mut self) -> Result<Option<LectureRoute>, ViewerError> {
        self.step(true)
    }

    /// Move to the preceding lecture. `Ok(None)` on the first lecture or while loading.
    ///
    /// # Errors
    ///
    /// Returns `ViewerError::Navigation` if the current lecture is no longer in the tree.
    pub fn previous(&mut self) -> Result<Option<LectureRoute>, ViewerError> {
        self.step(false)
    }

    #[must_use]
    pub fn current_position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    #[must_use]
    pub fn current_lecture(&self) -> Option<&Lecture> {
        let nav = self.navigator()?;
        nav.resolve(self.position.as_ref()?).ok()
    }

    #[must_use]
    pub fn current_route(&self) -> Option<LectureRoute> {
        self.position
            .clone()
            .map(|position| LectureRoute::new(self.course_id.clone(), position))
    }

    // ─── playback events ───

    /// # Errors
    ///
    /// Returns `ViewerError::Player` when no lecture is open or the lecture has ended.
    pub fn on_play(&mut self) -> Result<PlaybackState, ViewerError> {
        Ok(self.player.play()?)
    }

    /// # Errors
    ///
    /// Returns `ViewerError::Player` when the lecture is not playing.
    pub fn on_pause(&mut self) -> Result<PlaybackState, ViewerError> {
        Ok(self.player.pause()?)
    }

    pub fn on_progress(&mut self, played: f64) -> Option<Milestone> {
        self.player.progress(played)
    }

    pub fn on_duration(&mut self, duration: Duration) {
        self.player.set_duration(duration);
    }

    pub fn on_ended(&mut self) -> Option<Milestone> {
        self.player.media_ended()
    }

    pub fn on_media_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(error = %message, "media playback failed");
        self.player.media_error(message);
    }

    /// Restart the ended lecture; returns the seek target.
    ///
    /// # Errors
    ///
    /// Returns `ViewerError::Player` unless the lecture has ended.
    pub fn replay(&mut self) -> Result<Duration, ViewerError> {
        Ok(self.player.replay()?)
    }

    // ─── completion ───

    /// Mark the lecture on screen complete. `None` while loading or with no lecture open.
    pub async fn mark_current_complete(&mut self) -> Option<MarkOutcome> {
        if self.is_loading() {
            return None;
        }
        let lecture = self.position.as_ref()?.sub_section_id.clone();
        Some(self.tracker.mark_complete(&lecture).await)
    }

    /// Re-send completions whose remote call failed.
    pub async fn retry_pending(&mut self) -> usize {
        self.tracker.retry_pending().await
    }

    /// Buttons to render over an ended lecture; `None` unless ended.
    #[must_use]
    pub fn end_overlay(&self) -> Option<EndOverlay> {
        if !self.player.is_ended() {
            return None;
        }
        let nav = self.navigator()?;
        let position = self.position.as_ref()?;
        self.overlay_at(&nav, position).ok()
    }

    fn overlay_at(
        &self,
        nav: &LectureNavigator<'_>,
        position: &Position,
    ) -> Result<EndOverlay, NavigationError> {
        Ok(EndOverlay {
            show_mark_complete: !self.tracker.is_complete(&position.sub_section_id),
            show_previous: !nav.is_first(position)?,
            show_next: !nav.is_last(position)?,
            show_replay: true,
        })
    }
}
