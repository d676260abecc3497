use std::time::{Duration, Instant};

use chrono::Local;
use rand::{seq::SliceRandom, Rng};

use crate::board::{BoardRenderer, TileId};
use crate::clock::Clock;
use crate::error::{Result, SessionError};
use crate::feedback::{FeedbackKind, FeedbackPlayer};
use crate::session::{EndReason, GameMode, SessionConfig, SessionState, SessionSummary};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);
/// Pause between a hit and the next target appearing.
pub const RETARGET_DELAY: Duration = Duration::from_millis(400);
/// How long the error marker shows before a miss ends the session.
pub const MISS_DELAY: Duration = Duration::from_millis(300);

/// Result of activating a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Ignored,
    Hit { score: u32 },
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Retarget,
    ResolveMiss(TileId),
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due: Instant,
    generation: u64,
    action: Deferred,
}

/// Owns the lifecycle of one play session at a time.
///
/// Everything runs on the caller's thread. Time only moves forward when the
/// caller invokes [`SessionController::pump`] (or [`SessionController::tick`]
/// directly), which fires whatever countdown ticks and deferred actions are due.
#[derive(Debug)]
pub struct SessionController<B, F, R, C> {
    board: B,
    feedback: F,
    rng: R,
    clock: C,
    config: SessionConfig,
    state: SessionState,
    generation: u64,
    next_tick: Option<Instant>,
    pending: Vec<Pending>,
    retry_cue: Option<FeedbackKind>,
    last_summary: Option<SessionSummary>,
}

impl<B, F, R, C> SessionController<B, F, R, C>
where
    B: BoardRenderer,
    F: FeedbackPlayer,
    R: Rng,
    C: Clock,
{
    pub fn new(board: B, feedback: F, rng: R, clock: C) -> Self {
        Self {
            board,
            feedback,
            rng,
            clock,
            config: SessionConfig::default(),
            state: SessionState::default(),
            generation: 0,
            next_tick: None,
            pending: Vec::new(),
            retry_cue: None,
            last_summary: None,
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    /// Swapping the board is only allowed between sessions.
    pub fn board_mut(&mut self) -> Option<&mut B> {
        (!self.state.active).then_some(&mut self.board)
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut F {
        &mut self.feedback
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn score(&self) -> u32 {
        self.state.score
    }

    pub fn clock_seconds(&self) -> i64 {
        self.state.clock_seconds
    }

    /// Summary of the last finished session, handed out once.
    pub fn take_summary(&mut self) -> Option<SessionSummary> {
        self.last_summary.take()
    }

    pub fn start_session(&mut self, config: SessionConfig) -> Result<()> {
        if self.state.active {
            tracing::debug!("start requested while a session is running");
            return Err(SessionError::SessionAlreadyActive);
        }
        config.validate()?;
        if self.board.tile_count() == 0 {
            return Err(SessionError::EmptyBoard);
        }

        let now = self.clock.now();
        self.generation += 1;
        self.config = config;
        self.state = SessionState {
            active: true,
            score: 0,
            started_at: Some(now),
            active_tile: None,
            clock_seconds: config.initial_clock_seconds(),
            miss_pending: false,
        };
        self.last_summary = None;
        self.board.reset_board();
        self.next_tick = Some(now + TICK_PERIOD);
        self.retry_feedback();

        tracing::info!(
            mode = %config.mode,
            duration_secs = config.duration_secs,
            target_score = config.target_score,
            tiles = self.board.tile_count(),
            "session started"
        );

        self.select_new_target();
        Ok(())
    }

    /// One countdown evaluation. No-op once the session has ended.
    pub fn tick(&mut self) -> Option<SessionSummary> {
        if !self.state.active {
            return None;
        }

        let elapsed = self.elapsed_secs() as i64;
        match self.config.mode {
            GameMode::TimeLimit => {
                let remaining = self.config.duration_secs as i64 - elapsed;
                self.state.clock_seconds = remaining;
                if remaining <= 0 {
                    return self.finish(true, EndReason::TimeUp);
                }
            }
            GameMode::ScoreTarget => {
                self.state.clock_seconds = elapsed;
                if self.target_reached() {
                    return self.finish(true, EndReason::TargetReached);
                }
            }
        }
        None
    }

    pub fn handle_tile_activation(&mut self, tile: TileId) -> Activation {
        self.retry_feedback();

        if !self.state.active || self.state.miss_pending {
            return Activation::Ignored;
        }
        let Some(flags) = self.board.tile(tile) else {
            return Activation::Ignored;
        };
        if flags.is_resolved {
            return Activation::Ignored;
        }

        if self.state.active_tile == Some(tile) {
            self.on_hit(tile)
        } else {
            self.on_miss(tile)
        }
    }

    fn on_hit(&mut self, tile: TileId) -> Activation {
        self.state.score += 1;
        self.state.active_tile = None;
        self.board.clear_target(tile);
        self.board.mark_resolved(tile);
        self.cue(FeedbackKind::Success);

        let score = self.state.score;
        tracing::debug!(tile = tile.0, score, "hit");

        if self.target_reached() {
            self.finish(true, EndReason::TargetReached);
        } else {
            self.defer(RETARGET_DELAY, Deferred::Retarget);
        }
        Activation::Hit { score }
    }

    fn on_miss(&mut self, tile: TileId) -> Activation {
        tracing::debug!(tile = tile.0, "miss");
        self.cue(FeedbackKind::Failure);
        self.board.mark_error(tile);
        self.state.miss_pending = true;
        self.defer(MISS_DELAY, Deferred::ResolveMiss(tile));
        Activation::Miss
    }

    /// Ends the running session. Returns `None` if nothing was running.
    pub fn end_session(&mut self, success: bool) -> Option<SessionSummary> {
        self.finish(success, EndReason::Stopped)
    }

    fn finish(&mut self, success: bool, reason: EndReason) -> Option<SessionSummary> {
        if !self.state.active {
            return None;
        }

        self.next_tick = None;
        let summary = SessionSummary {
            success,
            score: self.state.score,
            time_used_secs: self.elapsed_secs(),
            mode: self.config.mode,
            reason,
            finished_at: Local::now(),
        };

        tracing::info!(
            success,
            %reason,
            score = summary.score,
            time_used_secs = summary.time_used_secs,
            "session ended"
        );

        self.state = SessionState::default();
        self.board.reset_board();
        self.last_summary = Some(summary.clone());
        Some(summary)
    }

    /// Moves the target to a random unresolved tile.
    ///
    /// Running out of unresolved tiles loses the session.
    pub fn select_new_target(&mut self) -> Option<TileId> {
        if !self.state.active {
            return None;
        }

        if let Some(previous) = self.state.active_tile.take() {
            self.board.clear_target(previous);
        }

        let eligible: Vec<TileId> = (0..self.board.tile_count())
            .map(TileId)
            .filter(|id| self.board.tile(*id).is_some_and(|t| !t.is_resolved))
            .collect();

        match eligible.choose(&mut self.rng).copied() {
            Some(next) => {
                self.board.set_target(next);
                self.state.active_tile = Some(next);
                Some(next)
            }
            None => {
                self.finish(false, EndReason::BoardExhausted);
                None
            }
        }
    }

    /// Fires every countdown tick and deferred action that is due, oldest first.
    pub fn pump(&mut self) {
        let now = self.clock.now();

        loop {
            let next_deferred = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, p)| p.due <= now)
                .min_by_key(|(_, p)| p.due)
                .map(|(idx, p)| (idx, p.due));
            let tick_due = self.next_tick.filter(|due| *due <= now);

            match (tick_due, next_deferred) {
                (None, None) => break,
                (Some(tick), Some((idx, due))) if due < tick => self.fire(idx),
                (Some(tick), _) => {
                    self.next_tick = Some(tick + TICK_PERIOD);
                    self.tick();
                }
                (None, Some((idx, _))) => self.fire(idx),
            }
        }
    }

    fn fire(&mut self, idx: usize) {
        let pending = self.pending.swap_remove(idx);
        if pending.generation != self.generation || !self.state.active {
            tracing::trace!(action = ?pending.action, "dropping stale deferred action");
            return;
        }

        match pending.action {
            Deferred::Retarget => {
                self.select_new_target();
            }
            Deferred::ResolveMiss(tile) => {
                self.board.clear_error(tile);
                self.finish(false, EndReason::WrongTile);
            }
        }
    }

    fn defer(&mut self, delay: Duration, action: Deferred) {
        self.pending.push(Pending {
            due: self.clock.now() + delay,
            generation: self.generation,
            action,
        });
    }

    fn target_reached(&self) -> bool {
        self.config.mode == GameMode::ScoreTarget && self.state.score >= self.config.target_score
    }

    fn elapsed_secs(&self) -> u64 {
        self.state
            .started_at
            .map(|start| self.clock.now().saturating_duration_since(start).as_secs())
            .unwrap_or(0)
    }

    fn cue(&mut self, kind: FeedbackKind) {
        if let Err(err) = self.feedback.play(kind) {
            tracing::warn!(%kind, "feedback playback failed: {err}");
            self.retry_cue = Some(kind);
        }
    }

    fn retry_feedback(&mut self) {
        if let Some(kind) = self.retry_cue.take() {
            if let Err(err) = self.feedback.play(kind) {
                tracing::warn!(%kind, "feedback retry failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Grid;
    use crate::clock::ManualClock;
    use crate::feedback::FeedbackError;
    use assert_matches::assert_matches;
    use rand::{rngs::StdRng, SeedableRng};

    #[derive(Debug, Default)]
    struct Recorder {
        played: Vec<FeedbackKind>,
        failures_left: usize,
    }

    impl FeedbackPlayer for Recorder {
        fn play(&mut self, kind: FeedbackKind) -> std::result::Result<(), FeedbackError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(FeedbackError::NoCue(kind));
            }
            self.played.push(kind);
            Ok(())
        }
    }

    type TestController = SessionController<Grid, Recorder, StdRng, ManualClock>;

    fn controller(side: u16) -> (TestController, ManualClock) {
        let clock = ManualClock::new();
        let ctl = SessionController::new(
            Grid::square(side),
            Recorder::default(),
            StdRng::seed_from_u64(42),
            clock.clone(),
        );
        (ctl, clock)
    }

    fn score_config(target_score: u32) -> SessionConfig {
        SessionConfig {
            mode: GameMode::ScoreTarget,
            duration_secs: 30,
            target_score,
        }
    }

    fn non_target(ctl: &TestController) -> TileId {
        let target = ctl.board().target();
        (0..ctl.board().tile_count())
            .map(TileId)
            .find(|id| Some(*id) != target && !ctl.board().tile(*id).unwrap().is_resolved)
            .unwrap()
    }

    #[test]
    fn start_selects_exactly_one_target() {
        let (mut ctl, _) = controller(4);
        ctl.start_session(score_config(10)).unwrap();
        assert!(ctl.is_active());
        assert_eq!(ctl.board().target_count(), 1);
        assert_eq!(ctl.state().active_tile, ctl.board().target());
        assert_eq!(ctl.score(), 0);
    }

    #[test]
    fn start_on_empty_board_fails_without_side_effects() {
        let (mut ctl, _) = controller(0);
        assert_eq!(
            ctl.start_session(score_config(10)),
            Err(SessionError::EmptyBoard)
        );
        assert!(!ctl.is_active());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (mut ctl, _) = controller(4);
        assert_matches!(
            ctl.start_session(score_config(9)),
            Err(SessionError::InvalidConfig { target_score: 9, .. })
        );
        assert!(!ctl.is_active());
        assert_eq!(ctl.board().target_count(), 0);
    }

    #[test]
    fn hit_resolves_tile_and_retargets_after_delay() {
        let (mut ctl, clock) = controller(4);
        ctl.start_session(score_config(10)).unwrap();
        let first = ctl.board().target().unwrap();

        assert_eq!(ctl.handle_tile_activation(first), Activation::Hit { score: 1 });
        assert_eq!(ctl.board().target_count(), 0);
        assert!(ctl.board().tile(first).unwrap().is_resolved);
        assert_eq!(ctl.feedback().played, vec![FeedbackKind::Success]);

        clock.advance(Duration::from_millis(399));
        ctl.pump();
        assert_eq!(ctl.board().target_count(), 0);

        clock.advance(Duration::from_millis(1));
        ctl.pump();
        let next = ctl.board().target().unwrap();
        assert_ne!(next, first);
    }

    #[test]
    fn resolved_tile_activation_is_ignored() {
        let (mut ctl, clock) = controller(4);
        ctl.start_session(score_config(10)).unwrap();
        let first = ctl.board().target().unwrap();
        ctl.handle_tile_activation(first);
        clock.advance(RETARGET_DELAY);
        ctl.pump();

        assert_eq!(ctl.handle_tile_activation(first), Activation::Ignored);
        assert!(ctl.is_active());
        assert_eq!(ctl.score(), 1);
    }

    #[test]
    fn miss_ends_session_after_delay() {
        let (mut ctl, clock) = controller(4);
        ctl.start_session(score_config(10)).unwrap();
        let wrong = non_target(&ctl);

        assert_eq!(ctl.handle_tile_activation(wrong), Activation::Miss);
        assert!(ctl.board().tile(wrong).unwrap().is_error);
        assert!(ctl.is_active());

        // further input is ignored while the loss is pending
        let target = ctl.board().target().unwrap();
        assert_eq!(ctl.handle_tile_activation(target), Activation::Ignored);

        clock.advance(MISS_DELAY);
        ctl.pump();
        assert!(!ctl.is_active());
        let summary = ctl.take_summary().unwrap();
        assert!(!summary.success);
        assert_eq!(summary.reason, EndReason::WrongTile);
        assert!(!ctl.board().tile(wrong).unwrap().is_error);
        assert_eq!(
            ctl.feedback().played,
            vec![FeedbackKind::Failure]
        );
    }

    #[test]
    fn pump_fires_ticks_once_per_second() {
        let (mut ctl, clock) = controller(4);
        let config = SessionConfig {
            mode: GameMode::TimeLimit,
            duration_secs: 30,
            target_score: 10,
        };
        ctl.start_session(config).unwrap();
        assert_eq!(ctl.clock_seconds(), 30);

        clock.advance(Duration::from_millis(2500));
        ctl.pump();
        assert_eq!(ctl.clock_seconds(), 28);
    }

    #[test]
    fn score_mode_reports_elapsed() {
        let (mut ctl, clock) = controller(4);
        ctl.start_session(score_config(10)).unwrap();
        clock.advance(Duration::from_secs(5));
        ctl.pump();
        assert_eq!(ctl.clock_seconds(), 5);
        assert!(ctl.is_active());
    }

    #[test]
    fn end_session_is_idempotent() {
        let (mut ctl, clock) = controller(4);
        ctl.start_session(score_config(10)).unwrap();
        clock.advance(Duration::from_secs(3));

        let first = ctl.end_session(false).unwrap();
        assert_eq!(first.time_used_secs, 3);
        assert_eq!(first.reason, EndReason::Stopped);
        let board_after_first = ctl.board().clone();
        let state_after_first = ctl.state().clone();

        assert_eq!(ctl.end_session(false), None);
        assert_eq!(ctl.board(), &board_after_first);
        assert_eq!(ctl.state(), &state_after_first);
        assert_eq!(*ctl.state(), SessionState::default());
    }

    #[test]
    fn tick_after_end_is_noop() {
        let (mut ctl, _) = controller(4);
        ctl.start_session(score_config(10)).unwrap();
        ctl.end_session(true);
        ctl.take_summary();
        assert_eq!(ctl.tick(), None);
        assert_eq!(ctl.take_summary(), None);
    }

    #[test]
    fn stale_retarget_does_not_touch_next_session() {
        let (mut ctl, clock) = controller(4);
        ctl.start_session(score_config(10)).unwrap();
        let first = ctl.board().target().unwrap();
        ctl.handle_tile_activation(first);
        ctl.end_session(false);

        ctl.start_session(score_config(10)).unwrap();
        let target = ctl.board().target().unwrap();

        clock.advance(Duration::from_millis(450));
        ctl.pump();
        assert_eq!(ctl.board().target(), Some(target));
        assert_eq!(ctl.board().target_count(), 1);
    }

    #[test]
    fn failed_cue_is_retried_on_next_activation() {
        let (mut ctl, clock) = controller(4);
        ctl.feedback_mut().failures_left = 1;
        ctl.start_session(score_config(10)).unwrap();

        let first = ctl.board().target().unwrap();
        assert_eq!(ctl.handle_tile_activation(first), Activation::Hit { score: 1 });
        assert!(ctl.feedback().played.is_empty());
        assert!(ctl.is_active());

        clock.advance(RETARGET_DELAY);
        ctl.pump();
        let second = ctl.board().target().unwrap();
        ctl.handle_tile_activation(second);
        assert_eq!(
            ctl.feedback().played,
            vec![FeedbackKind::Success, FeedbackKind::Success]
        );
    }

    #[test]
    fn board_swap_only_between_sessions() {
        let (mut ctl, _) = controller(4);
        assert!(ctl.board_mut().is_some());
        ctl.start_session(score_config(10)).unwrap();
        assert!(ctl.board_mut().is_none());
    }
}
