use std::time::Instant;

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::board::TileId;
use crate::error::{Result, SessionError};

pub const MIN_DURATION_SECS: u32 = 30;
pub const MIN_TARGET_SCORE: u32 = 10;

/// How a session is won.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// reach the target score; the clock counts up
    #[default]
    #[value(name = "score")]
    #[strum(to_string = "Score target")]
    ScoreTarget,
    /// survive until the clock runs down
    #[value(name = "time")]
    #[strum(to_string = "Time limit")]
    TimeLimit,
}

impl GameMode {
    pub fn toggled(self) -> Self {
        match self {
            GameMode::ScoreTarget => GameMode::TimeLimit,
            GameMode::TimeLimit => GameMode::ScoreTarget,
        }
    }

    /// Label shown next to the clock while playing.
    pub fn clock_label(self) -> &'static str {
        match self {
            GameMode::ScoreTarget => "Time used",
            GameMode::TimeLimit => "Time left",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: GameMode,
    pub duration_secs: u32,
    pub target_score: u32,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.duration_secs < MIN_DURATION_SECS || self.target_score < MIN_TARGET_SCORE {
            return Err(SessionError::InvalidConfig {
                duration_secs: self.duration_secs,
                target_score: self.target_score,
            });
        }
        Ok(())
    }

    /// Value the clock shows before the first tick.
    pub fn initial_clock_seconds(&self) -> i64 {
        match self.mode {
            GameMode::ScoreTarget => 0,
            GameMode::TimeLimit => self.duration_secs as i64,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::ScoreTarget,
            duration_secs: 60,
            target_score: MIN_TARGET_SCORE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub active: bool,
    pub score: u32,
    pub started_at: Option<Instant>,
    pub active_tile: Option<TileId>,
    /// Remaining seconds in time-limit mode, elapsed seconds otherwise.
    pub clock_seconds: i64,
    /// A wrong tile was hit and the loss is waiting on its deferred resolution.
    pub miss_pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum EndReason {
    #[strum(to_string = "target reached")]
    TargetReached,
    #[strum(to_string = "time up")]
    TimeUp,
    #[strum(to_string = "wrong tile")]
    WrongTile,
    #[strum(to_string = "board exhausted")]
    BoardExhausted,
    #[strum(to_string = "stopped")]
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub success: bool,
    pub score: u32,
    pub time_used_secs: u64,
    pub mode: GameMode,
    pub reason: EndReason,
    pub finished_at: DateTime<Local>,
}

impl SessionSummary {
    pub fn message(&self) -> String {
        match (self.mode, self.success) {
            (GameMode::ScoreTarget, true) => {
                format!("🎉 Target reached! Time used: {}s", self.time_used_secs)
            }
            _ => format!("💥 Game over! Score: {}", self.score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(mode: GameMode, success: bool) -> SessionSummary {
        SessionSummary {
            success,
            score: 7,
            time_used_secs: 42,
            mode,
            reason: EndReason::Stopped,
            finished_at: Local::now(),
        }
    }

    #[test]
    fn validate_boundaries() {
        let mut cfg = SessionConfig {
            mode: GameMode::ScoreTarget,
            duration_secs: 30,
            target_score: 10,
        };
        assert!(cfg.validate().is_ok());

        cfg.duration_secs = 29;
        assert_eq!(
            cfg.validate(),
            Err(SessionError::InvalidConfig {
                duration_secs: 29,
                target_score: 10
            })
        );

        cfg.duration_secs = 30;
        cfg.target_score = 9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn initial_clock_depends_on_mode() {
        let mut cfg = SessionConfig::default();
        assert_eq!(cfg.initial_clock_seconds(), 0);
        cfg.mode = GameMode::TimeLimit;
        assert_eq!(cfg.initial_clock_seconds(), 60);
    }

    #[test]
    fn message_for_score_target_win_reports_time() {
        let msg = summary(GameMode::ScoreTarget, true).message();
        assert!(msg.contains("Target reached"));
        assert!(msg.contains("42s"));
    }

    #[test]
    fn message_for_other_outcomes_reports_score() {
        for (mode, success) in [
            (GameMode::ScoreTarget, false),
            (GameMode::TimeLimit, true),
            (GameMode::TimeLimit, false),
        ] {
            let msg = summary(mode, success).message();
            assert!(msg.contains("Score: 7"), "{mode:?}/{success}: {msg}");
        }
    }

    #[test]
    fn mode_toggle_and_labels() {
        assert_eq!(GameMode::ScoreTarget.toggled(), GameMode::TimeLimit);
        assert_eq!(GameMode::TimeLimit.toggled(), GameMode::ScoreTarget);
        assert_eq!(GameMode::TimeLimit.clock_label(), "Time left");
        assert_eq!(GameMode::ScoreTarget.to_string(), "Score target");
    }
}
