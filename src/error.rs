use thiserror::Error;

use crate::session::{MIN_DURATION_SECS, MIN_TARGET_SCORE};

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(
        "Enter valid values (time ≥ {min_secs}s, target ≥ {min_score}); got {duration_secs}s and {target_score}",
        min_secs = MIN_DURATION_SECS,
        min_score = MIN_TARGET_SCORE
    )]
    InvalidConfig {
        duration_secs: u32,
        target_score: u32,
    },
    #[error("A session is already running")]
    SessionAlreadyActive,
    #[error("The board has no tiles")]
    EmptyBoard,
}

pub type Result<T> = core::result::Result<T, SessionError>;
