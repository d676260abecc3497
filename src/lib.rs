// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod board;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod feedback;
pub mod runtime;
pub mod session;

pub use controller::{Activation, SessionController};
pub use error::SessionError;
pub use session::{GameMode, SessionConfig, SessionSummary};
