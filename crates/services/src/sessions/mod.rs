mod controller;
mod prepare;
mod progress;

// Public API of the adaptive session subsystem.
pub use crate::error::AdaptiveSessionError;
pub use controller::AdaptiveSessionService;
pub use prepare::{PreparedQuestion, PreparedSet, SECS_PER_QUESTION_LIMIT};
pub use progress::{
    FinalResults, SessionProgress, SessionStatus, StartedSession, SubmitOutcome,
};
