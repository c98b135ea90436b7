#![forbid(unsafe_code)]

pub mod bank_cache;
pub mod error;
pub mod sessions;

pub use quiz_core::Clock;

pub use bank_cache::QuestionBankCache;
pub use error::AdaptiveSessionError;
pub use sessions::{
    AdaptiveSessionService, FinalResults, PreparedQuestion, PreparedSet, SessionProgress,
    SessionStatus, StartedSession, SubmitOutcome,
};
