//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionId, SessionError, SetId, TopicId};
use storage::repository::StorageError;

/// Errors emitted by `AdaptiveSessionService`.
///
/// Every operation returns a discriminated result; nothing in the adaptive
/// flow panics. Trend bookkeeping failures never surface here: they are
/// logged and swallowed so a completed session is never lost to analytics.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdaptiveSessionError {
    #[error("total sets must be at least 1")]
    InvalidTotalSets,

    #[error("unknown session")]
    UnknownSession,

    #[error("topic {0} has no question sets")]
    NoQuestionSets(TopicId),

    #[error("question set {0} has no questions")]
    NoQuestions(SetId),

    #[error("question {question} is not part of set {set}")]
    UnknownQuestion { question: QuestionId, set: SetId },

    #[error("session was modified concurrently, retry the submission")]
    Concurrency,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
