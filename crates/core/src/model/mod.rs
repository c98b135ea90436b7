mod difficulty;
mod ids;
mod question;
mod session;
mod trend;

pub use difficulty::{
    DifficultyLevel, LadderProfile, ParseDifficultyError, is_fast_completion, FAST_PACE_SECS,
    RAISE_THRESHOLD,
};
pub use ids::{AttemptId, LearnerId, ParseIdError, QuestionId, SessionId, SetId, TopicId};
pub use question::{Question, QuestionError, QuestionSet};
pub use session::{
    AdaptiveSession, DifficultyAdjustment, SessionError, SessionSummary, SetResult,
};
pub use trend::{ProficiencyTrend, TREND_WINDOW};
