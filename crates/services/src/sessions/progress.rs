use serde::Serialize;

use quiz_core::model::{
    DifficultyAdjustment, DifficultyLevel, LearnerId, SessionId, SessionSummary, SetResult,
    TopicId,
};

use super::prepare::PreparedSet;

/// Response to a successful `start_session` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub topic_id: TopicId,
    pub initial_difficulty: DifficultyLevel,
    pub current_difficulty: DifficultyLevel,
    pub total_sets: u32,
    pub first_set: PreparedSet,
}

/// Progress counters carried on a "continue" submission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    /// The set that was just completed.
    pub completed_set: u32,
    pub next_set: u32,
    pub total_sets: u32,
    pub next_difficulty: DifficultyLevel,
}

/// Aggregate payload returned once the final set is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalResults {
    pub session_id: SessionId,
    pub final_proficiency: f64,
    pub initial_difficulty: DifficultyLevel,
    pub final_difficulty: DifficultyLevel,
    pub sets_completed: Vec<SetResult>,
    pub difficulty_adjustments: Vec<DifficultyAdjustment>,
    pub total_time_secs: f64,
    pub summary: SessionSummary,
}

/// Outcome of a set submission: either the next prepared set or the final
/// session results.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Continue {
        set_result: SetResult,
        progress: SessionProgress,
        next_set: PreparedSet,
    },
    Complete {
        set_result: SetResult,
        final_results: FinalResults,
    },
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, SubmitOutcome::Complete { .. })
    }

    #[must_use]
    pub fn set_result(&self) -> &SetResult {
        match self {
            SubmitOutcome::Continue { set_result, .. }
            | SubmitOutcome::Complete { set_result, .. } => set_result,
        }
    }
}

/// Read-only snapshot of a session's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    pub current_set: u32,
    pub total_sets: u32,
    pub initial_difficulty: DifficultyLevel,
    pub current_difficulty: DifficultyLevel,
    pub is_complete: bool,
    pub final_proficiency: Option<f64>,
    pub sets_completed: Vec<SetResult>,
    pub difficulty_adjustments: Vec<DifficultyAdjustment>,
}
