use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::difficulty::DifficultyLevel;
use crate::model::ids::{LearnerId, SessionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("total sets must be at least 1")]
    InvalidTotalSets,

    #[error("session already completed")]
    AlreadyCompleted,

    #[error("set result is for set {provided}, current set is {expected}")]
    SetNumberMismatch { provided: u32, expected: u32 },

    #[error("session still has sets remaining")]
    NotFinished,

    #[error("set results ({results}) do not match current set {current_set}")]
    CountMismatch { results: usize, current_set: u32 },

    #[error("current set {current_set} is out of range for {total_sets} sets")]
    SetOutOfRange { current_set: u32, total_sets: u32 },

    #[error("final score present on an unfinished session")]
    PrematureFinalScore,
}

//
// ─── SET RESULT ────────────────────────────────────────────────────────────────
//

/// Outcome of one completed question set. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetResult {
    pub set_number: u32,
    pub difficulty: DifficultyLevel,
    /// Marks-weighted raw score, 0-100.
    pub score: f64,
    pub correctness_pct: f64,
    pub completion_secs: f64,
    pub avg_secs_per_question: f64,
    pub is_fast: bool,
    pub total_questions: u32,
    pub correct_answers: u32,
}

/// Record of a difficulty change between two sets. Emitted only when the
/// level actually moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyAdjustment {
    /// The set whose result triggered the change.
    pub from_set: u32,
    pub from_level: DifficultyLevel,
    pub to_level: DifficultyLevel,
    pub reason: String,
}

impl DifficultyAdjustment {
    /// True when the adjustment moved the learner up the ladder.
    #[must_use]
    pub fn is_raise(&self) -> bool {
        self.to_level > self.from_level
    }
}

//
// ─── SESSION SUMMARY ───────────────────────────────────────────────────────────
//

/// Aggregate view over a session's completed sets.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub sets_completed: u32,
    pub average_score: f64,
    pub total_time_secs: f64,
    pub average_time_per_set: f64,
    pub difficulty_changes: u32,
}

//
// ─── ADAPTIVE SESSION ──────────────────────────────────────────────────────────
//

/// One learner's run through a fixed number of question sets for one topic.
///
/// The session is a forward-only state machine: `current_set` walks from 1 to
/// `total_sets` and the session is complete exactly when it exceeds
/// `total_sets`. Results and adjustments are append-only; mutation happens
/// only through [`AdaptiveSession::record_set`] and
/// [`AdaptiveSession::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveSession {
    id: SessionId,
    learner_id: LearnerId,
    topic_id: TopicId,
    initial_difficulty: DifficultyLevel,
    current_difficulty: DifficultyLevel,
    total_sets: u32,
    current_set: u32,
    set_results: Vec<SetResult>,
    difficulty_adjustments: Vec<DifficultyAdjustment>,
    final_proficiency: Option<f64>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl AdaptiveSession {
    /// Creates a session at set 1 with empty result and adjustment sequences.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTotalSets` if `total_sets` is zero.
    pub fn new(
        id: SessionId,
        learner_id: LearnerId,
        topic_id: TopicId,
        initial_difficulty: DifficultyLevel,
        total_sets: u32,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if total_sets == 0 {
            return Err(SessionError::InvalidTotalSets);
        }

        Ok(Self {
            id,
            learner_id,
            topic_id,
            initial_difficulty,
            current_difficulty: initial_difficulty,
            total_sets,
            current_set: 1,
            set_results: Vec::new(),
            difficulty_adjustments: Vec::new(),
            final_proficiency: None,
            started_at,
            ended_at: None,
        })
    }

    /// Rehydrates a session from persisted storage, re-checking invariants.
    ///
    /// # Errors
    ///
    /// Returns `SetOutOfRange` when `current_set` is not in
    /// `1..=total_sets + 1`, `CountMismatch` when the result count disagrees
    /// with `current_set`, and `PrematureFinalScore` when a final score is
    /// stored for a session that still has sets remaining.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        learner_id: LearnerId,
        topic_id: TopicId,
        initial_difficulty: DifficultyLevel,
        current_difficulty: DifficultyLevel,
        total_sets: u32,
        current_set: u32,
        set_results: Vec<SetResult>,
        difficulty_adjustments: Vec<DifficultyAdjustment>,
        final_proficiency: Option<f64>,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionError> {
        if total_sets == 0 {
            return Err(SessionError::InvalidTotalSets);
        }
        if current_set == 0 || current_set > total_sets + 1 {
            return Err(SessionError::SetOutOfRange {
                current_set,
                total_sets,
            });
        }
        if set_results.len() != (current_set - 1) as usize {
            return Err(SessionError::CountMismatch {
                results: set_results.len(),
                current_set,
            });
        }
        if final_proficiency.is_some() && current_set <= total_sets {
            return Err(SessionError::PrematureFinalScore);
        }

        Ok(Self {
            id,
            learner_id,
            topic_id,
            initial_difficulty,
            current_difficulty,
            total_sets,
            current_set,
            set_results,
            difficulty_adjustments,
            final_proficiency,
            started_at,
            ended_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn initial_difficulty(&self) -> DifficultyLevel {
        self.initial_difficulty
    }

    #[must_use]
    pub fn current_difficulty(&self) -> DifficultyLevel {
        self.current_difficulty
    }

    #[must_use]
    pub fn total_sets(&self) -> u32 {
        self.total_sets
    }

    /// 1-based index of the set the learner is on; `total_sets + 1` once the
    /// session is complete.
    #[must_use]
    pub fn current_set(&self) -> u32 {
        self.current_set
    }

    #[must_use]
    pub fn set_results(&self) -> &[SetResult] {
        &self.set_results
    }

    #[must_use]
    pub fn difficulty_adjustments(&self) -> &[DifficultyAdjustment] {
        &self.difficulty_adjustments
    }

    #[must_use]
    pub fn final_proficiency(&self) -> Option<f64> {
        self.final_proficiency
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Complete iff every set has been submitted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_set > self.total_sets
    }

    /// Records the outcome of the current set and advances the session.
    ///
    /// Appends a [`DifficultyAdjustment`] only when `next_difficulty` differs
    /// from the level the set was played at.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted` once all sets are submitted
    /// and `SessionError::SetNumberMismatch` when the result does not belong
    /// to the current set.
    pub fn record_set(
        &mut self,
        result: SetResult,
        next_difficulty: DifficultyLevel,
        reason: impl Into<String>,
    ) -> Result<(), SessionError> {
        if self.is_complete() {
            return Err(SessionError::AlreadyCompleted);
        }
        if result.set_number != self.current_set {
            return Err(SessionError::SetNumberMismatch {
                provided: result.set_number,
                expected: self.current_set,
            });
        }

        if next_difficulty != self.current_difficulty {
            self.difficulty_adjustments.push(DifficultyAdjustment {
                from_set: self.current_set,
                from_level: self.current_difficulty,
                to_level: next_difficulty,
                reason: reason.into(),
            });
        }

        self.set_results.push(result);
        self.current_set += 1;
        self.current_difficulty = next_difficulty;
        Ok(())
    }

    /// Computes and stores the final proficiency score and the end timestamp.
    ///
    /// Idempotent: a second call returns the already-stored score without
    /// touching the end timestamp.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` while sets remain.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<f64, SessionError> {
        if !self.is_complete() {
            return Err(SessionError::NotFinished);
        }
        if let Some(score) = self.final_proficiency {
            return Ok(score);
        }

        let score = crate::proficiency::final_score(self);
        self.final_proficiency = Some(score);
        self.ended_at = Some(now);
        Ok(score)
    }

    /// Aggregate view over the sets submitted so far.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        let sets = self.set_results.len();
        let total_score: f64 = self.set_results.iter().map(|s| s.score).sum();
        let total_time: f64 = self.set_results.iter().map(|s| s.completion_secs).sum();
        let divisor = if sets == 0 { 1.0 } else { sets as f64 };

        SessionSummary {
            sets_completed: sets as u32,
            average_score: total_score / divisor,
            total_time_secs: total_time,
            average_time_per_set: total_time / divisor,
            difficulty_changes: self.difficulty_adjustments.len() as u32,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
