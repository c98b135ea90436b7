use thiserror::Error;

use crate::model::difficulty::DifficultyLevel;
use crate::model::ids::{QuestionId, SetId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question has no options")]
    NoOptions,

    #[error("correct option {correct:?} is not among the options")]
    CorrectOptionMissing { correct: String },

    #[error("min_questions ({min}) exceeds max_questions ({max})")]
    InvalidBounds { min: u32, max: u32 },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question, read-only from the engine's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    set_id: SetId,
    prompt: String,
    options: Vec<String>,
    correct_option: String,
    marks_worth: u32,
}

impl Question {
    /// Builds a question after validating its option list.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::NoOptions` for an empty option list and
    /// `QuestionError::CorrectOptionMissing` if the stored answer is not one
    /// of the options.
    pub fn new(
        id: QuestionId,
        set_id: SetId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_option: impl Into<String>,
        marks_worth: u32,
    ) -> Result<Self, QuestionError> {
        let correct_option = correct_option.into();
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        if !options.iter().any(|o| *o == correct_option) {
            return Err(QuestionError::CorrectOptionMissing {
                correct: correct_option,
            });
        }

        Ok(Self {
            id,
            set_id,
            prompt: prompt.into(),
            options,
            correct_option,
            marks_worth,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn set_id(&self) -> SetId {
        self.set_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> &str {
        &self.correct_option
    }

    #[must_use]
    pub fn marks_worth(&self) -> u32 {
        self.marks_worth
    }

    /// Exact-match grading; an unanswered question grades as incorrect.
    #[must_use]
    pub fn is_correct(&self, selected: &str) -> bool {
        selected == self.correct_option
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// A bounded pool of questions for one topic at one difficulty level.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    id: SetId,
    topic_id: TopicId,
    difficulty: DifficultyLevel,
    min_questions: u32,
    max_questions: u32,
    success_threshold: f64,
}

impl QuestionSet {
    /// Default pass mark carried on a set when none is configured.
    pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 80.0;

    /// Builds a set descriptor.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidBounds` if `min_questions` exceeds
    /// `max_questions`.
    pub fn new(
        id: SetId,
        topic_id: TopicId,
        difficulty: DifficultyLevel,
        min_questions: u32,
        max_questions: u32,
        success_threshold: f64,
    ) -> Result<Self, QuestionError> {
        if min_questions > max_questions {
            return Err(QuestionError::InvalidBounds {
                min: min_questions,
                max: max_questions,
            });
        }

        Ok(Self {
            id,
            topic_id,
            difficulty,
            min_questions,
            max_questions,
            success_threshold,
        })
    }

    #[must_use]
    pub fn id(&self) -> SetId {
        self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn difficulty(&self) -> DifficultyLevel {
        self.difficulty
    }

    #[must_use]
    pub fn min_questions(&self) -> u32 {
        self.min_questions
    }

    #[must_use]
    pub fn max_questions(&self) -> u32 {
        self.max_questions
    }

    #[must_use]
    pub fn success_threshold(&self) -> f64 {
        self.success_threshold
    }

    /// Number of questions to draw from a pool of `available` questions:
    /// clamped into the configured bounds, saturating at `available` when
    /// the pool is smaller than `min_questions`.
    #[must_use]
    pub fn draw_count(&self, available: usize) -> usize {
        let capped = available.min(self.max_questions as usize);
        capped.max(self.min_questions as usize).min(available)
    }
}
