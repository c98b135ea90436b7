use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{
    AdaptiveSession, DifficultyLevel, LadderProfile, LearnerId, ProficiencyTrend, Question,
    QuestionId, SessionId, SetResult, TopicId, is_fast_completion,
};
use storage::repository::{
    AttemptRepository, QuestionBankRepository, SessionRepository, Storage, StorageError,
    TrendRepository, VersionedSession,
};

use super::prepare::{
    GradedSet, PreparedQuestion, PreparedSet, SECS_PER_QUESTION_LIMIT, draw_questions,
    grade_submission,
};
use super::progress::{
    FinalResults, SessionProgress, SessionStatus, StartedSession, SubmitOutcome,
};
use crate::error::AdaptiveSessionError;

/// Orchestrates adaptive sessions: set preparation, grading, difficulty
/// transitions, finalization, and trend bookkeeping.
///
/// All collaborators are injected; the service holds no global state.
#[derive(Clone)]
pub struct AdaptiveSessionService {
    clock: Clock,
    bank: Arc<dyn QuestionBankRepository>,
    attempts: Arc<dyn AttemptRepository>,
    sessions: Arc<dyn SessionRepository>,
    trends: Arc<dyn TrendRepository>,
    profile: LadderProfile,
}

impl AdaptiveSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: Arc<dyn QuestionBankRepository>,
        attempts: Arc<dyn AttemptRepository>,
        sessions: Arc<dyn SessionRepository>,
        trends: Arc<dyn TrendRepository>,
    ) -> Self {
        Self {
            clock,
            bank,
            attempts,
            sessions,
            trends,
            profile: LadderProfile::STANDARD,
        }
    }

    /// Convenience constructor over a [`Storage`] aggregate.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            storage.bank.clone(),
            storage.attempts.clone(),
            storage.sessions.clone(),
            storage.trends.clone(),
        )
    }

    /// Override the ladder thresholds (e.g. [`LadderProfile::LENIENT`]).
    #[must_use]
    pub fn with_profile(mut self, profile: LadderProfile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn profile(&self) -> LadderProfile {
        self.profile
    }

    /// Starts a new adaptive session and issues its first question set.
    ///
    /// The first set is resolved before the session is persisted, so a topic
    /// without question sets leaves no session behind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTotalSets` for a zero set count, `NoQuestionSets` /
    /// `NoQuestions` when the topic cannot produce a set, and `Storage` on
    /// persistence failures.
    pub async fn start_session(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
        initial_difficulty: DifficultyLevel,
        total_sets: u32,
    ) -> Result<StartedSession, AdaptiveSessionError> {
        if total_sets == 0 {
            return Err(AdaptiveSessionError::InvalidTotalSets);
        }

        let session = AdaptiveSession::new(
            SessionId::generate(),
            learner_id,
            topic_id,
            initial_difficulty,
            total_sets,
            self.clock.now(),
        )?;

        let first_set = self
            .prepare_set(learner_id, topic_id, initial_difficulty, 1)
            .await?;
        self.sessions.insert_session(&session).await?;

        Ok(StartedSession {
            session_id: session.id(),
            topic_id,
            initial_difficulty,
            current_difficulty: initial_difficulty,
            total_sets,
            first_set,
        })
    }

    /// Grades a submitted set, advances the session, and either issues the
    /// next set or finalizes the session.
    ///
    /// The session row is updated under an optimistic version check before
    /// the score recorder is touched, so a losing concurrent submission
    /// leaves no partial writes. The trend update after completion is
    /// best-effort: failures are logged and never unwind the completed
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` for an unknown id, `AlreadyCompleted` (via
    /// `Session`) for a finished session, `UnknownQuestion` when the payload
    /// does not match the bank, `Concurrency` when another submission won
    /// the version race, and `Storage` on persistence failures.
    pub async fn submit_set(
        &self,
        session_id: SessionId,
        prepared: &PreparedSet,
        answers: &HashMap<QuestionId, String>,
        completion_secs: f64,
    ) -> Result<SubmitOutcome, AdaptiveSessionError> {
        let VersionedSession {
            mut session,
            version,
        } = self
            .sessions
            .get_session(session_id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => AdaptiveSessionError::UnknownSession,
                other => other.into(),
            })?;
        if session.is_complete() {
            return Err(quiz_core::model::SessionError::AlreadyCompleted.into());
        }

        let bank_questions = self.bank.list_questions(prepared.set_id).await?;
        let graded = grade_submission(prepared, &bank_questions, answers)?;

        let total_questions = prepared.questions.len() as u32;
        let score = if prepared.total_marks == 0 {
            0.0
        } else {
            f64::from(graded.earned_marks) / f64::from(prepared.total_marks) * 100.0
        };
        let correctness_pct =
            f64::from(graded.correct_answers) / f64::from(total_questions) * 100.0;
        let avg_secs_per_question = completion_secs / f64::from(total_questions);
        let is_fast = is_fast_completion(avg_secs_per_question);

        let set_result = SetResult {
            set_number: prepared.set_number,
            difficulty: session.current_difficulty(),
            score,
            correctness_pct,
            completion_secs,
            avg_secs_per_question,
            is_fast,
            total_questions,
            correct_answers: graded.correct_answers,
        };

        let next_difficulty =
            self.profile
                .next(session.current_difficulty(), correctness_pct, is_fast);
        let reason = format!("Performance: {correctness_pct:.1}%, Fast: {is_fast}");

        let completed_set = session.current_set();
        session.record_set(set_result.clone(), next_difficulty, reason)?;

        if session.is_complete() {
            let final_proficiency = session.finalize(self.clock.now())?;
            self.persist_session(&session, version).await?;
            self.record_attempt(prepared, &graded, score, completion_secs)
                .await?;
            self.update_trend_best_effort(&session, final_proficiency)
                .await;

            let final_results = FinalResults {
                session_id: session.id(),
                final_proficiency,
                initial_difficulty: session.initial_difficulty(),
                final_difficulty: session.current_difficulty(),
                sets_completed: session.set_results().to_vec(),
                difficulty_adjustments: session.difficulty_adjustments().to_vec(),
                total_time_secs: total_time_secs(session.started_at(), session.ended_at()),
                summary: session.summary(),
            };
            Ok(SubmitOutcome::Complete {
                set_result,
                final_results,
            })
        } else {
            self.persist_session(&session, version).await?;
            self.record_attempt(prepared, &graded, score, completion_secs)
                .await?;

            let next_set = self
                .prepare_set(
                    session.learner_id(),
                    session.topic_id(),
                    next_difficulty,
                    session.current_set(),
                )
                .await?;
            Ok(SubmitOutcome::Continue {
                set_result,
                progress: SessionProgress {
                    completed_set,
                    next_set: session.current_set(),
                    total_sets: session.total_sets(),
                    next_difficulty,
                },
                next_set,
            })
        }
    }

    /// Read-only snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` for an unknown id.
    pub async fn session_status(
        &self,
        session_id: SessionId,
    ) -> Result<SessionStatus, AdaptiveSessionError> {
        let VersionedSession { session, .. } = self
            .sessions
            .get_session(session_id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => AdaptiveSessionError::UnknownSession,
                other => other.into(),
            })?;

        Ok(SessionStatus {
            session_id: session.id(),
            learner_id: session.learner_id(),
            topic_id: session.topic_id(),
            current_set: session.current_set(),
            total_sets: session.total_sets(),
            initial_difficulty: session.initial_difficulty(),
            current_difficulty: session.current_difficulty(),
            is_complete: session.is_complete(),
            final_proficiency: session.final_proficiency(),
            sets_completed: session.set_results().to_vec(),
            difficulty_adjustments: session.difficulty_adjustments().to_vec(),
        })
    }

    /// Suggests a starting difficulty from the learner's recent trend: the
    /// mean of the last three recorded scores maps to Hard (>= 80),
    /// Medium (>= 60), or Easy. New learners start Easy.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on trend-store failures.
    pub async fn recommend_difficulty(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<DifficultyLevel, AdaptiveSessionError> {
        let Some(trend) = self.trends.get_trend(learner_id, topic_id).await? else {
            return Ok(DifficultyLevel::Easy);
        };

        let history = trend.history();
        if history.is_empty() {
            return Ok(DifficultyLevel::Easy);
        }
        let recent = &history[history.len().saturating_sub(3)..];
        let avg = recent.iter().sum::<f64>() / recent.len() as f64;

        Ok(if avg >= 80.0 {
            DifficultyLevel::Hard
        } else if avg >= 60.0 {
            DifficultyLevel::Medium
        } else {
            DifficultyLevel::Easy
        })
    }

    /// Housekeeping sweep: deletes abandoned (incomplete) sessions started
    /// before `older_than`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on persistence failures.
    pub async fn purge_abandoned_sessions(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, AdaptiveSessionError> {
        Ok(self.sessions.delete_stale_sessions(older_than).await?)
    }

    async fn persist_session(
        &self,
        session: &AdaptiveSession,
        expected_version: i64,
    ) -> Result<(), AdaptiveSessionError> {
        self.sessions
            .update_session(session, expected_version)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => AdaptiveSessionError::Concurrency,
                StorageError::NotFound => AdaptiveSessionError::UnknownSession,
                other => other.into(),
            })
    }

    /// Resolves the set for `(topic, difficulty)`, falling back to any set
    /// of the topic rather than blocking the learner, draws questions, and
    /// opens the score-recorder attempt. The prepared set keeps the
    /// requested difficulty label even when the fallback set differs.
    async fn prepare_set(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
        difficulty: DifficultyLevel,
        set_number: u32,
    ) -> Result<PreparedSet, AdaptiveSessionError> {
        let set = match self.bank.find_set(topic_id, difficulty).await? {
            Some(set) => set,
            None => self
                .bank
                .find_any_set(topic_id)
                .await?
                .ok_or(AdaptiveSessionError::NoQuestionSets(topic_id))?,
        };

        let pool = self.bank.list_questions(set.id()).await?;
        let count = set.draw_count(pool.len());
        if count == 0 {
            return Err(AdaptiveSessionError::NoQuestions(set.id()));
        }

        let drawn = draw_questions(pool, count);
        let total_marks: u32 = drawn.iter().map(Question::marks_worth).sum();
        let attempt_id = self
            .attempts
            .create_attempt(learner_id, topic_id, set.id(), total_marks)
            .await?;

        Ok(PreparedSet {
            attempt_id,
            set_id: set.id(),
            set_number,
            difficulty,
            questions: drawn.into_iter().map(PreparedQuestion::from).collect(),
            total_marks,
            success_threshold: set.success_threshold(),
            time_limit_secs: SECS_PER_QUESTION_LIMIT * count as u32,
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn record_attempt(
        &self,
        prepared: &PreparedSet,
        graded: &GradedSet,
        score: f64,
        completion_secs: f64,
    ) -> Result<(), AdaptiveSessionError> {
        let total_secs = completion_secs.max(0.0) as u32;
        let per_question_secs = total_secs / prepared.questions.len().max(1) as u32;

        for response in &graded.responses {
            self.attempts
                .record_response(
                    prepared.attempt_id,
                    response.question_id,
                    &response.selected,
                    response.is_correct,
                    per_question_secs,
                )
                .await?;
        }
        self.attempts
            .finalize_attempt(prepared.attempt_id, score, total_secs)
            .await?;
        Ok(())
    }

    async fn update_trend_best_effort(&self, session: &AdaptiveSession, score: f64) {
        let learner_id = session.learner_id();
        let topic_id = session.topic_id();
        let now = self.clock.now();

        let result = async {
            let trend = match self.trends.get_trend(learner_id, topic_id).await? {
                Some(mut trend) => {
                    trend.record(score, now);
                    trend
                }
                None => ProficiencyTrend::first(learner_id, topic_id, score, now),
            };
            self.trends.upsert_trend(&trend).await
        }
        .await;

        if let Err(err) = result {
            log::warn!(
                "trend update failed for learner {learner_id} topic {topic_id}: {err}"
            );
        }
    }
}

fn total_time_secs(started_at: DateTime<Utc>, ended_at: Option<DateTime<Utc>>) -> f64 {
    ended_at
        .map(|end| (end - started_at).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
