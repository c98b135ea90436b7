use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{
    AdaptiveSession, AttemptId, DifficultyLevel, LearnerId, ProficiencyTrend, Question,
    QuestionId, QuestionSet, SessionId, SetId, TopicId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// Optimistic-concurrency check failed: the stored record moved on
    /// since it was read.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A session together with the version its row carried when read.
///
/// Callers pass the version back to [`SessionRepository::update_session`]
/// so a concurrent writer is detected instead of silently overwritten.
#[derive(Debug, Clone)]
pub struct VersionedSession {
    pub session: AdaptiveSession,
    pub version: i64,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Read interface over the question bank, plus writers for seeding.
///
/// The bank is append-mostly and slow-changing; callers may memoize lookups
/// for the process lifetime.
#[async_trait]
pub trait QuestionBankRepository: Send + Sync {
    /// Persist or update a question set descriptor.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn upsert_set(&self, set: &QuestionSet) -> Result<(), StorageError>;

    /// Persist or update a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Fetch the set for an exact (topic, difficulty) pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a miss is `Ok(None)`.
    async fn find_set(
        &self,
        topic_id: TopicId,
        difficulty: DifficultyLevel,
    ) -> Result<Option<QuestionSet>, StorageError>;

    /// Fetch any set for the topic, regardless of difficulty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a miss is `Ok(None)`.
    async fn find_any_set(&self, topic_id: TopicId) -> Result<Option<QuestionSet>, StorageError>;

    /// List the full question pool of a set, in stable order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_questions(&self, set_id: SetId) -> Result<Vec<Question>, StorageError>;
}

/// Score-recorder write interface: one attempt per issued question set.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Open an attempt for a freshly issued set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be created.
    async fn create_attempt(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
        set_id: SetId,
        total_marks: u32,
    ) -> Result<AttemptId, StorageError>;

    /// Record one graded response on an open attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt.
    async fn record_response(
        &self,
        attempt_id: AttemptId,
        question_id: QuestionId,
        selected_option: &str,
        is_correct: bool,
        time_secs: u32,
    ) -> Result<(), StorageError>;

    /// Close an attempt with its final score and total time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt.
    async fn finalize_attempt(
        &self,
        attempt_id: AttemptId,
        score: f64,
        time_secs: u32,
    ) -> Result<(), StorageError>;
}

/// Persistence for adaptive sessions, with optimistic versioning.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a freshly started session at version 1.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists.
    async fn insert_session(&self, session: &AdaptiveSession) -> Result<(), StorageError>;

    /// Fetch a session and its current version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_session(&self, id: SessionId) -> Result<VersionedSession, StorageError>;

    /// Persist a mutated session if the stored version still matches.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the version moved,
    /// `StorageError::NotFound` when the session vanished.
    async fn update_session(
        &self,
        session: &AdaptiveSession,
        expected_version: i64,
    ) -> Result<(), StorageError>;

    /// Delete incomplete sessions started before the cutoff; returns the
    /// number removed. Completed sessions are kept for trend history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_stale_sessions(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<u64, StorageError>;
}

/// Persistence for per-(learner, topic) proficiency trends.
#[async_trait]
pub trait TrendRepository: Send + Sync {
    /// Fetch the trend for a pair, if one exists yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a miss is `Ok(None)`.
    async fn get_trend(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Option<ProficiencyTrend>, StorageError>;

    /// Persist or replace the trend for its (learner, topic) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the trend cannot be stored.
    async fn upsert_trend(&self, trend: &ProficiencyTrend) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

/// One recorded response inside an in-memory attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub question_id: QuestionId,
    pub selected_option: String,
    pub is_correct: bool,
    pub time_secs: u32,
}

/// In-memory shape of a score-recorder attempt, exposed for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    pub set_id: SetId,
    pub total_marks: u32,
    pub responses: Vec<ResponseRecord>,
    pub score: Option<f64>,
    pub time_secs: Option<u32>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sets: Arc<Mutex<HashMap<SetId, QuestionSet>>>,
    questions: Arc<Mutex<HashMap<SetId, Vec<Question>>>>,
    sessions: Arc<Mutex<HashMap<SessionId, (AdaptiveSession, i64)>>>,
    attempts: Arc<Mutex<HashMap<AttemptId, AttemptRecord>>>,
    next_attempt: Arc<Mutex<u64>>,
    trends: Arc<Mutex<HashMap<(LearnerId, TopicId), ProficiencyTrend>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: a snapshot of a recorded attempt.
    #[must_use]
    pub fn attempt(&self, id: AttemptId) -> Option<AttemptRecord> {
        self.attempts.lock().ok()?.get(&id).cloned()
    }

    fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StorageError> {
        mutex
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuestionBankRepository for InMemoryRepository {
    async fn upsert_set(&self, set: &QuestionSet) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.sets)?;
        guard.insert(set.id(), set.clone());
        Ok(())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.questions)?;
        let pool = guard.entry(question.set_id()).or_default();
        if let Some(existing) = pool.iter_mut().find(|q| q.id() == question.id()) {
            *existing = question.clone();
        } else {
            pool.push(question.clone());
        }
        Ok(())
    }

    async fn find_set(
        &self,
        topic_id: TopicId,
        difficulty: DifficultyLevel,
    ) -> Result<Option<QuestionSet>, StorageError> {
        let guard = Self::lock(&self.sets)?;
        Ok(guard
            .values()
            .filter(|s| s.topic_id() == topic_id && s.difficulty() == difficulty)
            .min_by_key(|s| s.id())
            .cloned())
    }

    async fn find_any_set(&self, topic_id: TopicId) -> Result<Option<QuestionSet>, StorageError> {
        let guard = Self::lock(&self.sets)?;
        Ok(guard
            .values()
            .filter(|s| s.topic_id() == topic_id)
            .min_by_key(|s| s.id())
            .cloned())
    }

    async fn list_questions(&self, set_id: SetId) -> Result<Vec<Question>, StorageError> {
        let guard = Self::lock(&self.questions)?;
        Ok(guard.get(&set_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn create_attempt(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
        set_id: SetId,
        total_marks: u32,
    ) -> Result<AttemptId, StorageError> {
        let id = {
            let mut counter = Self::lock(&self.next_attempt)?;
            *counter += 1;
            AttemptId::new(*counter)
        };

        let mut guard = Self::lock(&self.attempts)?;
        guard.insert(
            id,
            AttemptRecord {
                id,
                learner_id,
                topic_id,
                set_id,
                total_marks,
                responses: Vec::new(),
                score: None,
                time_secs: None,
            },
        );
        Ok(id)
    }

    async fn record_response(
        &self,
        attempt_id: AttemptId,
        question_id: QuestionId,
        selected_option: &str,
        is_correct: bool,
        time_secs: u32,
    ) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.attempts)?;
        let attempt = guard.get_mut(&attempt_id).ok_or(StorageError::NotFound)?;
        attempt.responses.push(ResponseRecord {
            question_id,
            selected_option: selected_option.to_owned(),
            is_correct,
            time_secs,
        });
        Ok(())
    }

    async fn finalize_attempt(
        &self,
        attempt_id: AttemptId,
        score: f64,
        time_secs: u32,
    ) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.attempts)?;
        let attempt = guard.get_mut(&attempt_id).ok_or(StorageError::NotFound)?;
        attempt.score = Some(score);
        attempt.time_secs = Some(time_secs);
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &AdaptiveSession) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.sessions)?;
        if guard.contains_key(&session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(session.id(), (session.clone(), 1));
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<VersionedSession, StorageError> {
        let guard = Self::lock(&self.sessions)?;
        guard
            .get(&id)
            .map(|(session, version)| VersionedSession {
                session: session.clone(),
                version: *version,
            })
            .ok_or(StorageError::NotFound)
    }

    async fn update_session(
        &self,
        session: &AdaptiveSession,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.sessions)?;
        let entry = guard.get_mut(&session.id()).ok_or(StorageError::NotFound)?;
        if entry.1 != expected_version {
            return Err(StorageError::Conflict);
        }
        *entry = (session.clone(), expected_version + 1);
        Ok(())
    }

    async fn delete_stale_sessions(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let mut guard = Self::lock(&self.sessions)?;
        let before = guard.len();
        guard.retain(|_, (session, _)| {
            session.is_complete() || session.started_at() >= started_before
        });
        Ok((before - guard.len()) as u64)
    }
}

#[async_trait]
impl TrendRepository for InMemoryRepository {
    async fn get_trend(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Option<ProficiencyTrend>, StorageError> {
        let guard = Self::lock(&self.trends)?;
        Ok(guard.get(&(learner_id, topic_id)).cloned())
    }

    async fn upsert_trend(&self, trend: &ProficiencyTrend) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.trends)?;
        guard.insert((trend.learner_id(), trend.topic_id()), trend.clone());
        Ok(())
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Bundles the four repository handles behind trait objects so backends can
/// be swapped without touching the services layer.
#[derive(Clone)]
pub struct Storage {
    pub bank: Arc<dyn QuestionBankRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub trends: Arc<dyn TrendRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            bank: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            trends: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AdaptiveSession, DifficultyLevel, SetResult};
    use quiz_core::time::fixed_now;

    fn build_set(id: u64, topic: u64, difficulty: DifficultyLevel) -> QuestionSet {
        QuestionSet::new(SetId::new(id), TopicId::new(topic), difficulty, 1, 10, 80.0).unwrap()
    }

    fn build_question(id: u64, set: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            SetId::new(set),
            format!("Q{id}"),
            vec!["a".into(), "b".into()],
            "a",
            1,
        )
        .unwrap()
    }

    fn build_session(total_sets: u32) -> AdaptiveSession {
        AdaptiveSession::new(
            SessionId::generate(),
            LearnerId::new(1),
            TopicId::new(1),
            DifficultyLevel::Easy,
            total_sets,
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn bank_lookup_prefers_exact_then_falls_back() {
        let repo = InMemoryRepository::new();
        repo.upsert_set(&build_set(1, 1, DifficultyLevel::Hard))
            .await
            .unwrap();

        let exact = repo.find_set(TopicId::new(1), DifficultyLevel::Easy).await.unwrap();
        assert!(exact.is_none());

        let any = repo.find_any_set(TopicId::new(1)).await.unwrap().unwrap();
        assert_eq!(any.difficulty(), DifficultyLevel::Hard);

        assert!(repo.find_any_set(TopicId::new(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn questions_round_trip() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(&build_question(1, 5)).await.unwrap();
        repo.upsert_question(&build_question(2, 5)).await.unwrap();

        let pool = repo.list_questions(SetId::new(5)).await.unwrap();
        assert_eq!(pool.len(), 2);
        assert!(repo.list_questions(SetId::new(6)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn attempts_accumulate_responses() {
        let repo = InMemoryRepository::new();
        let id = repo
            .create_attempt(LearnerId::new(1), TopicId::new(1), SetId::new(1), 5)
            .await
            .unwrap();

        repo.record_response(id, QuestionId::new(1), "a", true, 12)
            .await
            .unwrap();
        repo.finalize_attempt(id, 100.0, 60).await.unwrap();

        let attempt = repo.attempt(id).unwrap();
        assert_eq!(attempt.responses.len(), 1);
        assert_eq!(attempt.score, Some(100.0));

        let err = repo
            .record_response(AttemptId::new(99), QuestionId::new(1), "a", true, 12)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn session_update_detects_version_conflict() {
        let repo = InMemoryRepository::new();
        let mut session = build_session(2);
        repo.insert_session(&session).await.unwrap();

        let loaded = repo.get_session(session.id()).await.unwrap();
        assert_eq!(loaded.version, 1);

        session
            .record_set(
                SetResult {
                    set_number: 1,
                    difficulty: DifficultyLevel::Easy,
                    score: 80.0,
                    correctness_pct: 80.0,
                    completion_secs: 50.0,
                    avg_secs_per_question: 10.0,
                    is_fast: true,
                    total_questions: 5,
                    correct_answers: 4,
                },
                DifficultyLevel::Medium,
                "up",
            )
            .unwrap();

        repo.update_session(&session, 1).await.unwrap();
        assert_eq!(repo.get_session(session.id()).await.unwrap().version, 2);

        // stale version loses
        let err = repo.update_session(&session, 1).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn insert_twice_conflicts() {
        let repo = InMemoryRepository::new();
        let session = build_session(1);
        repo.insert_session(&session).await.unwrap();
        let err = repo.insert_session(&session).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn stale_sweep_spares_completed_and_recent_sessions() {
        let repo = InMemoryRepository::new();

        let old_active = AdaptiveSession::new(
            SessionId::generate(),
            LearnerId::new(1),
            TopicId::new(1),
            DifficultyLevel::Easy,
            1,
            fixed_now() - chrono::Duration::days(30),
        )
        .unwrap();
        let recent_active = build_session(1);
        repo.insert_session(&old_active).await.unwrap();
        repo.insert_session(&recent_active).await.unwrap();

        let removed = repo
            .delete_stale_sessions(fixed_now() - chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(matches!(
            repo.get_session(old_active.id()).await.unwrap_err(),
            StorageError::NotFound
        ));
        assert!(repo.get_session(recent_active.id()).await.is_ok());
    }

    #[tokio::test]
    async fn trends_round_trip() {
        let repo = InMemoryRepository::new();
        assert!(repo
            .get_trend(LearnerId::new(1), TopicId::new(1))
            .await
            .unwrap()
            .is_none());

        let trend =
            ProficiencyTrend::first(LearnerId::new(1), TopicId::new(1), 70.0, fixed_now());
        repo.upsert_trend(&trend).await.unwrap();

        let loaded = repo
            .get_trend(LearnerId::new(1), TopicId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, trend);
    }
}
