use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use quiz_core::model::{DifficultyLevel, Question, QuestionSet, SetId, TopicId};
use storage::repository::{QuestionBankRepository, StorageError};

/// Read-through memoization over a question bank.
///
/// The bank is append-mostly and slow-changing, so cached entries live for
/// the process lifetime; there is no invalidation beyond [`Self::clear`].
/// Misses are cached too, so a topic without an exact-difficulty set keeps
/// resolving through the fallback path without re-querying.
///
/// Writes pass through to the inner repository without touching the cache;
/// a seeding process should run before readers, or call [`Self::clear`].
pub struct QuestionBankCache {
    inner: Arc<dyn QuestionBankRepository>,
    sets: Mutex<HashMap<(TopicId, DifficultyLevel), Option<QuestionSet>>>,
    any_sets: Mutex<HashMap<TopicId, Option<QuestionSet>>>,
    questions: Mutex<HashMap<SetId, Vec<Question>>>,
}

impl QuestionBankCache {
    #[must_use]
    pub fn new(inner: Arc<dyn QuestionBankRepository>) -> Self {
        Self {
            inner,
            sets: Mutex::new(HashMap::new()),
            any_sets: Mutex::new(HashMap::new()),
            questions: Mutex::new(HashMap::new()),
        }
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.sets.lock() {
            guard.clear();
        }
        if let Ok(mut guard) = self.any_sets.lock() {
            guard.clear();
        }
        if let Ok(mut guard) = self.questions.lock() {
            guard.clear();
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StorageError> {
        mutex
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuestionBankRepository for QuestionBankCache {
    async fn upsert_set(&self, set: &QuestionSet) -> Result<(), StorageError> {
        self.inner.upsert_set(set).await
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.inner.upsert_question(question).await
    }

    async fn find_set(
        &self,
        topic_id: TopicId,
        difficulty: DifficultyLevel,
    ) -> Result<Option<QuestionSet>, StorageError> {
        if let Some(cached) = Self::lock(&self.sets)?.get(&(topic_id, difficulty)) {
            return Ok(cached.clone());
        }

        let fetched = self.inner.find_set(topic_id, difficulty).await?;
        Self::lock(&self.sets)?.insert((topic_id, difficulty), fetched.clone());
        Ok(fetched)
    }

    async fn find_any_set(&self, topic_id: TopicId) -> Result<Option<QuestionSet>, StorageError> {
        if let Some(cached) = Self::lock(&self.any_sets)?.get(&topic_id) {
            return Ok(cached.clone());
        }

        let fetched = self.inner.find_any_set(topic_id).await?;
        Self::lock(&self.any_sets)?.insert(topic_id, fetched.clone());
        Ok(fetched)
    }

    async fn list_questions(&self, set_id: SetId) -> Result<Vec<Question>, StorageError> {
        if let Some(cached) = Self::lock(&self.questions)?.get(&set_id) {
            return Ok(cached.clone());
        }

        let fetched = self.inner.list_questions(set_id).await?;
        Self::lock(&self.questions)?.insert(set_id, fetched.clone());
        Ok(fetched)
    }
}
