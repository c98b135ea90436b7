use async_trait::async_trait;

use quiz_core::model::{AttemptId, LearnerId, QuestionId, SetId, TopicId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64};
use crate::repository::{AttemptRepository, StorageError};

#[async_trait]
impl AttemptRepository for SqliteRepository {
    async fn create_attempt(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
        set_id: SetId,
        total_marks: u32,
    ) -> Result<AttemptId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO quiz_attempts (learner_id, topic_id, set_id, total_marks)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("topic_id", topic_id.value())?)
        .bind(id_i64("set_id", set_id.value())?)
        .bind(i64::from(total_marks))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let raw = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("negative attempt rowid".into()))?;
        Ok(AttemptId::new(raw))
    }

    async fn record_response(
        &self,
        attempt_id: AttemptId,
        question_id: QuestionId,
        selected_option: &str,
        is_correct: bool,
        time_secs: u32,
    ) -> Result<(), StorageError> {
        let exists = sqlx::query("SELECT 1 FROM quiz_attempts WHERE id = ?1")
            .bind(id_i64("attempt_id", attempt_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
                INSERT INTO attempt_responses (
                    attempt_id, question_id, selected_option, is_correct, time_secs
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("attempt_id", attempt_id.value())?)
        .bind(id_i64("question_id", question_id.value())?)
        .bind(selected_option)
        .bind(is_correct)
        .bind(i64::from(time_secs))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn finalize_attempt(
        &self,
        attempt_id: AttemptId,
        score: f64,
        time_secs: u32,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE quiz_attempts
                SET score = ?2, time_secs = ?3
                WHERE id = ?1
            ",
        )
        .bind(id_i64("attempt_id", attempt_id.value())?)
        .bind(score)
        .bind(i64::from(time_secs))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
