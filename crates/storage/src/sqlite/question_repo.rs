use async_trait::async_trait;

use quiz_core::model::{DifficultyLevel, Question, QuestionSet, SetId, TopicId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_question_row, map_set_row, ser};
use crate::repository::{QuestionBankRepository, StorageError};

#[async_trait]
impl QuestionBankRepository for SqliteRepository {
    async fn upsert_set(&self, set: &QuestionSet) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO question_sets (
                    id, topic_id, difficulty, min_questions, max_questions, success_threshold
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    topic_id = excluded.topic_id,
                    difficulty = excluded.difficulty,
                    min_questions = excluded.min_questions,
                    max_questions = excluded.max_questions,
                    success_threshold = excluded.success_threshold
            ",
        )
        .bind(id_i64("set_id", set.id().value())?)
        .bind(id_i64("topic_id", set.topic_id().value())?)
        .bind(set.difficulty().as_str())
        .bind(i64::from(set.min_questions()))
        .bind(i64::from(set.max_questions()))
        .bind(set.success_threshold())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let options = serde_json::to_string(question.options()).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO questions (
                    id, set_id, prompt, options, correct_option, marks_worth
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    set_id = excluded.set_id,
                    prompt = excluded.prompt,
                    options = excluded.options,
                    correct_option = excluded.correct_option,
                    marks_worth = excluded.marks_worth
            ",
        )
        .bind(id_i64("question_id", question.id().value())?)
        .bind(id_i64("set_id", question.set_id().value())?)
        .bind(question.prompt())
        .bind(options)
        .bind(question.correct_option())
        .bind(i64::from(question.marks_worth()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn find_set(
        &self,
        topic_id: TopicId,
        difficulty: DifficultyLevel,
    ) -> Result<Option<QuestionSet>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, topic_id, difficulty, min_questions, max_questions, success_threshold
                FROM question_sets
                WHERE topic_id = ?1 AND difficulty = ?2
                ORDER BY id
                LIMIT 1
            ",
        )
        .bind(id_i64("topic_id", topic_id.value())?)
        .bind(difficulty.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_set_row).transpose()
    }

    async fn find_any_set(&self, topic_id: TopicId) -> Result<Option<QuestionSet>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, topic_id, difficulty, min_questions, max_questions, success_threshold
                FROM question_sets
                WHERE topic_id = ?1
                ORDER BY id
                LIMIT 1
            ",
        )
        .bind(id_i64("topic_id", topic_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_set_row).transpose()
    }

    async fn list_questions(&self, set_id: SetId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, set_id, prompt, options, correct_option, marks_worth
                FROM questions
                WHERE set_id = ?1
                ORDER BY id
            ",
        )
        .bind(id_i64("set_id", set_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}
