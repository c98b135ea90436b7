use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use quiz_core::model::{LearnerId, ProficiencyTrend, TopicId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, ser};
use crate::repository::{StorageError, TrendRepository};

#[async_trait]
impl TrendRepository for SqliteRepository {
    async fn get_trend(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Option<ProficiencyTrend>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT history, last_updated
                FROM proficiency_trends
                WHERE learner_id = ?1 AND topic_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("topic_id", topic_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history: Vec<f64> =
            serde_json::from_str(&row.try_get::<String, _>("history").map_err(ser)?)
                .map_err(ser)?;
        let last_updated: DateTime<Utc> = row.try_get("last_updated").map_err(ser)?;

        Ok(Some(ProficiencyTrend::from_persisted(
            learner_id,
            topic_id,
            history,
            last_updated,
        )))
    }

    async fn upsert_trend(&self, trend: &ProficiencyTrend) -> Result<(), StorageError> {
        let history = serde_json::to_string(trend.history()).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO proficiency_trends (
                    learner_id, topic_id, history, proficiency_score, last_updated
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(learner_id, topic_id) DO UPDATE SET
                    history = excluded.history,
                    proficiency_score = excluded.proficiency_score,
                    last_updated = excluded.last_updated
            ",
        )
        .bind(id_i64("learner_id", trend.learner_id().value())?)
        .bind(id_i64("topic_id", trend.topic_id().value())?)
        .bind(history)
        .bind(trend.proficiency_score())
        .bind(trend.last_updated())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
