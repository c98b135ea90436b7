use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, Transaction};

use quiz_core::model::{AdaptiveSession, DifficultyAdjustment, SessionId, SetResult};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, parse_difficulty, parse_session_id, ser, u32_from_i64};
use crate::repository::{SessionRepository, StorageError, VersionedSession};

fn map_set_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<SetResult, StorageError> {
    Ok(SetResult {
        set_number: u32_from_i64("set_number", row.try_get::<i64, _>("set_number").map_err(ser)?)?,
        difficulty: parse_difficulty(&row.try_get::<String, _>("difficulty").map_err(ser)?)?,
        score: row.try_get("score").map_err(ser)?,
        correctness_pct: row.try_get("correctness_pct").map_err(ser)?,
        completion_secs: row.try_get("completion_secs").map_err(ser)?,
        avg_secs_per_question: row.try_get("avg_secs_per_question").map_err(ser)?,
        is_fast: row.try_get("is_fast").map_err(ser)?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        correct_answers: u32_from_i64(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
    })
}

fn map_adjustment_row(row: &sqlx::sqlite::SqliteRow) -> Result<DifficultyAdjustment, StorageError> {
    Ok(DifficultyAdjustment {
        from_set: u32_from_i64("from_set", row.try_get::<i64, _>("from_set").map_err(ser)?)?,
        from_level: parse_difficulty(&row.try_get::<String, _>("from_level").map_err(ser)?)?,
        to_level: parse_difficulty(&row.try_get::<String, _>("to_level").map_err(ser)?)?,
        reason: row.try_get("reason").map_err(ser)?,
    })
}

async fn replace_children(
    tx: &mut Transaction<'_, Sqlite>,
    session: &AdaptiveSession,
) -> Result<(), StorageError> {
    let session_id = session.id().to_string();

    sqlx::query("DELETE FROM session_set_results WHERE session_id = ?1")
        .bind(&session_id)
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    sqlx::query("DELETE FROM difficulty_adjustments WHERE session_id = ?1")
        .bind(&session_id)
        .execute(&mut **tx)
        .await
        .map_err(conn)?;

    for result in session.set_results() {
        sqlx::query(
            r"
                INSERT INTO session_set_results (
                    session_id, set_number, difficulty, score, correctness_pct,
                    completion_secs, avg_secs_per_question, is_fast,
                    total_questions, correct_answers
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(&session_id)
        .bind(i64::from(result.set_number))
        .bind(result.difficulty.as_str())
        .bind(result.score)
        .bind(result.correctness_pct)
        .bind(result.completion_secs)
        .bind(result.avg_secs_per_question)
        .bind(result.is_fast)
        .bind(i64::from(result.total_questions))
        .bind(i64::from(result.correct_answers))
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    }

    for adjustment in session.difficulty_adjustments() {
        sqlx::query(
            r"
                INSERT INTO difficulty_adjustments (
                    session_id, from_set, from_level, to_level, reason
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&session_id)
        .bind(i64::from(adjustment.from_set))
        .bind(adjustment.from_level.as_str())
        .bind(adjustment.to_level.as_str())
        .bind(&adjustment.reason)
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    }

    Ok(())
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &AdaptiveSession) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT OR IGNORE INTO adaptive_sessions (
                    id, learner_id, topic_id, initial_difficulty, current_difficulty,
                    total_sets, current_set, is_completed, final_proficiency,
                    started_at, ended_at, version
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1)
            ",
        )
        .bind(session.id().to_string())
        .bind(id_i64("learner_id", session.learner_id().value())?)
        .bind(id_i64("topic_id", session.topic_id().value())?)
        .bind(session.initial_difficulty().as_str())
        .bind(session.current_difficulty().as_str())
        .bind(i64::from(session.total_sets()))
        .bind(i64::from(session.current_set()))
        .bind(session.is_complete())
        .bind(session.final_proficiency())
        .bind(session.started_at())
        .bind(session.ended_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        replace_children(&mut tx, session).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<VersionedSession, StorageError> {
        let session_id = id.to_string();

        let row = sqlx::query(
            r"
                SELECT id, learner_id, topic_id, initial_difficulty, current_difficulty,
                       total_sets, current_set, final_proficiency, started_at, ended_at, version
                FROM adaptive_sessions
                WHERE id = ?1
            ",
        )
        .bind(&session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let result_rows = sqlx::query(
            r"
                SELECT set_number, difficulty, score, correctness_pct, completion_secs,
                       avg_secs_per_question, is_fast, total_questions, correct_answers
                FROM session_set_results
                WHERE session_id = ?1
                ORDER BY set_number
            ",
        )
        .bind(&session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let adjustment_rows = sqlx::query(
            r"
                SELECT from_set, from_level, to_level, reason
                FROM difficulty_adjustments
                WHERE session_id = ?1
                ORDER BY id
            ",
        )
        .bind(&session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let set_results = result_rows
            .iter()
            .map(map_set_result_row)
            .collect::<Result<Vec<_>, _>>()?;
        let adjustments = adjustment_rows
            .iter()
            .map(map_adjustment_row)
            .collect::<Result<Vec<_>, _>>()?;

        let learner_id =
            super::mapping::learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?;
        let topic_id =
            super::mapping::topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?;
        let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;
        let ended_at: Option<DateTime<Utc>> = row.try_get("ended_at").map_err(ser)?;

        let session = AdaptiveSession::from_persisted(
            parse_session_id(&row.try_get::<String, _>("id").map_err(ser)?)?,
            learner_id,
            topic_id,
            parse_difficulty(&row.try_get::<String, _>("initial_difficulty").map_err(ser)?)?,
            parse_difficulty(&row.try_get::<String, _>("current_difficulty").map_err(ser)?)?,
            u32_from_i64("total_sets", row.try_get::<i64, _>("total_sets").map_err(ser)?)?,
            u32_from_i64("current_set", row.try_get::<i64, _>("current_set").map_err(ser)?)?,
            set_results,
            adjustments,
            row.try_get("final_proficiency").map_err(ser)?,
            started_at,
            ended_at,
        )
        .map_err(ser)?;

        Ok(VersionedSession {
            session,
            version: row.try_get("version").map_err(ser)?,
        })
    }

    async fn update_session(
        &self,
        session: &AdaptiveSession,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let session_id = session.id().to_string();

        let res = sqlx::query(
            r"
                UPDATE adaptive_sessions
                SET current_difficulty = ?2,
                    current_set = ?3,
                    is_completed = ?4,
                    final_proficiency = ?5,
                    ended_at = ?6,
                    version = version + 1
                WHERE id = ?1 AND version = ?7
            ",
        )
        .bind(&session_id)
        .bind(session.current_difficulty().as_str())
        .bind(i64::from(session.current_set()))
        .bind(session.is_complete())
        .bind(session.final_proficiency())
        .bind(session.ended_at())
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM adaptive_sessions WHERE id = ?1")
                .bind(&session_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(conn)?;
            return Err(if exists.is_some() {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        replace_children(&mut tx, session).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn delete_stale_sessions(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let res = sqlx::query(
            r"
                DELETE FROM adaptive_sessions
                WHERE is_completed = 0 AND started_at < ?1
            ",
        )
        .bind(started_before)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected())
    }
}
