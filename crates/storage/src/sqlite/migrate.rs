use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema: question bank, quiz attempts with responses,
/// adaptive sessions with structured child rows, proficiency trends, and
/// indexes.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_sets (
                    id INTEGER PRIMARY KEY,
                    topic_id INTEGER NOT NULL,
                    difficulty TEXT NOT NULL,
                    min_questions INTEGER NOT NULL CHECK (min_questions >= 0),
                    max_questions INTEGER NOT NULL CHECK (max_questions >= min_questions),
                    success_threshold REAL NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    set_id INTEGER NOT NULL,
                    prompt TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_option TEXT NOT NULL,
                    marks_worth INTEGER NOT NULL CHECK (marks_worth >= 0),
                    FOREIGN KEY (set_id) REFERENCES question_sets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_attempts (
                    id INTEGER PRIMARY KEY,
                    learner_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    set_id INTEGER NOT NULL,
                    total_marks INTEGER NOT NULL CHECK (total_marks >= 0),
                    score REAL,
                    time_secs INTEGER
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS attempt_responses (
                    id INTEGER PRIMARY KEY,
                    attempt_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    selected_option TEXT NOT NULL,
                    is_correct INTEGER NOT NULL,
                    time_secs INTEGER NOT NULL CHECK (time_secs >= 0),
                    FOREIGN KEY (attempt_id) REFERENCES quiz_attempts(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS adaptive_sessions (
                    id TEXT PRIMARY KEY,
                    learner_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    initial_difficulty TEXT NOT NULL,
                    current_difficulty TEXT NOT NULL,
                    total_sets INTEGER NOT NULL CHECK (total_sets >= 1),
                    current_set INTEGER NOT NULL CHECK (current_set >= 1),
                    is_completed INTEGER NOT NULL,
                    final_proficiency REAL,
                    started_at TEXT NOT NULL,
                    ended_at TEXT,
                    version INTEGER NOT NULL DEFAULT 1
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_set_results (
                    session_id TEXT NOT NULL,
                    set_number INTEGER NOT NULL CHECK (set_number >= 1),
                    difficulty TEXT NOT NULL,
                    score REAL NOT NULL,
                    correctness_pct REAL NOT NULL,
                    completion_secs REAL NOT NULL,
                    avg_secs_per_question REAL NOT NULL,
                    is_fast INTEGER NOT NULL,
                    total_questions INTEGER NOT NULL,
                    correct_answers INTEGER NOT NULL,
                    PRIMARY KEY (session_id, set_number),
                    FOREIGN KEY (session_id) REFERENCES adaptive_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS difficulty_adjustments (
                    id INTEGER PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    from_set INTEGER NOT NULL,
                    from_level TEXT NOT NULL,
                    to_level TEXT NOT NULL,
                    reason TEXT NOT NULL,
                    FOREIGN KEY (session_id) REFERENCES adaptive_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS proficiency_trends (
                    learner_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    history TEXT NOT NULL,
                    proficiency_score REAL NOT NULL,
                    last_updated TEXT NOT NULL,
                    PRIMARY KEY (learner_id, topic_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_question_sets_topic
                    ON question_sets(topic_id, difficulty);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_set
                    ON questions(set_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_stale_sweep
                    ON adaptive_sessions(is_completed, started_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(1_i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    Ok(())
}
