use std::str::FromStr;

use quiz_core::model::{
    DifficultyLevel, LearnerId, Question, QuestionId, QuestionSet, SessionId, SetId, TopicId,
};
use sqlx::Row;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn set_id_from_i64(v: i64) -> Result<SetId, StorageError> {
    Ok(SetId::new(i64_to_u64("set_id", v)?))
}

pub(crate) fn parse_difficulty(s: &str) -> Result<DifficultyLevel, StorageError> {
    DifficultyLevel::from_str(s).map_err(ser)
}

pub(crate) fn parse_session_id(s: &str) -> Result<SessionId, StorageError> {
    Uuid::parse_str(s).map(SessionId::new).map_err(ser)
}

pub(crate) fn map_set_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionSet, StorageError> {
    let id = set_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let topic_id = topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?;
    let difficulty = parse_difficulty(&row.try_get::<String, _>("difficulty").map_err(ser)?)?;
    let min_questions = u32_from_i64(
        "min_questions",
        row.try_get::<i64, _>("min_questions").map_err(ser)?,
    )?;
    let max_questions = u32_from_i64(
        "max_questions",
        row.try_get::<i64, _>("max_questions").map_err(ser)?,
    )?;
    let success_threshold: f64 = row.try_get("success_threshold").map_err(ser)?;

    QuestionSet::new(
        id,
        topic_id,
        difficulty,
        min_questions,
        max_questions,
        success_threshold,
    )
    .map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = QuestionId::new(i64_to_u64("question_id", row.try_get::<i64, _>("id").map_err(ser)?)?);
    let set_id = set_id_from_i64(row.try_get::<i64, _>("set_id").map_err(ser)?)?;
    let prompt: String = row.try_get("prompt").map_err(ser)?;
    let options: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("options").map_err(ser)?).map_err(ser)?;
    let correct_option: String = row.try_get("correct_option").map_err(ser)?;
    let marks_worth = u32_from_i64(
        "marks_worth",
        row.try_get::<i64, _>("marks_worth").map_err(ser)?,
    )?;

    Question::new(id, set_id, prompt, options, correct_option, marks_worth).map_err(ser)
}
