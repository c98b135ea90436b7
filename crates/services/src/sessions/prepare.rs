use std::collections::HashMap;

use rand::rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use quiz_core::model::{AttemptId, DifficultyLevel, Question, QuestionId, SetId};

use crate::error::AdaptiveSessionError;

/// Time budget granted per question when a set is issued.
pub const SECS_PER_QUESTION_LIMIT: u32 = 30;

/// A question as handed to the learner: no correct answer included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedQuestion {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub marks_worth: u32,
}

impl From<Question> for PreparedQuestion {
    fn from(question: Question) -> Self {
        Self {
            id: question.id(),
            prompt: question.prompt().to_owned(),
            options: question.options().to_vec(),
            marks_worth: question.marks_worth(),
        }
    }
}

/// A drawn question set, issued to the learner and echoed back on submit.
///
/// `difficulty` is the level the set was *requested* at; when the bank fell
/// back to a set of a different level the mismatch is silent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedSet {
    pub attempt_id: AttemptId,
    pub set_id: SetId,
    pub set_number: u32,
    pub difficulty: DifficultyLevel,
    pub questions: Vec<PreparedQuestion>,
    pub total_marks: u32,
    pub success_threshold: f64,
    pub time_limit_secs: u32,
}

/// Uniformly random, non-repeating draw of `count` questions from the pool.
///
/// Unseeded by design; tests that need determinism assert on set membership
/// rather than order.
pub(crate) fn draw_questions(mut pool: Vec<Question>, count: usize) -> Vec<Question> {
    let mut rng = rng();
    pool.shuffle(&mut rng);
    pool.truncate(count);
    pool
}

/// One graded learner response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GradedResponse {
    pub question_id: QuestionId,
    pub selected: String,
    pub is_correct: bool,
}

/// Result of grading a full submission against the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GradedSet {
    pub earned_marks: u32,
    pub correct_answers: u32,
    pub responses: Vec<GradedResponse>,
}

/// Grades every question of the issued set by exact string match on the
/// selected option. An unanswered question counts as an empty (wrong)
/// selection; there is no partial credit.
pub(crate) fn grade_submission(
    prepared: &PreparedSet,
    bank_questions: &[Question],
    answers: &HashMap<QuestionId, String>,
) -> Result<GradedSet, AdaptiveSessionError> {
    if prepared.questions.is_empty() {
        return Err(AdaptiveSessionError::NoQuestions(prepared.set_id));
    }

    let by_id: HashMap<QuestionId, &Question> =
        bank_questions.iter().map(|q| (q.id(), q)).collect();

    let mut earned_marks = 0_u32;
    let mut correct_answers = 0_u32;
    let mut responses = Vec::with_capacity(prepared.questions.len());

    for issued in &prepared.questions {
        let question = by_id
            .get(&issued.id)
            .ok_or(AdaptiveSessionError::UnknownQuestion {
                question: issued.id,
                set: prepared.set_id,
            })?;

        let selected = answers.get(&issued.id).map(String::as_str).unwrap_or("");
        let is_correct = question.is_correct(selected);
        if is_correct {
            earned_marks += question.marks_worth();
            correct_answers += 1;
        }

        responses.push(GradedResponse {
            question_id: issued.id,
            selected: selected.to_owned(),
            is_correct,
        });
    }

    Ok(GradedSet {
        earned_marks,
        correct_answers,
        responses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::SetId;

    fn build_question(id: u64, correct: &str, marks: u32) -> Question {
        Question::new(
            QuestionId::new(id),
            SetId::new(1),
            format!("Q{id}"),
            vec!["a".into(), "b".into(), "c".into()],
            correct,
            marks,
        )
        .unwrap()
    }

    fn prepared_from(questions: &[Question]) -> PreparedSet {
        PreparedSet {
            attempt_id: AttemptId::new(1),
            set_id: SetId::new(1),
            set_number: 1,
            difficulty: DifficultyLevel::Easy,
            questions: questions.iter().cloned().map(PreparedQuestion::from).collect(),
            total_marks: questions.iter().map(Question::marks_worth).sum(),
            success_threshold: 80.0,
            time_limit_secs: SECS_PER_QUESTION_LIMIT * questions.len() as u32,
        }
    }

    #[test]
    fn draw_keeps_requested_count_without_repeats() {
        let pool: Vec<Question> = (1..=10).map(|i| build_question(i, "a", 1)).collect();
        let drawn = draw_questions(pool, 4);
        assert_eq!(drawn.len(), 4);

        let mut ids: Vec<u64> = drawn.iter().map(|q| q.id().value()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn draw_with_count_above_pool_returns_everything() {
        let pool: Vec<Question> = (1..=3).map(|i| build_question(i, "a", 1)).collect();
        assert_eq!(draw_questions(pool, 10).len(), 3);
    }

    #[test]
    fn grading_sums_marks_for_exact_matches_only() {
        let questions = vec![
            build_question(1, "a", 2),
            build_question(2, "b", 3),
            build_question(3, "c", 1),
        ];
        let prepared = prepared_from(&questions);

        let mut answers = HashMap::new();
        answers.insert(QuestionId::new(1), "a".to_string());
        answers.insert(QuestionId::new(2), "c".to_string());
        // question 3 left unanswered

        let graded = grade_submission(&prepared, &questions, &answers).unwrap();
        assert_eq!(graded.earned_marks, 2);
        assert_eq!(graded.correct_answers, 1);
        assert_eq!(graded.responses.len(), 3);
        assert!(graded.responses[0].is_correct);
        assert!(!graded.responses[1].is_correct);
        assert_eq!(graded.responses[2].selected, "");
        assert!(!graded.responses[2].is_correct);
    }

    #[test]
    fn grading_rejects_question_missing_from_bank() {
        let questions = vec![build_question(1, "a", 1)];
        let mut prepared = prepared_from(&questions);
        prepared.questions.push(PreparedQuestion {
            id: QuestionId::new(99),
            prompt: "ghost".into(),
            options: vec!["a".into()],
            marks_worth: 1,
        });

        let err = grade_submission(&prepared, &questions, &HashMap::new()).unwrap_err();
        assert!(matches!(
            err,
            AdaptiveSessionError::UnknownQuestion { question, .. } if question == QuestionId::new(99)
        ));
    }

    #[test]
    fn grading_rejects_empty_set() {
        let prepared = prepared_from(&[]);
        let err = grade_submission(&prepared, &[], &HashMap::new()).unwrap_err();
        assert!(matches!(err, AdaptiveSessionError::NoQuestions(_)));
    }
}
