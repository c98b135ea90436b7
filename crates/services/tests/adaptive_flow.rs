use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::Clock;
use quiz_core::model::{
    DifficultyLevel, LearnerId, ProficiencyTrend, Question, QuestionId, QuestionSet, SetId,
    TopicId,
};
use quiz_core::time::fixed_now;
use services::{AdaptiveSessionService, PreparedSet, QuestionBankCache, SubmitOutcome};
use storage::repository::{
    InMemoryRepository, QuestionBankRepository, StorageError, TrendRepository,
};

async fn seed_set(
    repo: &InMemoryRepository,
    set_id: u64,
    topic: u64,
    difficulty: DifficultyLevel,
    questions: u64,
) {
    let set = QuestionSet::new(
        SetId::new(set_id),
        TopicId::new(topic),
        difficulty,
        1,
        10,
        80.0,
    )
    .unwrap();
    repo.upsert_set(&set).await.unwrap();

    for i in 1..=questions {
        let question = Question::new(
            QuestionId::new(set_id * 100 + i),
            SetId::new(set_id),
            format!("Q{i}"),
            vec!["a".into(), "b".into(), "c".into()],
            "a",
            1,
        )
        .unwrap();
        repo.upsert_question(&question).await.unwrap();
    }
}

fn service_over(repo: &InMemoryRepository) -> AdaptiveSessionService {
    AdaptiveSessionService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
}

fn answers_with_correct(prepared: &PreparedSet, correct: usize) -> HashMap<QuestionId, String> {
    prepared
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let choice = if i < correct { "a" } else { "b" };
            (q.id, choice.to_string())
        })
        .collect()
}

#[tokio::test]
async fn easy_start_promotes_to_medium_and_completes() {
    let repo = InMemoryRepository::new();
    seed_set(&repo, 1, 1, DifficultyLevel::Easy, 5).await;
    seed_set(&repo, 2, 1, DifficultyLevel::Medium, 5).await;
    let service = service_over(&repo);

    let started = service
        .start_session(LearnerId::new(1), TopicId::new(1), DifficultyLevel::Easy, 2)
        .await
        .unwrap();
    assert_eq!(started.first_set.questions.len(), 5);
    assert_eq!(started.first_set.time_limit_secs, 150);

    // all correct in 60 seconds: 12s per question, fast, 100% correct
    let outcome = service
        .submit_set(
            started.session_id,
            &started.first_set,
            &answers_with_correct(&started.first_set, 5),
            60.0,
        )
        .await
        .unwrap();

    let SubmitOutcome::Continue {
        set_result,
        progress,
        next_set,
    } = outcome
    else {
        panic!("first submission should continue the session");
    };
    assert_eq!(set_result.score, 100.0);
    assert!(set_result.is_fast);
    assert_eq!(progress.next_difficulty, DifficultyLevel::Medium);
    assert_eq!(next_set.set_id, SetId::new(2));
    assert_eq!(next_set.set_number, 2);

    let outcome = service
        .submit_set(
            started.session_id,
            &next_set,
            &answers_with_correct(&next_set, 5),
            60.0,
        )
        .await
        .unwrap();

    let SubmitOutcome::Complete {
        set_result,
        final_results,
    } = outcome
    else {
        panic!("second submission should complete the session");
    };
    assert_eq!(set_result.set_number, 2);

    // both sets scored 100 and both promoted: capped at 100
    assert_eq!(final_results.final_proficiency, 100.0);
    assert_eq!(final_results.initial_difficulty, DifficultyLevel::Easy);
    assert_eq!(final_results.final_difficulty, DifficultyLevel::Hard);
    assert_eq!(final_results.sets_completed.len(), 2);
    assert_eq!(final_results.difficulty_adjustments.len(), 2);
    assert_eq!(final_results.summary.sets_completed, 2);
    assert_eq!(final_results.summary.average_score, 100.0);

    let status = service.session_status(started.session_id).await.unwrap();
    assert!(status.is_complete);
    assert_eq!(status.final_proficiency, Some(100.0));

    let trend = repo
        .get_trend(LearnerId::new(1), TopicId::new(1))
        .await
        .unwrap()
        .expect("completion should create the trend record");
    assert_eq!(trend.history(), &[100.0]);

    // score recorder saw both attempts
    let first_attempt = repo.attempt(started.first_set.attempt_id).unwrap();
    assert_eq!(first_attempt.responses.len(), 5);
    assert_eq!(first_attempt.score, Some(100.0));
    assert_eq!(first_attempt.time_secs, Some(60));
}

#[tokio::test]
async fn session_with_three_sets_completes_exactly_on_the_third() {
    let repo = InMemoryRepository::new();
    seed_set(&repo, 1, 1, DifficultyLevel::Easy, 4).await;
    let service = service_over(&repo);

    let started = service
        .start_session(LearnerId::new(1), TopicId::new(1), DifficultyLevel::Easy, 3)
        .await
        .unwrap();

    let mut current = started.first_set;
    for round in 1..=3_u32 {
        // middling performance, slow: difficulty holds
        let outcome = service
            .submit_set(
                started.session_id,
                &current,
                &answers_with_correct(&current, 3),
                160.0,
            )
            .await
            .unwrap();

        match outcome {
            SubmitOutcome::Continue { next_set, .. } => {
                assert!(round < 3, "session completed too early");
                current = next_set;
            }
            SubmitOutcome::Complete { final_results, .. } => {
                assert_eq!(round, 3, "session completed on the wrong round");
                assert_eq!(final_results.sets_completed.len(), 3);
            }
        }
    }

    let status = service.session_status(started.session_id).await.unwrap();
    assert!(status.is_complete);
    assert_eq!(status.sets_completed.len(), 3);
}

#[tokio::test]
async fn fallback_topic_with_only_hard_set_still_serves_easy_request() {
    let repo = InMemoryRepository::new();
    seed_set(&repo, 9, 1, DifficultyLevel::Hard, 4).await;
    let service = service_over(&repo);

    let started = service
        .start_session(LearnerId::new(1), TopicId::new(1), DifficultyLevel::Easy, 1)
        .await
        .unwrap();

    // the Hard set's questions arrive under the requested Easy label
    assert_eq!(started.first_set.set_id, SetId::new(9));
    assert_eq!(started.initial_difficulty, DifficultyLevel::Easy);
    assert_eq!(started.first_set.difficulty, DifficultyLevel::Easy);
    assert_eq!(started.first_set.questions.len(), 4);
}

#[tokio::test]
async fn trend_window_holds_ten_most_recent_scores_in_order() {
    let repo = InMemoryRepository::new();
    seed_set(&repo, 1, 1, DifficultyLevel::Easy, 5).await;
    let service = service_over(&repo);
    let learner = LearnerId::new(1);
    let topic = TopicId::new(1);

    let mut expected = Vec::new();
    for round in 0..11_usize {
        let correct = round % 6;
        let started = service
            .start_session(learner, topic, DifficultyLevel::Easy, 1)
            .await
            .unwrap();
        // slow submission: no fast bonus path, final score equals the raw score
        let outcome = service
            .submit_set(
                started.session_id,
                &started.first_set,
                &answers_with_correct(&started.first_set, correct),
                200.0,
            )
            .await
            .unwrap();
        assert!(outcome.is_complete());
        expected.push(correct as f64 * 20.0);
    }

    let trend = repo.get_trend(learner, topic).await.unwrap().unwrap();
    assert_eq!(trend.history().len(), 10);
    assert_eq!(trend.history(), &expected[1..]);
}

/// Trend store that accepts reads but fails every write.
struct FailingTrendStore;

#[async_trait]
impl TrendRepository for FailingTrendStore {
    async fn get_trend(
        &self,
        _learner_id: LearnerId,
        _topic_id: TopicId,
    ) -> Result<Option<ProficiencyTrend>, StorageError> {
        Ok(None)
    }

    async fn upsert_trend(&self, _trend: &ProficiencyTrend) -> Result<(), StorageError> {
        Err(StorageError::Connection("trend store offline".into()))
    }
}

#[tokio::test]
async fn trend_store_failure_never_unwinds_a_completed_session() {
    let repo = InMemoryRepository::new();
    seed_set(&repo, 1, 1, DifficultyLevel::Easy, 4).await;

    let service = AdaptiveSessionService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(FailingTrendStore),
    );

    let started = service
        .start_session(LearnerId::new(1), TopicId::new(1), DifficultyLevel::Easy, 1)
        .await
        .unwrap();
    let outcome = service
        .submit_set(
            started.session_id,
            &started.first_set,
            &answers_with_correct(&started.first_set, 4),
            40.0,
        )
        .await
        .unwrap();

    // completion succeeded even though the trend write failed
    assert!(outcome.is_complete());
    let status = service.session_status(started.session_id).await.unwrap();
    assert!(status.is_complete);
    assert!(status.final_proficiency.is_some());
}

#[tokio::test]
async fn cached_bank_serves_repeat_sessions() {
    let repo = InMemoryRepository::new();
    seed_set(&repo, 1, 1, DifficultyLevel::Easy, 5).await;

    let cache = Arc::new(QuestionBankCache::new(Arc::new(repo.clone())));
    let service = AdaptiveSessionService::new(
        Clock::fixed(fixed_now()),
        cache.clone(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    for _ in 0..3 {
        let started = service
            .start_session(LearnerId::new(1), TopicId::new(1), DifficultyLevel::Easy, 1)
            .await
            .unwrap();
        let outcome = service
            .submit_set(
                started.session_id,
                &started.first_set,
                &answers_with_correct(&started.first_set, 5),
                60.0,
            )
            .await
            .unwrap();
        assert!(outcome.is_complete());
    }
}
