use chrono::{DateTime, Utc};

use crate::model::ids::{LearnerId, TopicId};

/// Number of most-recent session scores retained per (learner, topic).
pub const TREND_WINDOW: usize = 10;

/// Rolling per-topic proficiency record for one learner.
///
/// Holds the most recent [`TREND_WINDOW`] final session scores (oldest
/// first) and a derived current proficiency: the plain mean of the retained
/// window. Unlike the recency-weighted average used *within* a session,
/// across sessions every run counts the same.
#[derive(Debug, Clone, PartialEq)]
pub struct ProficiencyTrend {
    learner_id: LearnerId,
    topic_id: TopicId,
    history: Vec<f64>,
    proficiency_score: f64,
    last_updated: DateTime<Utc>,
}

impl ProficiencyTrend {
    /// Creates the trend record for a learner's first completed session on a
    /// topic.
    #[must_use]
    pub fn first(
        learner_id: LearnerId,
        topic_id: TopicId,
        score: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            topic_id,
            history: vec![score],
            proficiency_score: score,
            last_updated: now,
        }
    }

    /// Rehydrates a trend from storage. An empty history yields a zero score
    /// regardless of the stored value.
    #[must_use]
    pub fn from_persisted(
        learner_id: LearnerId,
        topic_id: TopicId,
        mut history: Vec<f64>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        if history.len() > TREND_WINDOW {
            history.drain(..history.len() - TREND_WINDOW);
        }
        let proficiency_score = mean(&history);
        Self {
            learner_id,
            topic_id,
            history,
            proficiency_score,
            last_updated,
        }
    }

    /// Appends a completed session's final score, truncates the window, and
    /// recomputes the derived proficiency.
    pub fn record(&mut self, score: f64, now: DateTime<Utc>) {
        self.history.push(score);
        if self.history.len() > TREND_WINDOW {
            self.history.drain(..self.history.len() - TREND_WINDOW);
        }
        self.proficiency_score = mean(&self.history);
        self.last_updated = now;
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    /// Retained scores, oldest first.
    #[must_use]
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    #[must_use]
    pub fn proficiency_score(&self) -> f64 {
        self.proficiency_score
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
