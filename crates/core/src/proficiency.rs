//! Session finalization: collapses a completed session's per-set scores into
//! one 0-100 proficiency figure.

use crate::model::AdaptiveSession;

/// Linear step between consecutive set weights: the i-th completed set
/// (0-indexed) weighs `(i + 1) * 0.2`, so later sets count for more.
pub const SET_WEIGHT_STEP: f64 = 0.2;

/// Bonus added for each difficulty adjustment that moved the learner up the
/// ladder. Downward moves are not penalized.
pub const RAISE_BONUS: f64 = 5.0;

/// Recency-weighted average of the session's set scores plus the
/// difficulty-progression bonus, capped at 100.
///
/// With identical scores across all sets the weighted average is exactly
/// that score, so the bonus is the only thing that can lift the result.
#[must_use]
pub fn final_score(session: &AdaptiveSession) -> f64 {
    let sets = session.set_results();
    if sets.is_empty() {
        return 0.0;
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (i, set) in sets.iter().enumerate() {
        let weight = (i + 1) as f64 * SET_WEIGHT_STEP;
        weighted_sum += set.score * weight;
        weight_total += weight;
    }
    let weighted_average = weighted_sum / weight_total;

    let raises = session
        .difficulty_adjustments()
        .iter()
        .filter(|adj| adj.is_raise())
        .count();
    let bonus = raises as f64 * RAISE_BONUS;

    (weighted_average + bonus).min(100.0)
}
