use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Error returned when a difficulty label cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid difficulty level: {provided}")]
pub struct ParseDifficultyError {
    pub provided: String,
}

//
// ─── DIFFICULTY LEVEL ──────────────────────────────────────────────────────────
//

/// Five-level ordinal difficulty ladder.
///
/// Levels are totally ordered (`VeryEasy < Easy < Medium < Hard < VeryHard`)
/// and serialize as the human-readable labels stored with question sets
/// ("Very Easy", "Easy", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DifficultyLevel {
    #[serde(rename = "Very Easy")]
    VeryEasy,
    Easy,
    Medium,
    Hard,
    #[serde(rename = "Very Hard")]
    VeryHard,
}

impl DifficultyLevel {
    /// All levels, lowest first.
    pub const ALL: [DifficultyLevel; 5] = [
        DifficultyLevel::VeryEasy,
        DifficultyLevel::Easy,
        DifficultyLevel::Medium,
        DifficultyLevel::Hard,
        DifficultyLevel::VeryHard,
    ];

    /// Ladder position, 0 (`VeryEasy`) through 4 (`VeryHard`).
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Level at the given ladder position, if in range.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The next-harder level, or `None` at the top of the ladder.
    #[must_use]
    pub fn next_up(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// The next-easier level, or `None` at the bottom of the ladder.
    #[must_use]
    pub fn next_down(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Human-readable label, matching the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyLevel::VeryEasy => "Very Easy",
            DifficultyLevel::Easy => "Easy",
            DifficultyLevel::Medium => "Medium",
            DifficultyLevel::Hard => "Hard",
            DifficultyLevel::VeryHard => "Very Hard",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyLevel {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Very Easy" => Ok(DifficultyLevel::VeryEasy),
            "Easy" => Ok(DifficultyLevel::Easy),
            "Medium" => Ok(DifficultyLevel::Medium),
            "Hard" => Ok(DifficultyLevel::Hard),
            "Very Hard" => Ok(DifficultyLevel::VeryHard),
            other => Err(ParseDifficultyError {
                provided: other.to_string(),
            }),
        }
    }
}

//
// ─── LADDER PROFILE ────────────────────────────────────────────────────────────
//

/// Correctness percentage at or above which (together with a fast completion)
/// the ladder moves up a level.
pub const RAISE_THRESHOLD: f64 = 80.0;

/// Per-question pace budget in seconds; averaging under this counts as a
/// fast completion.
pub const FAST_PACE_SECS: f64 = 20.0;

/// Threshold configuration for the difficulty transition rule.
///
/// The demotion threshold differs between deployments of the original data
/// set (60 vs 50), so it is an explicit profile rather than a hard-coded
/// constant. `STANDARD` (60) is the default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderProfile {
    /// Correctness percentage below which the ladder moves down a level.
    pub low_threshold: f64,
}

impl LadderProfile {
    /// Default profile: demote below 60% correctness.
    pub const STANDARD: LadderProfile = LadderProfile { low_threshold: 60.0 };

    /// Alternate profile: demote only below 50% correctness.
    pub const LENIENT: LadderProfile = LadderProfile { low_threshold: 50.0 };

    /// Transition rule over the ladder.
    ///
    /// - correctness >= 80% and a fast completion move one level up,
    ///   saturating at `VeryHard`;
    /// - correctness below `low_threshold` moves one level down, saturating
    ///   at `VeryEasy`;
    /// - anything else keeps the current level.
    ///
    /// Total over all inputs; never fails.
    #[must_use]
    pub fn next(
        &self,
        current: DifficultyLevel,
        correctness_pct: f64,
        is_fast: bool,
    ) -> DifficultyLevel {
        if correctness_pct >= RAISE_THRESHOLD && is_fast {
            current.next_up().unwrap_or(current)
        } else if correctness_pct < self.low_threshold {
            current.next_down().unwrap_or(current)
        } else {
            current
        }
    }
}

impl Default for LadderProfile {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Whether an average pace qualifies as a fast completion.
#[must_use]
pub fn is_fast_completion(avg_secs_per_question: f64) -> bool {
    avg_secs_per_question < FAST_PACE_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(DifficultyLevel::VeryEasy < DifficultyLevel::Easy);
        assert!(DifficultyLevel::Hard < DifficultyLevel::VeryHard);
        for (i, level) in DifficultyLevel::ALL.iter().enumerate() {
            assert_eq!(level.index(), i);
            assert_eq!(DifficultyLevel::from_index(i), Some(*level));
        }
        assert_eq!(DifficultyLevel::from_index(5), None);
    }

    #[test]
    fn labels_round_trip() {
        for level in DifficultyLevel::ALL {
            assert_eq!(level.as_str().parse::<DifficultyLevel>().unwrap(), level);
        }
        assert!("Impossible".parse::<DifficultyLevel>().is_err());
    }

    #[test]
    fn high_and_fast_moves_up_saturating_at_top() {
        let profile = LadderProfile::STANDARD;
        for level in DifficultyLevel::ALL {
            let expected = level.next_up().unwrap_or(level);
            assert_eq!(profile.next(level, 85.0, true), expected);
        }
        assert_eq!(
            profile.next(DifficultyLevel::VeryHard, 100.0, true),
            DifficultyLevel::VeryHard
        );
    }

    #[test]
    fn low_score_moves_down_saturating_at_bottom() {
        let profile = LadderProfile::STANDARD;
        for level in DifficultyLevel::ALL {
            let expected = level.next_down().unwrap_or(level);
            assert_eq!(profile.next(level, 59.9, false), expected);
            assert_eq!(profile.next(level, 59.9, true), expected);
        }
        assert_eq!(
            profile.next(DifficultyLevel::VeryEasy, 0.0, false),
            DifficultyLevel::VeryEasy
        );
    }

    #[test]
    fn middle_band_holds_level() {
        let profile = LadderProfile::STANDARD;
        for level in DifficultyLevel::ALL {
            assert_eq!(profile.next(level, 60.0, false), level);
            assert_eq!(profile.next(level, 79.9, true), level);
            // high score without the pace does not promote
            assert_eq!(profile.next(level, 95.0, false), level);
        }
    }

    #[test]
    fn lenient_profile_holds_in_the_fifties() {
        let profile = LadderProfile::LENIENT;
        assert_eq!(
            profile.next(DifficultyLevel::Medium, 55.0, false),
            DifficultyLevel::Medium
        );
        assert_eq!(
            profile.next(DifficultyLevel::Medium, 49.9, false),
            DifficultyLevel::Easy
        );
    }

    #[test]
    fn fast_completion_uses_per_question_budget() {
        assert!(is_fast_completion(12.0));
        assert!(!is_fast_completion(20.0));
        assert!(!is_fast_completion(25.5));
    }
}
