//! Compatibility scoring between two queued candidates
//!
//! This module contains the pure ranking function used by the queue manager
//! to pick a partner for a joining candidate. The score is never the sole
//! matching decision; acceptance is gated by the queue manager's threshold.

use crate::error::{BattleError, Result};
use crate::types::QueueEntry;
use crate::utils::elapsed_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weights and normalization constants for the compatibility score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerWeights {
    /// Weight of rating closeness
    pub rating: f64,
    /// Weight of skill-level closeness
    pub level: f64,
    /// Weight of preferred-language overlap
    pub language: f64,
    /// Weight of the shared wait-time bonus
    pub wait: f64,
    /// Rating difference at which rating closeness bottoms out
    pub rating_divisor: f64,
    /// Level difference at which level closeness bottoms out
    pub level_divisor: f64,
    /// Average wait in seconds at which the wait bonus saturates
    pub wait_saturation_seconds: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            rating: 0.4,
            level: 0.3,
            language: 0.2,
            wait: 0.1,
            rating_divisor: 400.0,
            level_divisor: 10.0,
            wait_saturation_seconds: 60.0,
        }
    }
}

impl ScorerWeights {
    /// Validate weight values
    pub fn validate(&self) -> Result<()> {
        let weights = [self.rating, self.level, self.language, self.wait];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(BattleError::Configuration {
                message: "Scorer weights must be non-negative".to_string(),
            }
            .into());
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(BattleError::Configuration {
                message: "Scorer weights must not all be zero".to_string(),
            }
            .into());
        }
        if self.rating_divisor <= 0.0 || self.level_divisor <= 0.0 {
            return Err(BattleError::Configuration {
                message: "Scorer divisors must be positive".to_string(),
            }
            .into());
        }
        if self.wait_saturation_seconds <= 0.0 {
            return Err(BattleError::Configuration {
                message: "Wait saturation must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Trait for candidate compatibility scoring
pub trait MatchScorer: Send + Sync {
    /// Score the compatibility of two candidates in [0, 1].
    ///
    /// Symmetric: `score(a, b) == score(b, a)`. No side effects, no I/O.
    fn score(&self, a: &QueueEntry, b: &QueueEntry, now: DateTime<Utc>) -> f64;
}

/// Weighted-sum compatibility scorer
///
/// Combines rating closeness, level closeness, preferred-language overlap
/// and a shared wait-time bonus.
#[derive(Debug, Clone)]
pub struct WeightedMatchScorer {
    weights: ScorerWeights,
}

impl WeightedMatchScorer {
    pub fn new() -> Self {
        Self {
            weights: ScorerWeights::default(),
        }
    }

    pub fn with_weights(weights: ScorerWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    fn rating_closeness(&self, a: &QueueEntry, b: &QueueEntry) -> f64 {
        let diff = (a.rating - b.rating).abs() as f64;
        (1.0 - diff / self.weights.rating_divisor).max(0.0)
    }

    fn level_closeness(&self, a: &QueueEntry, b: &QueueEntry) -> f64 {
        let diff = (a.skill_level as f64 - b.skill_level as f64).abs();
        (1.0 - diff / self.weights.level_divisor).max(0.0)
    }

    fn language_overlap(&self, a: &QueueEntry, b: &QueueEntry) -> f64 {
        let larger = a.languages.len().max(b.languages.len());
        if larger == 0 {
            // Two empty preference sets are trivially identical
            return 1.0;
        }
        let shared = a.languages.intersection(&b.languages).count();
        shared as f64 / larger as f64
    }

    fn wait_bonus(&self, a: &QueueEntry, b: &QueueEntry, now: DateTime<Utc>) -> f64 {
        let wait_a = elapsed_seconds(a.joined_at, now) as f64;
        let wait_b = elapsed_seconds(b.joined_at, now) as f64;
        let average = (wait_a + wait_b) / 2.0;
        (average / self.weights.wait_saturation_seconds).min(1.0)
    }
}

impl Default for WeightedMatchScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchScorer for WeightedMatchScorer {
    fn score(&self, a: &QueueEntry, b: &QueueEntry, now: DateTime<Utc>) -> f64 {
        let total = self.weights.rating * self.rating_closeness(a, b)
            + self.weights.level * self.level_closeness(a, b)
            + self.weights.language * self.language_overlap(a, b)
            + self.weights.wait * self.wait_bonus(a, b, now);

        total.clamp(0.0, 1.0)
    }
}
