//! Matchmaking primitives: compatibility scoring and queue management

pub mod queue;
pub mod scorer;

pub use queue::{JoinOutcome, MatchingConfig, QueueManager, QueueManagerStats};
pub use scorer::{MatchScorer, ScorerWeights, WeightedMatchScorer};
