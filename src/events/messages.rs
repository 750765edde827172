//! Push-channel event definitions
//!
//! Events the server pushes to connected clients. The poll transport never
//! sees these; it reconciles from full room snapshots instead.

use crate::types::{BattleId, ChallengeView, OpponentSummary, PlayerId, TestCaseResult};
use serde::{Deserialize, Serialize};

/// Discrete events delivered over the push channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// The player entered a queue at the given 1-based position
    QueueJoined { position: usize },
    /// The player was matched into a battle
    BattleMatched {
        battle_id: BattleId,
        challenge: ChallengeView,
        opponent: OpponentSummary,
        time_limit_ms: u64,
    },
    /// Grading finished for the player's latest submission
    CodeResult {
        test_results: Vec<TestCaseResult>,
        all_passed: bool,
    },
    /// The battle reached its terminal state
    BattleEnded { winner: Option<PlayerId> },
}

impl ServerEvent {
    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::QueueJoined { .. } => "queue-joined",
            ServerEvent::BattleMatched { .. } => "battle-matched",
            ServerEvent::CodeResult { .. } => "code-result",
            ServerEvent::BattleEnded { .. } => "battle-ended",
        }
    }
}
