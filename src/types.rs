//! Common types used throughout the battle orchestration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for battles
pub type BattleId = Uuid;

/// Programming language identifier (lowercase, e.g. "javascript")
pub type Language = String;

/// Named matchmaking pool a player can queue into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleType {
    Quick,
    Ranked,
    Private,
}

impl std::fmt::Display for BattleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BattleType::Quick => write!(f, "Quick"),
            BattleType::Ranked => write!(f, "Ranked"),
            BattleType::Private => write!(f, "Private"),
        }
    }
}

/// Challenge difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

/// Lifecycle state of a battle room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleState {
    /// Room created, fewer participants than capacity or challenge not yet attached
    Waiting,
    /// Challenge attached, timer running
    Active,
    /// A participant completed; grace window open for the others
    Finishing,
    /// Terminal state
    Completed,
}

impl std::fmt::Display for BattleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BattleState::Waiting => write!(f, "waiting"),
            BattleState::Active => write!(f, "active"),
            BattleState::Finishing => write!(f, "finishing"),
            BattleState::Completed => write!(f, "completed"),
        }
    }
}

/// A waiting candidate in one battle-type queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub skill_level: u32,
    pub rating: i64,
    pub languages: HashSet<Language>,
    pub joined_at: DateTime<Utc>,
    pub battle_type: BattleType,
}

/// One contestant inside a battle room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub player_id: PlayerId,
    pub display_name: String,
    pub skill_level: u32,
    pub rating: i64,
    /// Latest submitted code, visible to the room
    pub code: Option<String>,
    pub language: Option<Language>,
    pub tests_passed: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub forfeited: bool,
}

impl Participant {
    pub fn new(player_id: PlayerId, display_name: String, skill_level: u32, rating: i64) -> Self {
        Self {
            player_id,
            display_name,
            skill_level,
            rating,
            code: None,
            language: None,
            tests_passed: 0,
            completed: false,
            completed_at: None,
            forfeited: false,
        }
    }

    /// Build a participant from the queue entry that matched into the room
    pub fn from_entry(entry: &QueueEntry) -> Self {
        Self::new(
            entry.player_id.clone(),
            entry.display_name.clone(),
            entry.skill_level,
            entry.rating,
        )
    }
}

/// One grading case of a challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Hidden cases are graded but never shown to clients
    pub hidden: bool,
}

/// A coding problem attached to a battle room, immutable once attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub test_cases: Vec<TestCase>,
    pub starter_code: HashMap<Language, String>,
    pub time_limit_seconds: u64,
}

impl Challenge {
    pub fn visible_cases(&self) -> Vec<&TestCase> {
        self.test_cases.iter().filter(|c| !c.hidden).collect()
    }

    pub fn hidden_case_count(&self) -> usize {
        self.test_cases.iter().filter(|c| c.hidden).count()
    }

    /// Client-facing projection with hidden cases stripped
    pub fn client_view(&self) -> ChallengeView {
        ChallengeView {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            difficulty: self.difficulty,
            visible_test_cases: self
                .test_cases
                .iter()
                .filter(|c| !c.hidden)
                .cloned()
                .collect(),
            hidden_case_count: self.hidden_case_count(),
            starter_code: self.starter_code.clone(),
            time_limit_seconds: self.time_limit_seconds,
        }
    }
}

/// What a client is allowed to see of a challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub visible_test_cases: Vec<TestCase>,
    pub hidden_case_count: usize,
    pub starter_code: HashMap<Language, String>,
    pub time_limit_seconds: u64,
}

/// Outcome of grading one submission against one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub passed: bool,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub execution_time_ms: u64,
    pub hidden: bool,
}

impl TestCaseResult {
    /// Strip the input/output details of hidden cases before they leave the room
    pub fn redacted(&self) -> Self {
        if self.hidden {
            Self {
                passed: self.passed,
                input: String::new(),
                expected_output: String::new(),
                actual_output: String::new(),
                execution_time_ms: self.execution_time_ms,
                hidden: true,
            }
        } else {
            self.clone()
        }
    }
}

/// Redact hidden-case details from a full grading run
pub fn redact_results(results: &[TestCaseResult]) -> Vec<TestCaseResult> {
    results.iter().map(TestCaseResult::redacted).collect()
}

/// Short description of the matched opponent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpponentSummary {
    pub player_id: PlayerId,
    pub display_name: String,
    pub rating: i64,
    pub skill_level: u32,
}

impl OpponentSummary {
    pub fn from_entry(entry: &QueueEntry) -> Self {
        Self {
            player_id: entry.player_id.clone(),
            display_name: entry.display_name.clone(),
            rating: entry.rating,
            skill_level: entry.skill_level,
        }
    }

    pub fn from_participant(participant: &Participant) -> Self {
        Self {
            player_id: participant.player_id.clone(),
            display_name: participant.display_name.clone(),
            rating: participant.rating,
            skill_level: participant.skill_level,
        }
    }
}

/// Authoritative, fully reconstructible view of one battle room.
///
/// This is the unit of reconciliation for the polling transport: clients
/// replace their local state with it wholesale, never merge deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub battle_id: BattleId,
    pub invite_code: String,
    pub battle_type: BattleType,
    pub participants: Vec<Participant>,
    pub challenge: Option<ChallengeView>,
    pub state: BattleState,
    pub created_at: DateTime<Utc>,
    pub time_limit_seconds: u64,
    pub time_remaining_seconds: u64,
    pub winner: Option<PlayerId>,
}

/// Request to join a battle-type queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQueueRequest {
    pub player_id: PlayerId,
    pub display_name: String,
    pub battle_type: BattleType,
    pub skill_level: u32,
    pub rating: i64,
    pub languages: HashSet<Language>,
}

/// Response to a queue join: either matched into a battle or waiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQueueResponse {
    pub matched: bool,
    pub battle_id: Option<BattleId>,
    pub opponent: Option<OpponentSummary>,
    pub position: Option<usize>,
    pub estimated_wait_seconds: Option<u64>,
}

/// Response to leaving a queue; leaving a queue you are not in still succeeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveQueueResponse {
    pub success: bool,
}

/// Current queue position of a player across all battle types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatusResponse {
    pub in_queue: bool,
    pub battle_type: Option<BattleType>,
    pub position: Option<usize>,
    pub estimated_wait_seconds: Option<u64>,
}

/// Request to open a private, invite-only battle room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrivateBattleRequest {
    pub player_id: PlayerId,
    pub display_name: String,
    pub skill_level: u32,
    pub rating: i64,
    pub languages: HashSet<Language>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrivateBattleResponse {
    pub battle_id: BattleId,
    pub invite_code: String,
}

/// Request to join an existing private battle room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPrivateBattleRequest {
    pub player_id: PlayerId,
    pub display_name: String,
    pub battle_id: BattleId,
    pub skill_level: u32,
    pub rating: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPrivateBattleResponse {
    pub success: bool,
}

/// A code submission for grading, identical in push and poll mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCodeRequest {
    pub player_id: PlayerId,
    pub battle_id: BattleId,
    pub code: String,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCodeResponse {
    pub test_results: Vec<TestCaseResult>,
    pub all_passed: bool,
    pub winner: Option<PlayerId>,
}
