//! Challenge provider traits and implementations
//!
//! This module defines the interface for requesting a problem appropriate to
//! a skill level, along with a static implementation backed by a built-in
//! challenge bank.

use crate::error::{BattleError, Result};
use crate::types::{BattleType, Challenge, Difficulty, Language, TestCase};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Skill-weighted request for a challenge
#[derive(Debug, Clone)]
pub struct ChallengeRequest {
    /// Average skill level of the room's participants
    pub skill_level: u32,
    /// Average rating of the room's participants
    pub rating: i64,
    pub battle_type: BattleType,
    pub difficulty_override: Option<Difficulty>,
    pub language_override: Option<Language>,
}

impl ChallengeRequest {
    /// Difficulty the request resolves to
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty_override
            .unwrap_or_else(|| difficulty_for_level(self.skill_level))
    }
}

/// Map an average skill level onto a difficulty tier
pub fn difficulty_for_level(skill_level: u32) -> Difficulty {
    match skill_level {
        0..=3 => Difficulty::Easy,
        4..=6 => Difficulty::Medium,
        _ => Difficulty::Hard,
    }
}

/// Validate a provisioned challenge before it is attached to a room.
///
/// Output must carry at most 3 visible cases and at least one hidden case
/// so submissions cannot hard-code the visible expectations.
pub fn validate_challenge(challenge: &Challenge) -> Result<()> {
    if challenge.test_cases.is_empty() {
        return Err(BattleError::Provisioning {
            reason: format!("Challenge '{}' has no test cases", challenge.title),
        }
        .into());
    }
    if challenge.visible_cases().len() > 3 {
        return Err(BattleError::Provisioning {
            reason: format!(
                "Challenge '{}' exposes {} visible cases (max 3)",
                challenge.title,
                challenge.visible_cases().len()
            ),
        }
        .into());
    }
    if challenge.hidden_case_count() == 0 {
        return Err(BattleError::Provisioning {
            reason: format!("Challenge '{}' has no hidden test cases", challenge.title),
        }
        .into());
    }
    if challenge.time_limit_seconds == 0 {
        return Err(BattleError::Provisioning {
            reason: format!("Challenge '{}' has no time limit", challenge.title),
        }
        .into());
    }
    Ok(())
}

/// Trait for provisioning challenges for battle rooms
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
    /// Fetch a challenge matching the request, or fail with a provisioning error
    async fn fetch_challenge(&self, request: ChallengeRequest) -> Result<Challenge>;
}

/// Static challenge provider backed by a built-in bank
///
/// Serves challenges round-robin per difficulty tier so consecutive rooms at
/// the same tier do not all receive the same problem.
pub struct StaticChallengeProvider {
    bank: HashMap<Difficulty, Vec<Challenge>>,
    cursors: Mutex<HashMap<Difficulty, usize>>,
}

impl StaticChallengeProvider {
    pub fn new() -> Self {
        Self {
            bank: builtin_bank(),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Create a provider over a custom bank
    pub fn with_bank(bank: HashMap<Difficulty, Vec<Challenge>>) -> Result<Self> {
        for challenges in bank.values() {
            for challenge in challenges {
                validate_challenge(challenge)?;
            }
        }
        Ok(Self {
            bank,
            cursors: Mutex::new(HashMap::new()),
        })
    }

    pub fn available_count(&self, difficulty: Difficulty) -> usize {
        self.bank.get(&difficulty).map_or(0, |c| c.len())
    }
}

impl Default for StaticChallengeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChallengeProvider for StaticChallengeProvider {
    async fn fetch_challenge(&self, request: ChallengeRequest) -> Result<Challenge> {
        let difficulty = request.difficulty();
        let challenges = self
            .bank
            .get(&difficulty)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BattleError::Provisioning {
                reason: format!("No {} challenges available", difficulty),
            })?;

        let index = {
            let mut cursors = self.cursors.lock().map_err(|_| BattleError::Internal {
                message: "Failed to acquire cursor lock".to_string(),
            })?;
            let cursor = cursors.entry(difficulty).or_insert(0);
            let index = *cursor % challenges.len();
            *cursor = cursor.wrapping_add(1);
            index
        };

        let mut challenge = challenges[index].clone();
        // Each provisioned copy gets its own identity
        challenge.id = Uuid::new_v4();
        Ok(challenge)
    }
}

fn starter(pairs: &[(&str, &str)]) -> HashMap<Language, String> {
    pairs
        .iter()
        .map(|(language, code)| (language.to_string(), code.to_string()))
        .collect()
}

fn case(input: &str, expected: &str, hidden: bool) -> TestCase {
    TestCase {
        input: input.to_string(),
        expected_output: expected.to_string(),
        hidden,
    }
}

/// Built-in challenge bank, one small set per difficulty tier
fn builtin_bank() -> HashMap<Difficulty, Vec<Challenge>> {
    let mut bank: HashMap<Difficulty, Vec<Challenge>> = HashMap::new();

    bank.insert(
        Difficulty::Easy,
        vec![
            Challenge {
                id: Uuid::new_v4(),
                title: "Sum of Two Numbers".to_string(),
                description: "Read two integers from input and print their sum.".to_string(),
                difficulty: Difficulty::Easy,
                test_cases: vec![
                    case("1 2", "3", false),
                    case("10 20", "30", false),
                    case("-5 5", "0", true),
                    case("1000000 2000000", "3000000", true),
                ],
                starter_code: starter(&[
                    ("javascript", "function solve(input) {\n  // ...\n}\n"),
                    ("python", "def solve(input):\n    pass\n"),
                    ("rust", "fn solve(input: &str) -> String {\n    todo!()\n}\n"),
                ]),
                time_limit_seconds: 600,
            },
            Challenge {
                id: Uuid::new_v4(),
                title: "Reverse a String".to_string(),
                description: "Print the input string reversed.".to_string(),
                difficulty: Difficulty::Easy,
                test_cases: vec![
                    case("hello", "olleh", false),
                    case("ab", "ba", false),
                    case("racecar", "racecar", true),
                    case("", "", true),
                ],
                starter_code: starter(&[
                    ("javascript", "function solve(input) {\n  // ...\n}\n"),
                    ("python", "def solve(input):\n    pass\n"),
                ]),
                time_limit_seconds: 600,
            },
        ],
    );

    bank.insert(
        Difficulty::Medium,
        vec![Challenge {
            id: Uuid::new_v4(),
            title: "Balanced Brackets".to_string(),
            description: "Print 'true' if every bracket in the input is matched and properly \
                          nested, 'false' otherwise."
                .to_string(),
            difficulty: Difficulty::Medium,
            test_cases: vec![
                case("([]{})", "true", false),
                case("([)]", "false", false),
                case("", "true", true),
                case("(((((((((())))))))))", "true", true),
            ],
            starter_code: starter(&[
                ("javascript", "function solve(input) {\n  // ...\n}\n"),
                ("python", "def solve(input):\n    pass\n"),
                ("rust", "fn solve(input: &str) -> String {\n    todo!()\n}\n"),
            ]),
            time_limit_seconds: 900,
        }],
    );

    bank.insert(
        Difficulty::Hard,
        vec![Challenge {
            id: Uuid::new_v4(),
            title: "Longest Increasing Subsequence".to_string(),
            description: "Given a space-separated list of integers, print the length of its \
                          longest strictly increasing subsequence."
                .to_string(),
            difficulty: Difficulty::Hard,
            test_cases: vec![
                case("10 9 2 5 3 7 101 18", "4", false),
                case("0 1 0 3 2 3", "4", false),
                case("7 7 7 7", "1", true),
                case("1", "1", true),
            ],
            starter_code: starter(&[
                ("javascript", "function solve(input) {\n  // ...\n}\n"),
                ("python", "def solve(input):\n    pass\n"),
                ("rust", "fn solve(input: &str) -> String {\n    todo!()\n}\n"),
            ]),
            time_limit_seconds: 1200,
        }],
    );

    bank
}

/// Mock challenge provider for testing
///
/// Serves a fixed easy challenge, or fails every request when configured to.
pub struct MockChallengeProvider {
    fail: std::sync::atomic::AtomicBool,
}

impl MockChallengeProvider {
    pub fn new() -> Self {
        Self {
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for MockChallengeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChallengeProvider for MockChallengeProvider {
    async fn fetch_challenge(&self, request: ChallengeRequest) -> Result<Challenge> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(BattleError::Provisioning {
                reason: "Mock provider configured to fail".to_string(),
            }
            .into());
        }

        Ok(Challenge {
            id: Uuid::new_v4(),
            title: "Mock Challenge".to_string(),
            description: "Echo the input.".to_string(),
            difficulty: request.difficulty(),
            test_cases: vec![case("a", "a", false), case("b", "b", true)],
            starter_code: HashMap::new(),
            time_limit_seconds: 600,
        })
    }
}
