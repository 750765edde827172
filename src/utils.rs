//! Utility functions for the battle orchestration service

use crate::types::BattleId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique battle ID
pub fn generate_battle_id() -> BattleId {
    Uuid::new_v4()
}

/// Derive the short invite code from a battle ID.
///
/// The code is the first 8 characters of the hyphenated UUID, uppercased.
pub fn invite_code_for(battle_id: &BattleId) -> String {
    battle_id
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Whole seconds elapsed between two instants, clamped to zero
pub fn elapsed_seconds(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - since).num_seconds().max(0) as u64
}
