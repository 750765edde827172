//! Queue manager implementation for per-battle-type waiting lists
//!
//! This module owns the waiting lists, the match acceptance decision on top
//! of the compatibility scorer, and the starvation fallback. All mutations
//! of one battle-type queue are serialized behind that queue's lock; queues
//! of different battle types operate independently.

use crate::error::{BattleError, Result};
use crate::matching::scorer::MatchScorer;
use crate::types::{BattleType, PlayerId, QueueEntry};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for match acceptance behavior
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Minimum compatibility score required to accept the best candidate
    pub accept_threshold: f64,
    /// Once this many other entries are waiting, the longest-waiting one is
    /// accepted regardless of score. The source heuristic used 3; the value
    /// carries no documented rationale, so it stays configurable.
    pub starvation_threshold: usize,
    /// Estimated wait attributed to each 1-based queue position
    pub estimated_wait_per_position: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.3,
            starvation_threshold: 3,
            estimated_wait_per_position: Duration::from_secs(30),
        }
    }
}

/// Result of a queue join: matched with a partner, or waiting in line
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// The joining entry and the chosen partner were both removed from the queue
    Matched { partner: QueueEntry },
    /// No acceptable partner yet; the entry stays queued
    Waiting {
        position: usize,
        estimated_wait: Duration,
    },
}

/// Position of a player in some battle-type queue
#[derive(Debug, Clone)]
pub struct QueuePosition {
    pub battle_type: BattleType,
    pub position: usize,
    pub estimated_wait: Duration,
}

/// Statistics about queue manager operations
#[derive(Debug, Clone, Default)]
pub struct QueueManagerStats {
    /// Total number of players queued
    pub players_queued: u64,
    /// Total number of matches made
    pub matches_made: u64,
    /// Matches made through the starvation fallback
    pub starvation_matches: u64,
    /// Total number of explicit leaves
    pub players_left: u64,
}

/// The queue manager owning one waiting list per battle type
pub struct QueueManager {
    /// One independently locked queue per battle type
    queues: RwLock<HashMap<BattleType, Arc<Mutex<Vec<QueueEntry>>>>>,
    scorer: Arc<dyn MatchScorer>,
    config: MatchingConfig,
    stats: RwLock<QueueManagerStats>,
}

impl QueueManager {
    pub fn new(scorer: Arc<dyn MatchScorer>, config: MatchingConfig) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            scorer,
            config,
            stats: RwLock::new(QueueManagerStats::default()),
        }
    }

    /// Get or create the queue for a battle type
    fn queue_for(&self, battle_type: BattleType) -> Result<Arc<Mutex<Vec<QueueEntry>>>> {
        {
            let queues = self.queues.read().map_err(|_| BattleError::Internal {
                message: "Failed to acquire queues lock".to_string(),
            })?;
            if let Some(queue) = queues.get(&battle_type) {
                return Ok(queue.clone());
            }
        }

        let mut queues = self.queues.write().map_err(|_| BattleError::Internal {
            message: "Failed to acquire queues lock".to_string(),
        })?;
        Ok(queues
            .entry(battle_type)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone())
    }

    /// Add a candidate to its battle-type queue and attempt to match it.
    ///
    /// Fails with a conflict if the candidate is already waiting in that
    /// queue. On acceptance both entries are removed atomically under the
    /// queue lock, so no concurrent join can consume either of them.
    pub fn join(&self, entry: QueueEntry) -> Result<JoinOutcome> {
        let queue = self.queue_for(entry.battle_type)?;
        let mut entries = queue.lock().map_err(|_| BattleError::Internal {
            message: "Failed to acquire queue lock".to_string(),
        })?;

        if entries.iter().any(|e| e.player_id == entry.player_id) {
            return Err(BattleError::Conflict {
                reason: format!(
                    "Player {} is already queued for {} battles",
                    entry.player_id, entry.battle_type
                ),
            }
            .into());
        }

        let now = current_timestamp();
        let partner_index = self.find_match(&entry, &entries, now);

        match partner_index {
            Some(index) => {
                let partner = entries.remove(index);
                self.record_match()?;

                info!(
                    "Matched '{}' with '{}' in {} queue",
                    entry.player_id, partner.player_id, entry.battle_type
                );
                Ok(JoinOutcome::Matched { partner })
            }
            None => {
                entries.push(entry.clone());
                let position = entries.len();
                let estimated_wait = self.estimated_wait(position);
                self.record_join()?;

                debug!(
                    "Player '{}' waiting in {} queue at position {}",
                    entry.player_id, entry.battle_type, position
                );
                Ok(JoinOutcome::Waiting {
                    position,
                    estimated_wait,
                })
            }
        }
    }

    /// Pick a partner for `entry` among the waiting entries.
    ///
    /// The best-scoring candidate wins if it clears the acceptance
    /// threshold. If nobody does but enough entries are already waiting,
    /// the longest-waiting one is accepted instead so that unusual
    /// candidates cannot starve the queue.
    fn find_match(
        &self,
        entry: &QueueEntry,
        waiting: &[QueueEntry],
        now: DateTime<Utc>,
    ) -> Option<usize> {
        if waiting.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in waiting.iter().enumerate() {
            let score = self.scorer.score(entry, candidate, now);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((index, score)),
            }
        }

        if let Some((index, score)) = best {
            if score > self.config.accept_threshold {
                return Some(index);
            }
        }

        if waiting.len() >= self.config.starvation_threshold {
            let longest_waiting = waiting
                .iter()
                .enumerate()
                .min_by_key(|(_, candidate)| candidate.joined_at)
                .map(|(index, _)| index);

            if let Some(index) = longest_waiting {
                info!(
                    "Starvation fallback: matching '{}' with longest-waiting '{}' ({} waiting)",
                    entry.player_id,
                    waiting[index].player_id,
                    waiting.len()
                );
                if let Ok(mut stats) = self.stats.write() {
                    stats.starvation_matches += 1;
                }
                return Some(index);
            }
        }

        None
    }

    /// Remove a candidate from a battle-type queue.
    ///
    /// Idempotent: removing an absent candidate is a successful no-op.
    /// Returns whether an entry was actually removed.
    pub fn leave(&self, player_id: &str, battle_type: BattleType) -> Result<bool> {
        let queue = self.queue_for(battle_type)?;
        let mut entries = queue.lock().map_err(|_| BattleError::Internal {
            message: "Failed to acquire queue lock".to_string(),
        })?;

        let before = entries.len();
        entries.retain(|e| e.player_id != player_id);
        let removed = entries.len() < before;

        if removed {
            let mut stats = self.stats.write().map_err(|_| BattleError::Internal {
                message: "Failed to acquire stats lock".to_string(),
            })?;
            stats.players_left += 1;
            debug!("Player '{}' left the {} queue", player_id, battle_type);
        }

        Ok(removed)
    }

    /// Find the queue a player is currently waiting in, if any
    pub fn status(&self, player_id: &str) -> Result<Option<QueuePosition>> {
        let queues = self.queues.read().map_err(|_| BattleError::Internal {
            message: "Failed to acquire queues lock".to_string(),
        })?;

        for (battle_type, queue) in queues.iter() {
            let entries = queue.lock().map_err(|_| BattleError::Internal {
                message: "Failed to acquire queue lock".to_string(),
            })?;
            if let Some(index) = entries.iter().position(|e| e.player_id == player_id) {
                let position = index + 1;
                return Ok(Some(QueuePosition {
                    battle_type: *battle_type,
                    position,
                    estimated_wait: self.estimated_wait(position),
                }));
            }
        }

        Ok(None)
    }

    /// Total number of waiting entries across all battle types
    pub fn waiting_count(&self) -> usize {
        let Ok(queues) = self.queues.read() else {
            return 0;
        };
        queues
            .values()
            .filter_map(|queue| queue.lock().ok().map(|entries| entries.len()))
            .sum()
    }

    /// Get current manager statistics
    pub fn stats(&self) -> Result<QueueManagerStats> {
        let stats = self.stats.read().map_err(|_| BattleError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        Ok(stats.clone())
    }

    fn estimated_wait(&self, position: usize) -> Duration {
        // Deliberately simple heuristic: each position ahead costs a fixed slice
        self.config.estimated_wait_per_position * position as u32
    }

    fn record_join(&self) -> Result<()> {
        let mut stats = self.stats.write().map_err(|_| BattleError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        stats.players_queued += 1;
        Ok(())
    }

    fn record_match(&self) -> Result<()> {
        let mut stats = self.stats.write().map_err(|_| BattleError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        stats.players_queued += 1;
        stats.matches_made += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::scorer::WeightedMatchScorer;
    use chrono::Duration as ChronoDuration;

    fn manager() -> QueueManager {
        QueueManager::new(
            Arc::new(WeightedMatchScorer::new()),
            MatchingConfig::default(),
        )
    }

    fn entry(id: &str, rating: i64, level: u32, languages: &[&str]) -> QueueEntry {
        QueueEntry {
            player_id: id.to_string(),
            display_name: id.to_string(),
            skill_level: level,
            rating,
            languages: languages.iter().map(|l| l.to_string()).collect(),
            joined_at: current_timestamp(),
            battle_type: BattleType::Quick,
        }
    }

    #[test]
    fn test_first_join_waits_at_position_one() {
        let manager = manager();

        let outcome = manager.join(entry("alice", 1500, 5, &["rust"])).unwrap();
        match outcome {
            JoinOutcome::Waiting {
                position,
                estimated_wait,
            } => {
                assert_eq!(position, 1);
                assert_eq!(estimated_wait, Duration::from_secs(30));
            }
            other => panic!("expected waiting, got {:?}", other),
        }
    }

    #[test]
    fn test_compatible_candidates_match() {
        let manager = manager();

        manager.join(entry("alice", 1200, 5, &["javascript"])).unwrap();
        let outcome = manager
            .join(entry("bob", 1220, 5, &["javascript"]))
            .unwrap();

        match outcome {
            JoinOutcome::Matched { partner } => assert_eq!(partner.player_id, "alice"),
            other => panic!("expected match, got {:?}", other),
        }

        // Both entries consumed
        assert_eq!(manager.waiting_count(), 0);
    }

    #[test]
    fn test_duplicate_join_is_conflict() {
        let manager = manager();

        manager.join(entry("alice", 1500, 5, &["rust"])).unwrap();
        let err = manager
            .join(entry("alice", 1500, 5, &["rust"]))
            .unwrap_err();

        let battle_err = err.downcast_ref::<BattleError>().unwrap();
        assert!(matches!(battle_err, BattleError::Conflict { .. }));
        assert_eq!(manager.waiting_count(), 1);
    }

    #[test]
    fn test_incompatible_candidates_wait() {
        let manager = manager();

        manager.join(entry("novice", 100, 1, &["python"])).unwrap();
        let outcome = manager
            .join(entry("master", 3000, 10, &["rust"]))
            .unwrap();

        assert!(matches!(outcome, JoinOutcome::Waiting { position: 2, .. }));
        assert_eq!(manager.waiting_count(), 2);
    }

    #[test]
    fn test_starvation_fallback_matches_longest_waiting() {
        let manager = manager();
        let now = current_timestamp();

        // Three incompatible entries; the oldest joined first
        let mut oldest = entry("oldest", 100, 1, &["cobol"]);
        oldest.joined_at = now - ChronoDuration::seconds(90);
        let mut middle = entry("middle", 900, 2, &["fortran"]);
        middle.joined_at = now - ChronoDuration::seconds(60);
        let mut newest = entry("newest", 2000, 9, &["ada"]);
        newest.joined_at = now - ChronoDuration::seconds(30);

        manager.join(oldest).unwrap();
        manager.join(middle).unwrap();
        manager.join(newest).unwrap();

        // Incompatible with all three, but three others are waiting
        let outcome = manager.join(entry("loner", 3500, 10, &["rust"])).unwrap();
        match outcome {
            JoinOutcome::Matched { partner } => assert_eq!(partner.player_id, "oldest"),
            other => panic!("expected starvation match, got {:?}", other),
        }

        let stats = manager.stats().unwrap();
        assert_eq!(stats.starvation_matches, 1);
    }

    #[test]
    fn test_leave_is_idempotent() {
        let manager = manager();

        manager.join(entry("alice", 1500, 5, &["rust"])).unwrap();
        assert!(manager.leave("alice", BattleType::Quick).unwrap());
        assert!(!manager.leave("alice", BattleType::Quick).unwrap());
        assert!(!manager.leave("ghost", BattleType::Ranked).unwrap());
    }

    #[test]
    fn test_status_scans_all_queues() {
        let manager = manager();

        let mut ranked = entry("alice", 1500, 5, &["rust"]);
        ranked.battle_type = BattleType::Ranked;
        manager.join(ranked).unwrap();

        let status = manager.status("alice").unwrap().unwrap();
        assert_eq!(status.battle_type, BattleType::Ranked);
        assert_eq!(status.position, 1);

        assert!(manager.status("ghost").unwrap().is_none());
    }

    #[test]
    fn test_queues_are_independent_per_battle_type() {
        let manager = manager();

        manager.join(entry("alice", 1500, 5, &["rust"])).unwrap();
        let mut ranked = entry("alice", 1500, 5, &["rust"]);
        ranked.battle_type = BattleType::Ranked;

        // Same player id in a different battle-type queue is not a conflict
        // at queue level; the service layer enforces the one-queue rule.
        assert!(manager.join(ranked).is_ok());
        assert_eq!(manager.waiting_count(), 2);
    }

    #[test]
    fn test_configurable_starvation_threshold() {
        let config = MatchingConfig {
            starvation_threshold: 1,
            ..MatchingConfig::default()
        };
        let manager = QueueManager::new(Arc::new(WeightedMatchScorer::new()), config);

        manager.join(entry("novice", 100, 1, &["python"])).unwrap();
        let outcome = manager.join(entry("master", 3000, 10, &["rust"])).unwrap();

        // With threshold 1, a single waiting entry is already matched
        assert!(matches!(outcome, JoinOutcome::Matched { .. }));
    }
}
