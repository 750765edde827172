//! Battle room registry
//!
//! Creates, looks up and retires battle rooms. Each room sits behind its own
//! lock so operations on different rooms proceed concurrently while all
//! mutations of one room are serialized.

use crate::battle::room::BattleRoom;
use crate::error::{BattleError, Result};
use crate::types::{BattleId, BattleSnapshot, BattleState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Statistics about registry operations
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Total number of battles created
    pub battles_created: u64,
    /// Total number of battles completed
    pub battles_completed: u64,
    /// Battles dissolved before activation (provisioning failures)
    pub battles_dissolved: u64,
    /// Total number of rooms cleaned up
    pub rooms_cleaned: u64,
    /// Current number of live rooms
    pub active_battles: usize,
}

/// Registry of all live battle rooms
pub struct BattleRoomRegistry {
    /// Map of rooms by ID, each behind its own single-writer lock
    rooms: RwLock<HashMap<BattleId, Arc<Mutex<BattleRoom>>>>,
    stats: RwLock<RegistryStats>,
}

impl BattleRoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            stats: RwLock::new(RegistryStats::default()),
        }
    }

    /// Register a newly created room
    pub fn insert(&self, room: BattleRoom) -> Result<BattleId> {
        let id = room.id();
        {
            let mut rooms = self.rooms.write().map_err(|_| BattleError::Internal {
                message: "Failed to acquire rooms lock".to_string(),
            })?;
            rooms.insert(id, Arc::new(Mutex::new(room)));
        }

        let mut stats = self.stats.write().map_err(|_| BattleError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        stats.battles_created += 1;
        stats.active_battles += 1;

        debug!("Registered battle room {}", id);
        Ok(id)
    }

    fn room(&self, battle_id: BattleId) -> Result<Arc<Mutex<BattleRoom>>> {
        let rooms = self.rooms.read().map_err(|_| BattleError::Internal {
            message: "Failed to acquire rooms lock".to_string(),
        })?;
        rooms
            .get(&battle_id)
            .cloned()
            .ok_or_else(|| {
                BattleError::NotFound {
                    resource: format!("battle {}", battle_id),
                }
                .into()
            })
    }

    /// Run a closure against one room under its lock.
    ///
    /// The closure must not block on I/O; grading and other awaits happen
    /// outside the lock.
    pub fn with_room<R>(
        &self,
        battle_id: BattleId,
        f: impl FnOnce(&mut BattleRoom) -> Result<R>,
    ) -> Result<R> {
        let room = self.room(battle_id)?;
        let mut guard = room.lock().map_err(|_| BattleError::Internal {
            message: "Failed to acquire room lock".to_string(),
        })?;
        f(&mut guard)
    }

    /// Whether a room currently exists
    pub fn contains(&self, battle_id: BattleId) -> bool {
        self.rooms
            .read()
            .map(|rooms| rooms.contains_key(&battle_id))
            .unwrap_or(false)
    }

    /// Take a room snapshot at a given instant
    pub fn snapshot_at(&self, battle_id: BattleId, now: DateTime<Utc>) -> Result<BattleSnapshot> {
        self.with_room(battle_id, |room| Ok(room.snapshot(now)))
    }

    /// Remove a room outright (dissolution)
    pub fn remove(&self, battle_id: BattleId) -> Result<bool> {
        let removed = {
            let mut rooms = self.rooms.write().map_err(|_| BattleError::Internal {
                message: "Failed to acquire rooms lock".to_string(),
            })?;
            rooms.remove(&battle_id).is_some()
        };

        if removed {
            let mut stats = self.stats.write().map_err(|_| BattleError::Internal {
                message: "Failed to acquire stats lock".to_string(),
            })?;
            stats.battles_dissolved += 1;
            stats.active_battles = stats.active_battles.saturating_sub(1);
            info!("Dissolved battle room {}", battle_id);
        }
        Ok(removed)
    }

    /// Find a room by its uppercase invite code
    pub fn find_by_invite_code(&self, code: &str) -> Result<Option<BattleId>> {
        let rooms = self.rooms.read().map_err(|_| BattleError::Internal {
            message: "Failed to acquire rooms lock".to_string(),
        })?;

        let code = code.to_uppercase();
        for (id, room) in rooms.iter() {
            let guard = room.lock().map_err(|_| BattleError::Internal {
                message: "Failed to acquire room lock".to_string(),
            })?;
            if guard.invite_code() == code {
                return Ok(Some(*id));
            }
        }
        Ok(None)
    }

    /// Find the battle a player currently participates in.
    ///
    /// Running rooms win over completed ones so a reconnecting client lands
    /// back in its live battle, but still sees the outcome of a battle that
    /// ended while it was away.
    pub fn find_battle_for(&self, player_id: &str) -> Result<Option<BattleId>> {
        let rooms = self.rooms.read().map_err(|_| BattleError::Internal {
            message: "Failed to acquire rooms lock".to_string(),
        })?;

        let mut completed: Option<(BattleId, DateTime<Utc>)> = None;
        for (id, room) in rooms.iter() {
            let guard = room.lock().map_err(|_| BattleError::Internal {
                message: "Failed to acquire room lock".to_string(),
            })?;
            if guard.participant(player_id).is_none() {
                continue;
            }
            if guard.state() != BattleState::Completed {
                return Ok(Some(*id));
            }
            let completed_at = guard.completed_at().unwrap_or(guard.created_at());
            if completed.map_or(true, |(_, at)| completed_at > at) {
                completed = Some((*id, completed_at));
            }
        }
        Ok(completed.map(|(id, _)| id))
    }

    /// Record that a room reached its terminal state
    pub fn record_completion(&self) -> Result<()> {
        let mut stats = self.stats.write().map_err(|_| BattleError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        stats.battles_completed += 1;
        Ok(())
    }

    /// Remove rooms whose retention window elapsed and waiting rooms that
    /// were never started. Returns the number of rooms removed.
    pub fn cleanup_rooms(
        &self,
        now: DateTime<Utc>,
        retention_seconds: u64,
        waiting_ttl_seconds: u64,
    ) -> Result<usize> {
        let mut to_remove = Vec::new();
        {
            let rooms = self.rooms.read().map_err(|_| BattleError::Internal {
                message: "Failed to acquire rooms lock".to_string(),
            })?;
            for (id, room) in rooms.iter() {
                let guard = room.lock().map_err(|_| BattleError::Internal {
                    message: "Failed to acquire room lock".to_string(),
                })?;
                if guard.should_cleanup(now, retention_seconds, waiting_ttl_seconds) {
                    to_remove.push(*id);
                }
            }
        }

        if to_remove.is_empty() {
            return Ok(0);
        }

        let mut cleaned = 0;
        {
            let mut rooms = self.rooms.write().map_err(|_| BattleError::Internal {
                message: "Failed to acquire rooms lock".to_string(),
            })?;
            for id in to_remove {
                if rooms.remove(&id).is_some() {
                    cleaned += 1;
                    debug!("Cleaned up battle room {}", id);
                }
            }

            let mut stats = self.stats.write().map_err(|_| BattleError::Internal {
                message: "Failed to acquire stats lock".to_string(),
            })?;
            stats.rooms_cleaned += cleaned;
            stats.active_battles = rooms.len();
        }

        if cleaned > 0 {
            info!("Cleaned up {} stale battle rooms", cleaned);
        }
        Ok(cleaned as usize)
    }

    /// Number of live rooms
    pub fn active_count(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    /// Ids of all live rooms
    pub fn battle_ids(&self) -> Vec<BattleId> {
        self.rooms
            .read()
            .map(|rooms| rooms.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Get current registry statistics
    pub fn stats(&self) -> Result<RegistryStats> {
        let stats = self.stats.read().map_err(|_| BattleError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        Ok(stats.clone())
    }
}

impl Default for BattleRoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
