//! Authoritative countdown derivation and per-room expiry scheduling
//!
//! Both transports derive time-remaining from the same formula over the
//! room's creation time and time limit; nothing ever accumulates local
//! decrements. Server-side, the timer service schedules one cancellable
//! task per room that reports expiry over a channel instead of invoking
//! callbacks.

use crate::error::{BattleError, Result};
use crate::types::BattleId;
use crate::utils::elapsed_seconds;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// The shared countdown formula: `max(0, time_limit - (now - created_at))`
pub fn remaining_seconds(
    created_at: DateTime<Utc>,
    time_limit_seconds: u64,
    now: DateTime<Utc>,
) -> u64 {
    time_limit_seconds.saturating_sub(elapsed_seconds(created_at, now))
}

/// A spawned task that can be stopped with a single explicit cancellation.
///
/// Dropping the handle also cancels the task, so a poll loop or countdown
/// cannot outlive its owner.
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn a future as a cancellable task
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    /// Stop the task
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Whether the task ran to completion or was cancelled
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Per-room expiry scheduling.
///
/// Each schedule call arms (or re-arms) one deadline per battle; when it
/// fires, the battle id is sent on the expiry channel handed out at
/// construction. The consumer applies the actual state transition.
pub struct TimerService {
    expiry_tx: mpsc::UnboundedSender<BattleId>,
    deadlines: Mutex<HashMap<BattleId, ScheduledTask>>,
}

impl TimerService {
    /// Create the service and the stream of expiry notifications
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BattleId>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        (
            Self {
                expiry_tx,
                deadlines: Mutex::new(HashMap::new()),
            },
            expiry_rx,
        )
    }

    /// Arm the deadline for a battle, replacing any earlier one.
    ///
    /// Used both for the countdown reaching zero and for grace-window
    /// elapse; the room's `tick` decides what the instant means.
    pub fn schedule(&self, battle_id: BattleId, deadline: DateTime<Utc>) -> Result<()> {
        let tx = self.expiry_tx.clone();
        let delay = (deadline - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        let task = ScheduledTask::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the service is shutting down
            let _ = tx.send(battle_id);
        });

        let mut deadlines = self.deadlines.lock().map_err(|_| BattleError::Internal {
            message: "Failed to acquire deadlines lock".to_string(),
        })?;
        deadlines.insert(battle_id, task);
        debug!("Armed deadline for battle {} at {}", battle_id, deadline);
        Ok(())
    }

    /// Disarm the deadline for a battle, if any
    pub fn cancel(&self, battle_id: BattleId) {
        if let Ok(mut deadlines) = self.deadlines.lock() {
            if let Some(task) = deadlines.remove(&battle_id) {
                task.cancel();
                debug!("Cancelled deadline for battle {}", battle_id);
            }
        }
    }

    /// Number of currently armed deadlines
    pub fn armed_count(&self) -> usize {
        self.deadlines
            .lock()
            .map(|deadlines| deadlines.len())
            .unwrap_or(0)
    }
}
