//! Poll transport: the fixed-interval request/response fallback
//!
//! When the push channel is unavailable the client asks for the
//! authoritative room snapshot on a fixed interval and reconciles by full
//! replacement. The loop runs on the cancellable scheduled-task
//! abstraction, so stopping it is a single cancellation.

use crate::error::Result;
use crate::timer::ScheduledTask;
use crate::service::matchmaking::MatchmakingService;
use crate::types::{BattleId, BattleSnapshot, PlayerId, SubmitCodeRequest, SubmitCodeResponse};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Trait for the polling request/response API.
///
/// Also serves the push path as the snapshot resynchronization endpoint:
/// after a `battle-matched` event the orchestrator fetches one snapshot
/// here to seed its countdown baseline.
#[async_trait]
pub trait PollApi: Send + Sync {
    /// Fetch the authoritative snapshot of a known battle
    async fn fetch_snapshot(&self, battle_id: BattleId) -> Result<BattleSnapshot>;

    /// Discover the battle a player currently belongs to, if any
    async fn fetch_active_battle(&self, player_id: &PlayerId) -> Result<Option<BattleSnapshot>>;

    /// Submit code as a plain request
    async fn submit_code(&self, request: SubmitCodeRequest) -> Result<SubmitCodeResponse>;
}

/// One iteration's outcome, pumped into the orchestrator
#[derive(Debug)]
pub enum PollUpdate {
    Snapshot(BattleSnapshot),
    NoBattle,
    Failed(String),
}

/// A running poll loop and its update stream
pub struct PollSession {
    _task: ScheduledTask,
    updates: mpsc::Receiver<PollUpdate>,
}

impl PollSession {
    /// Start polling. With a known battle id the loop fetches that room's
    /// snapshot; without one it first discovers the player's battle.
    pub fn start(
        api: Arc<dyn PollApi>,
        player_id: PlayerId,
        battle_id: Option<BattleId>,
        interval: std::time::Duration,
    ) -> Self {
        let (tx, updates) = mpsc::channel(16);

        let task = ScheduledTask::spawn(async move {
            let mut known_battle = battle_id;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let update = match known_battle {
                    Some(id) => match api.fetch_snapshot(id).await {
                        Ok(snapshot) => PollUpdate::Snapshot(snapshot),
                        Err(err) => PollUpdate::Failed(err.to_string()),
                    },
                    None => match api.fetch_active_battle(&player_id).await {
                        Ok(Some(snapshot)) => {
                            known_battle = Some(snapshot.battle_id);
                            PollUpdate::Snapshot(snapshot)
                        }
                        Ok(None) => PollUpdate::NoBattle,
                        Err(err) => PollUpdate::Failed(err.to_string()),
                    },
                };

                if tx.send(update).await.is_err() {
                    debug!("Poll loop for '{}' stopped: consumer gone", player_id);
                    break;
                }
            }
        });

        Self {
            _task: task,
            updates,
        }
    }

    /// Next poll outcome; `None` only after the session is dropped
    pub async fn next_update(&mut self) -> Option<PollUpdate> {
        self.updates.recv().await
    }
}

/// In-process poll API speaking directly to the service
pub struct LocalPollApi {
    service: Arc<MatchmakingService>,
}

impl LocalPollApi {
    pub fn new(service: Arc<MatchmakingService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PollApi for LocalPollApi {
    async fn fetch_snapshot(&self, battle_id: BattleId) -> Result<BattleSnapshot> {
        self.service.battle_snapshot(battle_id).await
    }

    async fn fetch_active_battle(&self, player_id: &PlayerId) -> Result<Option<BattleSnapshot>> {
        self.service.active_battle_for(player_id).await
    }

    async fn submit_code(&self, request: SubmitCodeRequest) -> Result<SubmitCodeResponse> {
        self.service.submit_code(request).await
    }
}
