//! Client-side transport orchestration
//!
//! Exactly one transport drives client state at a time: the push channel
//! when it connects inside the allowed window, the poll loop otherwise.
//! The orchestrator owns the fallback decision, applies push events
//! incrementally and poll snapshots by full replacement, and keeps the
//! countdown honest by always recomputing it from the last authoritative
//! snapshot.

use crate::config::TransportSettings;
use crate::error::{BattleError, Result};
use crate::events::messages::ServerEvent;
use crate::timer;
use crate::transport::poll::{PollApi, PollSession, PollUpdate};
use crate::transport::push::{PushChannel, PushSession};
use crate::types::{
    BattleId, BattleSnapshot, BattleState, Language, PlayerId, SubmitCodeRequest,
    SubmitCodeResponse,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Which transport currently drives state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Push,
    Poll,
    Disconnected,
}

/// Client-local connection state
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub mode: TransportMode,
    pub last_snapshot: Option<BattleSnapshot>,
    pub reconnect_attempts: u32,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            mode: TransportMode::Disconnected,
            last_snapshot: None,
            reconnect_attempts: 0,
        }
    }
}

/// The active transport variant
enum Transport {
    Push(PushSession),
    Poll(PollSession),
}

/// One transport read, resolved before any state transition
enum Step {
    Pushed(Option<ServerEvent>),
    Polled(Option<PollUpdate>),
    Inactive,
}

/// One update surfaced to the client loop
#[derive(Debug)]
pub enum ClientUpdate {
    /// A discrete push event, already applied to local state
    Event(ServerEvent),
    /// A full snapshot from the poll loop, already reconciled
    Snapshot(BattleSnapshot),
}

/// Single-threaded orchestrator over the two transports
pub struct TransportOrchestrator {
    player_id: PlayerId,
    push: Arc<dyn PushChannel>,
    poll: Arc<dyn PollApi>,
    settings: TransportSettings,
    state: ConnectionState,
    active: Option<Transport>,
    battle_id: Option<BattleId>,
    consecutive_poll_failures: u32,
}

impl TransportOrchestrator {
    pub fn new(
        player_id: PlayerId,
        push: Arc<dyn PushChannel>,
        poll: Arc<dyn PollApi>,
        settings: TransportSettings,
    ) -> Self {
        Self {
            player_id,
            push,
            poll,
            settings,
            state: ConnectionState::new(),
            active: None,
            battle_id: None,
            consecutive_poll_failures: 0,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.state.mode
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn current_snapshot(&self) -> Option<&BattleSnapshot> {
        self.state.last_snapshot.as_ref()
    }

    pub fn battle_id(&self) -> Option<BattleId> {
        self.battle_id
    }

    /// Attempt the push channel; degrade to polling when it cannot be
    /// established inside the connect window.
    pub async fn connect(&mut self) {
        let connect_timeout =
            std::time::Duration::from_secs(self.settings.push_connect_timeout_seconds);

        match timeout(connect_timeout, self.push.connect(&self.player_id)).await {
            Ok(Ok(events)) => {
                info!("Push channel connected for '{}'", self.player_id);
                self.state.mode = TransportMode::Push;
                self.active = Some(Transport::Push(PushSession::new(events)));
            }
            Ok(Err(err)) => {
                warn!(
                    "Push channel failed for '{}' ({}), falling back to polling",
                    self.player_id, err
                );
                self.fall_back_to_poll();
            }
            Err(_) => {
                warn!(
                    "Push connect timed out after {:?} for '{}', falling back to polling",
                    connect_timeout, self.player_id
                );
                self.fall_back_to_poll();
            }
        }
    }

    /// Stop whichever transport is active
    pub fn disconnect(&mut self) {
        self.active = None;
        self.state.mode = TransportMode::Disconnected;
    }

    /// Switch to the poll loop. The push session is dropped first, so its
    /// listeners are fully stopped before the first poll fires and no event
    /// can be applied twice.
    fn fall_back_to_poll(&mut self) {
        self.active = None;
        self.state.reconnect_attempts += 1;

        let session = PollSession::start(
            self.poll.clone(),
            self.player_id.clone(),
            self.battle_id,
            std::time::Duration::from_millis(self.settings.poll_interval_ms),
        );
        self.active = Some(Transport::Poll(session));
        self.state.mode = TransportMode::Poll;
        self.consecutive_poll_failures = 0;
    }

    /// Drive the active transport until it yields the next update.
    ///
    /// Returns `None` once both transports are exhausted; the caller then
    /// shows a retryable disconnected status.
    pub async fn next_update(&mut self) -> Option<ClientUpdate> {
        loop {
            // Resolve the transport read first so the session borrow ends
            // before any state transition below.
            let step = match self.active.as_mut() {
                Some(Transport::Push(session)) => Step::Pushed(session.next_event().await),
                Some(Transport::Poll(session)) => Step::Polled(session.next_update().await),
                None => Step::Inactive,
            };

            match step {
                Step::Pushed(Some(event)) => {
                    self.apply_event(&event).await;
                    return Some(ClientUpdate::Event(event));
                }
                Step::Pushed(None) => {
                    info!(
                        "Push channel dropped mid-session for '{}', falling back to polling",
                        self.player_id
                    );
                    self.fall_back_to_poll();
                }
                Step::Polled(Some(PollUpdate::Snapshot(snapshot))) => {
                    self.consecutive_poll_failures = 0;
                    self.reconcile(snapshot.clone());
                    return Some(ClientUpdate::Snapshot(snapshot));
                }
                Step::Polled(Some(PollUpdate::NoBattle)) => {
                    self.consecutive_poll_failures = 0;
                }
                Step::Polled(Some(PollUpdate::Failed(reason))) => {
                    self.consecutive_poll_failures += 1;
                    debug!(
                        "Poll failure {}/{} for '{}': {}",
                        self.consecutive_poll_failures,
                        self.settings.max_reconnect_attempts,
                        self.player_id,
                        reason
                    );
                    if self.consecutive_poll_failures >= self.settings.max_reconnect_attempts {
                        warn!(
                            "Both transports unavailable for '{}', reporting disconnected",
                            self.player_id
                        );
                        self.disconnect();
                        return None;
                    }
                }
                Step::Polled(None) => {
                    self.disconnect();
                    return None;
                }
                Step::Inactive => return None,
            }
        }
    }

    /// Submit code through whichever transport is active. The operation is
    /// identical either way and idempotent server-side.
    pub async fn submit_code(
        &self,
        code: String,
        language: Language,
    ) -> Result<SubmitCodeResponse> {
        let battle_id = self.battle_id.ok_or(BattleError::Transport {
            message: "No battle in progress".to_string(),
        })?;
        let request = SubmitCodeRequest {
            player_id: self.player_id.clone(),
            battle_id,
            code,
            language,
        };

        match self.state.mode {
            TransportMode::Push => self.push.submit_code(request).await,
            TransportMode::Poll => self.poll.submit_code(request).await,
            TransportMode::Disconnected => Err(BattleError::Transport {
                message: "Disconnected from both transports".to_string(),
            }
            .into()),
        }
    }

    /// Time remaining, recomputed from the last authoritative snapshot.
    ///
    /// Never derived from an accumulated local decrement, so a transport
    /// change cannot introduce drift.
    pub fn time_remaining_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        let snapshot = self.state.last_snapshot.as_ref()?;
        match snapshot.state {
            BattleState::Active | BattleState::Finishing => Some(timer::remaining_seconds(
                snapshot.created_at,
                snapshot.time_limit_seconds,
                now,
            )),
            _ => Some(snapshot.time_remaining_seconds),
        }
    }

    /// Apply a discrete push event to local state
    async fn apply_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::BattleMatched { battle_id, .. } => {
                self.battle_id = Some(*battle_id);
                // Seed the countdown baseline from one authoritative snapshot
                match self.poll.fetch_snapshot(*battle_id).await {
                    Ok(snapshot) => self.state.last_snapshot = Some(snapshot),
                    Err(err) => debug!(
                        "Snapshot seed failed for battle {} ({}), awaiting next event",
                        battle_id, err
                    ),
                }
            }
            ServerEvent::BattleEnded { winner } => {
                if let Some(snapshot) = self.state.last_snapshot.as_mut() {
                    snapshot.state = BattleState::Completed;
                    snapshot.winner = winner.clone();
                }
            }
            ServerEvent::QueueJoined { .. } | ServerEvent::CodeResult { .. } => {}
        }
    }

    /// Full-replacement reconciliation from a poll snapshot
    fn reconcile(&mut self, snapshot: BattleSnapshot) {
        self.battle_id = Some(snapshot.battle_id);
        self.state.last_snapshot = Some(snapshot);
    }
}
