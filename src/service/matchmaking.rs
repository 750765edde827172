//! The matchmaking façade
//!
//! One explicit service object owns the queue manager, the room registry,
//! the provisioning and grading contracts, event fan-out and the timer
//! service, and exposes the logical operations both transports speak:
//! join/leave/status, private battles, submissions and snapshots. It is
//! constructed at startup and injected wherever requests arrive; there is
//! no ambient global state.

use crate::battle::provider::BattleTypeProvider;
use crate::battle::registry::BattleRoomRegistry;
use crate::battle::room::BattleRoom;
use crate::challenge::executor::CodeExecutor;
use crate::challenge::provider::{validate_challenge, ChallengeProvider, ChallengeRequest};
use crate::config::MatchmakingSettings;
use crate::error::{BattleError, Result};
use crate::events::messages::ServerEvent;
use crate::events::publisher::EventPublisher;
use crate::matching::queue::{JoinOutcome, MatchingConfig, QueueManager};
use crate::metrics::MetricsCollector;
use crate::timer::TimerService;
use crate::types::*;
use crate::utils::current_timestamp;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

impl From<&MatchmakingSettings> for MatchingConfig {
    fn from(settings: &MatchmakingSettings) -> Self {
        Self {
            accept_threshold: settings.accept_threshold,
            starvation_threshold: settings.starvation_threshold,
            estimated_wait_per_position: std::time::Duration::from_secs(
                settings.estimated_wait_per_position_seconds,
            ),
        }
    }
}

/// Gate decision for a submission, taken under the room lock before grading
enum SubmissionGate {
    /// The participant already completed; nothing to grade
    Replay { winner: Option<PlayerId> },
    /// Grade against this challenge
    Grade(Challenge),
}

/// The matchmaking and battle orchestration service
pub struct MatchmakingService {
    queue_manager: Arc<QueueManager>,
    registry: Arc<BattleRoomRegistry>,
    battle_types: Arc<dyn BattleTypeProvider>,
    challenges: Arc<dyn ChallengeProvider>,
    executor: Arc<dyn CodeExecutor>,
    publisher: Arc<dyn EventPublisher>,
    timers: Arc<TimerService>,
    metrics: Arc<MetricsCollector>,
    settings: MatchmakingSettings,
}

impl MatchmakingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue_manager: Arc<QueueManager>,
        registry: Arc<BattleRoomRegistry>,
        battle_types: Arc<dyn BattleTypeProvider>,
        challenges: Arc<dyn ChallengeProvider>,
        executor: Arc<dyn CodeExecutor>,
        publisher: Arc<dyn EventPublisher>,
        timers: Arc<TimerService>,
        metrics: Arc<MetricsCollector>,
        settings: MatchmakingSettings,
    ) -> Self {
        Self {
            queue_manager,
            registry,
            battle_types,
            challenges,
            executor,
            publisher,
            timers,
            metrics,
            settings,
        }
    }

    pub fn queue_manager(&self) -> &Arc<QueueManager> {
        &self.queue_manager
    }

    pub fn registry(&self) -> &Arc<BattleRoomRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &MatchmakingSettings {
        &self.settings
    }

    /// Join a battle-type queue, possibly matching immediately.
    ///
    /// A candidate may wait in at most one queue at a time. Matched callers
    /// get the battle id and opponent; waiting callers get their 1-based
    /// position and a simple position-derived wait estimate.
    pub async fn join_queue(&self, request: JoinQueueRequest) -> Result<JoinQueueResponse> {
        let start = Instant::now();
        validate_join_request(&request)?;

        if let Some(position) = self.queue_manager.status(&request.player_id)? {
            return Err(BattleError::Conflict {
                reason: format!(
                    "Player {} is already waiting in the {} queue",
                    request.player_id, position.battle_type
                ),
            }
            .into());
        }

        let entry = QueueEntry {
            player_id: request.player_id.clone(),
            display_name: request.display_name.clone(),
            skill_level: request.skill_level,
            rating: request.rating,
            languages: request.languages.clone(),
            joined_at: current_timestamp(),
            battle_type: request.battle_type,
        };

        info!(
            "Queue join - player: '{}', battle_type: {}, rating: {}, level: {}",
            entry.player_id, entry.battle_type, entry.rating, entry.skill_level
        );

        let response = match self.queue_manager.join(entry.clone())? {
            JoinOutcome::Matched { partner } => {
                let waited = current_timestamp() - partner.joined_at;
                self.metrics.record_match(
                    entry.battle_type,
                    waited.to_std().unwrap_or_default(),
                );

                let battle_id = self.start_matched_battle(&entry, &partner).await?;
                JoinQueueResponse {
                    matched: true,
                    battle_id: Some(battle_id),
                    opponent: Some(OpponentSummary::from_entry(&partner)),
                    position: None,
                    estimated_wait_seconds: None,
                }
            }
            JoinOutcome::Waiting {
                position,
                estimated_wait,
            } => {
                self.publish(
                    &request.player_id,
                    ServerEvent::QueueJoined { position },
                )
                .await;

                JoinQueueResponse {
                    matched: false,
                    battle_id: None,
                    opponent: None,
                    position: Some(position),
                    estimated_wait_seconds: Some(estimated_wait.as_secs()),
                }
            }
        };

        self.metrics
            .record_queue_join(request.battle_type, start.elapsed());
        self.refresh_gauges();
        Ok(response)
    }

    /// Leave a queue. Idempotent: leaving a queue you are not in succeeds.
    pub fn leave_queue(
        &self,
        player_id: &str,
        battle_type: BattleType,
    ) -> Result<LeaveQueueResponse> {
        self.queue_manager.leave(player_id, battle_type)?;
        self.refresh_gauges();
        Ok(LeaveQueueResponse { success: true })
    }

    /// Where is this player queued, if anywhere
    pub fn queue_status(&self, player_id: &str) -> Result<QueueStatusResponse> {
        match self.queue_manager.status(player_id)? {
            Some(position) => Ok(QueueStatusResponse {
                in_queue: true,
                battle_type: Some(position.battle_type),
                position: Some(position.position),
                estimated_wait_seconds: Some(position.estimated_wait.as_secs()),
            }),
            None => Ok(QueueStatusResponse {
                in_queue: false,
                battle_type: None,
                position: None,
                estimated_wait_seconds: None,
            }),
        }
    }

    /// Open a private room; the invite code is derived from the battle id
    pub fn create_private_battle(
        &self,
        request: CreatePrivateBattleRequest,
    ) -> Result<CreatePrivateBattleResponse> {
        if request.player_id.is_empty() || request.display_name.is_empty() {
            return Err(BattleError::Validation {
                reason: "player_id and display_name are required".to_string(),
            }
            .into());
        }

        let config = self.battle_types.get_config(BattleType::Private)?;
        let host = Participant::new(
            request.player_id.clone(),
            request.display_name.clone(),
            request.skill_level,
            request.rating,
        );
        let room = BattleRoom::new_private(&config, host, current_timestamp());
        let invite_code = room.invite_code().to_string();
        let battle_id = self.registry.insert(room)?;

        self.metrics.record_battle_created(BattleType::Private);
        self.refresh_gauges();

        info!(
            "Private battle {} created by '{}' (invite code {})",
            battle_id, request.player_id, invite_code
        );
        Ok(CreatePrivateBattleResponse {
            battle_id,
            invite_code,
        })
    }

    /// Resolve an invite code to its battle id
    pub fn resolve_invite_code(&self, code: &str) -> Result<BattleId> {
        self.registry
            .find_by_invite_code(code)?
            .ok_or_else(|| {
                BattleError::NotFound {
                    resource: format!("battle with invite code {}", code),
                }
                .into()
            })
    }

    /// Join a private room. Once the room reaches capacity a challenge is
    /// provisioned and the battle starts.
    pub async fn join_private_battle(
        &self,
        request: JoinPrivateBattleRequest,
    ) -> Result<JoinPrivateBattleResponse> {
        if request.player_id.is_empty() {
            return Err(BattleError::Validation {
                reason: "player_id is required".to_string(),
            }
            .into());
        }

        let ready_to_provision = self.registry.with_room(request.battle_id, |room| {
            if room.battle_type() != BattleType::Private {
                return Err(BattleError::Validation {
                    reason: format!("Battle {} is not a private battle", room.id()),
                }
                .into());
            }
            let participant = Participant::new(
                request.player_id.clone(),
                request.display_name.clone(),
                request.skill_level,
                request.rating,
            );
            room.add_participant(participant)?;
            Ok(room.is_full() && room.challenge().is_none())
        })?;

        info!(
            "Player '{}' joined private battle {}",
            request.player_id, request.battle_id
        );

        if ready_to_provision {
            self.provision_and_activate(request.battle_id).await?;
        }

        Ok(JoinPrivateBattleResponse { success: true })
    }

    /// Submit code for grading. The submission is idempotent from the
    /// room's perspective; grading runs with no room lock held.
    pub async fn submit_code(&self, request: SubmitCodeRequest) -> Result<SubmitCodeResponse> {
        let start = Instant::now();
        validate_submission(&request)?;

        let gate = self.registry.with_room(request.battle_id, |room| {
            room.ensure_submittable(&request.player_id)?;
            let participant = room
                .participant(&request.player_id)
                .expect("participant checked by ensure_submittable");
            if participant.completed {
                return Ok(SubmissionGate::Replay {
                    winner: room.winner().cloned(),
                });
            }
            let challenge = room.challenge().cloned().ok_or(BattleError::Internal {
                message: format!("Active battle {} has no challenge", room.id()),
            })?;
            Ok(SubmissionGate::Grade(challenge))
        })?;

        let challenge = match gate {
            SubmissionGate::Replay { winner } => {
                debug!(
                    "Replayed submission from completed participant '{}' in battle {}",
                    request.player_id, request.battle_id
                );
                self.metrics.record_submission("replayed", start.elapsed());
                return Ok(SubmitCodeResponse {
                    test_results: Vec::new(),
                    all_passed: true,
                    winner,
                });
            }
            SubmissionGate::Grade(challenge) => challenge,
        };

        let results = self
            .executor
            .execute(&challenge, &request.code, &request.language)
            .await?;
        let all_passed = !results.is_empty() && results.iter().all(|r| r.passed);

        let now = current_timestamp();
        let (recorded, winner, roster) = self.registry.with_room(request.battle_id, |room| {
            if room.state() == BattleState::Completed {
                // The battle ended while this submission was being graded
                return Ok((None, room.winner().cloned(), Vec::new()));
            }
            let outcome = room.record_submission(
                &request.player_id,
                request.code.clone(),
                request.language.clone(),
                &results,
                now,
            )?;
            let roster: Vec<PlayerId> = room
                .participants()
                .iter()
                .map(|p| p.player_id.clone())
                .collect();
            let winner = outcome.winner.clone();
            Ok((Some(outcome), winner, roster))
        })?;

        let redacted = redact_results(&results);
        self.publish(
            &request.player_id,
            ServerEvent::CodeResult {
                test_results: redacted.clone(),
                all_passed,
            },
        )
        .await;

        if let Some(outcome) = &recorded {
            match outcome.transitioned_to {
                Some(BattleState::Completed) => {
                    self.finish_battle(request.battle_id, winner.clone(), &roster)
                        .await?;
                }
                Some(BattleState::Finishing) => {
                    // Re-arm the deadline so the grace window closes the room
                    self.rearm_deadline(request.battle_id)?;
                }
                _ => {}
            }
        }

        let result_label = if recorded.is_none() {
            "late"
        } else if all_passed {
            "passed"
        } else {
            "failed"
        };
        self.metrics.record_submission(result_label, start.elapsed());

        Ok(SubmitCodeResponse {
            test_results: redacted,
            all_passed,
            winner,
        })
    }

    /// Authoritative snapshot of a battle, applying any due time-based
    /// transition first so the poll path can never observe a stale state.
    pub async fn battle_snapshot(&self, battle_id: BattleId) -> Result<BattleSnapshot> {
        let now = current_timestamp();
        let (snapshot, ended) = self.registry.with_room(battle_id, |room| {
            let transitioned = room.tick(now);
            let snapshot = room.snapshot(now);
            let ended = (transitioned == Some(BattleState::Completed)).then(|| {
                (
                    room.winner().cloned(),
                    room.participants()
                        .iter()
                        .map(|p| p.player_id.clone())
                        .collect::<Vec<_>>(),
                )
            });
            Ok((snapshot, ended))
        })?;

        if let Some((winner, roster)) = ended {
            self.finish_battle(battle_id, winner, &roster).await?;
        }
        Ok(snapshot)
    }

    /// The battle a player currently belongs to, if any.
    ///
    /// Poll-mode clients call this to discover a match made while they had
    /// no battle id yet.
    pub async fn active_battle_for(&self, player_id: &str) -> Result<Option<BattleSnapshot>> {
        match self.registry.find_battle_for(player_id)? {
            Some(battle_id) => Ok(Some(self.battle_snapshot(battle_id).await?)),
            None => Ok(None),
        }
    }

    /// Forfeit a running battle. Leaving after a match is only expressible
    /// this way; queue cancellation no longer applies.
    pub async fn forfeit(&self, player_id: &str, battle_id: BattleId) -> Result<()> {
        let now = current_timestamp();
        let (ended, winner, roster) = self.registry.with_room(battle_id, |room| {
            let transitioned = room.forfeit(player_id, now)?;
            Ok((
                transitioned == Some(BattleState::Completed),
                room.winner().cloned(),
                room.participants()
                    .iter()
                    .map(|p| p.player_id.clone())
                    .collect::<Vec<_>>(),
            ))
        })?;

        info!("Player '{}' forfeited battle {}", player_id, battle_id);
        if ended {
            self.finish_battle(battle_id, winner, &roster).await?;
        }
        Ok(())
    }

    /// Apply a timer-service expiry notification to its room
    pub async fn handle_expiry(&self, battle_id: BattleId) -> Result<()> {
        if !self.registry.contains(battle_id) {
            return Ok(());
        }

        let now = current_timestamp();
        let (ended, winner, roster, still_running) =
            self.registry.with_room(battle_id, |room| {
                let transitioned = room.tick(now);
                let running = matches!(
                    room.state(),
                    BattleState::Active | BattleState::Finishing
                );
                Ok((
                    transitioned == Some(BattleState::Completed),
                    room.winner().cloned(),
                    room.participants()
                        .iter()
                        .map(|p| p.player_id.clone())
                        .collect::<Vec<_>>(),
                    running,
                ))
            })?;

        if ended {
            self.finish_battle(battle_id, winner, &roster).await?;
        } else if still_running {
            // Deadline fired early relative to the room's actual schedule
            self.rearm_deadline(battle_id)?;
        }
        Ok(())
    }

    /// Remove retired rooms and stale waiting rooms
    pub fn cleanup_rooms(&self) -> Result<usize> {
        let cleaned = self.registry.cleanup_rooms(
            current_timestamp(),
            self.settings.retention_seconds,
            self.settings.waiting_room_ttl_seconds,
        )?;
        self.refresh_gauges();
        Ok(cleaned)
    }

    /// Create the room for a matched pair and start it.
    ///
    /// Provisioning is bounded; on failure the room is dissolved, the
    /// partner is informed and the caller gets a retryable error. Neither
    /// candidate is re-queued automatically.
    async fn start_matched_battle(
        &self,
        entry: &QueueEntry,
        partner: &QueueEntry,
    ) -> Result<BattleId> {
        let config = self.battle_types.get_config(entry.battle_type)?;
        let room = BattleRoom::new_matched(
            &config,
            vec![
                Participant::from_entry(entry),
                Participant::from_entry(partner),
            ],
            current_timestamp(),
        );
        let battle_id = self.registry.insert(room)?;
        self.metrics.record_battle_created(entry.battle_type);

        self.provision_and_activate(battle_id).await?;
        Ok(battle_id)
    }

    /// Fetch a challenge for a full room and move it to `active`.
    ///
    /// The request is skill-weighted over the room's participants. A slow
    /// or failing provider dissolves the room within the configured bound.
    async fn provision_and_activate(&self, battle_id: BattleId) -> Result<()> {
        let (request, roster) = self.registry.with_room(battle_id, |room| {
            let participants = room.participants();
            let count = participants.len().max(1) as i64;
            let request = ChallengeRequest {
                skill_level: (participants.iter().map(|p| p.skill_level as i64).sum::<i64>()
                    / count) as u32,
                rating: participants.iter().map(|p| p.rating).sum::<i64>() / count,
                battle_type: room.battle_type(),
                difficulty_override: None,
                language_override: None,
            };
            let roster: Vec<Participant> = participants.to_vec();
            Ok((request, roster))
        })?;

        let provisioned = timeout(
            std::time::Duration::from_secs(self.settings.provision_timeout_seconds),
            self.challenges.fetch_challenge(request),
        )
        .await;

        let challenge = match provisioned {
            Ok(Ok(challenge)) => match validate_challenge(&challenge) {
                Ok(()) => challenge,
                Err(err) => return self.dissolve(battle_id, &roster, err).await,
            },
            Ok(Err(err)) => return self.dissolve(battle_id, &roster, err).await,
            Err(_) => {
                let err = BattleError::Provisioning {
                    reason: format!(
                        "Challenge provisioning timed out after {}s",
                        self.settings.provision_timeout_seconds
                    ),
                }
                .into();
                return self.dissolve(battle_id, &roster, err).await;
            }
        };

        let view = challenge.client_view();
        let time_limit_ms = challenge.time_limit_seconds * 1000;
        let deadline = self.registry.with_room(battle_id, |room| {
            room.attach_challenge(challenge)?;
            Ok(room.expiry_deadline())
        })?;
        self.timers.schedule(battle_id, deadline)?;

        for participant in &roster {
            let opponent = roster
                .iter()
                .find(|p| p.player_id != participant.player_id)
                .map(OpponentSummary::from_participant);
            let Some(opponent) = opponent else { continue };

            self.publish(
                &participant.player_id,
                ServerEvent::BattleMatched {
                    battle_id,
                    challenge: view.clone(),
                    opponent,
                    time_limit_ms,
                },
            )
            .await;
        }

        info!("Battle {} is active", battle_id);
        self.refresh_gauges();
        Ok(())
    }

    /// Dissolve a room that could not be provisioned
    async fn dissolve(
        &self,
        battle_id: BattleId,
        roster: &[Participant],
        err: anyhow::Error,
    ) -> Result<()> {
        warn!("Dissolving battle {}: {}", battle_id, err);
        self.registry.remove(battle_id)?;
        self.timers.cancel(battle_id);
        self.metrics.record_provisioning_failure();
        self.refresh_gauges();

        for participant in roster {
            self.publish(
                &participant.player_id,
                ServerEvent::BattleEnded { winner: None },
            )
            .await;
        }
        Err(err)
    }

    /// Terminal bookkeeping shared by every path into `completed`
    async fn finish_battle(
        &self,
        battle_id: BattleId,
        winner: Option<PlayerId>,
        roster: &[PlayerId],
    ) -> Result<()> {
        self.registry.record_completion()?;
        self.timers.cancel(battle_id);
        self.metrics.record_battle_completed(winner.is_some());

        info!(
            "Battle {} completed, winner: {}",
            battle_id,
            winner.as_deref().unwrap_or("none")
        );
        for player_id in roster {
            self.publish(
                player_id,
                ServerEvent::BattleEnded {
                    winner: winner.clone(),
                },
            )
            .await;
        }
        self.refresh_gauges();
        Ok(())
    }

    /// Re-arm the earlier of the grace deadline and the countdown expiry
    fn rearm_deadline(&self, battle_id: BattleId) -> Result<()> {
        let deadline = self.registry.with_room(battle_id, |room| {
            let expiry = room.expiry_deadline();
            Ok(match room.grace_deadline() {
                Some(grace) if grace < expiry => grace,
                _ => expiry,
            })
        })?;
        self.timers.schedule(battle_id, deadline)
    }

    /// Publish an event, logging failures instead of surfacing them; push
    /// delivery is best effort and the poll path covers missed events
    async fn publish(&self, player_id: &PlayerId, event: ServerEvent) {
        self.metrics.record_event_published(event.name());
        if let Err(err) = self.publisher.publish(player_id, event).await {
            warn!("Failed to publish event to '{}': {}", player_id, err);
        }
    }

    fn refresh_gauges(&self) {
        self.metrics.update_gauges(
            self.queue_manager.waiting_count(),
            self.registry.active_count(),
        );
    }
}

fn validate_join_request(request: &JoinQueueRequest) -> Result<()> {
    if request.player_id.is_empty() {
        return Err(BattleError::Validation {
            reason: "player_id is required".to_string(),
        }
        .into());
    }
    if request.display_name.is_empty() {
        return Err(BattleError::Validation {
            reason: "display_name is required".to_string(),
        }
        .into());
    }
    if request.languages.is_empty() {
        return Err(BattleError::Validation {
            reason: "at least one preferred language is required".to_string(),
        }
        .into());
    }
    if request.battle_type == BattleType::Private {
        return Err(BattleError::Validation {
            reason: "private battles are created by invite, not by queueing".to_string(),
        }
        .into());
    }
    Ok(())
}

fn validate_submission(request: &SubmitCodeRequest) -> Result<()> {
    if request.player_id.is_empty() {
        return Err(BattleError::Validation {
            reason: "player_id is required".to_string(),
        }
        .into());
    }
    if request.code.trim().is_empty() {
        return Err(BattleError::Validation {
            reason: "code must not be empty".to_string(),
        }
        .into());
    }
    if request.language.is_empty() {
        return Err(BattleError::Validation {
            reason: "language is required".to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::provider::StaticBattleTypeProvider;
    use crate::challenge::executor::MockCodeExecutor;
    use crate::challenge::provider::{MockChallengeProvider, StaticChallengeProvider};
    use crate::events::publisher::MockEventPublisher;
    use crate::matching::scorer::WeightedMatchScorer;
    use std::collections::HashSet;

    fn languages(names: &[&str]) -> HashSet<Language> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn service_with(
        challenges: Arc<dyn ChallengeProvider>,
    ) -> (Arc<MatchmakingService>, Arc<MockEventPublisher>) {
        let settings = MatchmakingSettings::default();
        let publisher = Arc::new(MockEventPublisher::new());
        let (timers, _expiry_rx) = TimerService::new();
        let service = MatchmakingService::new(
            Arc::new(QueueManager::new(
                Arc::new(WeightedMatchScorer::new()),
                MatchingConfig::from(&settings),
            )),
            Arc::new(BattleRoomRegistry::new()),
            Arc::new(StaticBattleTypeProvider::new()),
            challenges,
            Arc::new(MockCodeExecutor::new()),
            publisher.clone(),
            Arc::new(timers),
            Arc::new(MetricsCollector::new().unwrap()),
            settings,
        );
        (Arc::new(service), publisher)
    }

    fn test_service() -> (Arc<MatchmakingService>, Arc<MockEventPublisher>) {
        service_with(Arc::new(StaticChallengeProvider::new()))
    }

    fn join_request(id: &str, rating: i64) -> JoinQueueRequest {
        JoinQueueRequest {
            player_id: id.to_string(),
            display_name: id.to_string(),
            battle_type: BattleType::Quick,
            skill_level: 5,
            rating,
            languages: languages(&["javascript"]),
        }
    }

    #[tokio::test]
    async fn test_join_then_match_pair() {
        let (service, publisher) = test_service();

        let first = service.join_queue(join_request("alice", 1200)).await.unwrap();
        assert!(!first.matched);
        assert_eq!(first.position, Some(1));
        assert_eq!(first.estimated_wait_seconds, Some(30));

        let second = service.join_queue(join_request("bob", 1220)).await.unwrap();
        assert!(second.matched);
        assert_eq!(
            second.opponent.as_ref().map(|o| o.player_id.as_str()),
            Some("alice")
        );

        // Both players were told the battle started
        assert_eq!(publisher.count_events_of_type("battle-matched"), 2);
        assert_eq!(publisher.count_events_of_type("queue-joined"), 1);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_mutation() {
        let (service, _) = test_service();

        let mut bad = join_request("", 1200);
        bad.player_id = String::new();
        let err = service.join_queue(bad).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BattleError>().unwrap(),
            BattleError::Validation { .. }
        ));
        assert_eq!(service.queue_manager().waiting_count(), 0);

        let mut no_langs = join_request("alice", 1200);
        no_langs.languages = HashSet::new();
        assert!(service.join_queue(no_langs).await.is_err());

        let mut private = join_request("alice", 1200);
        private.battle_type = BattleType::Private;
        assert!(service.join_queue(private).await.is_err());
    }

    #[tokio::test]
    async fn test_double_join_conflicts_across_battle_types() {
        let (service, _) = test_service();

        service.join_queue(join_request("alice", 1200)).await.unwrap();

        let mut ranked = join_request("alice", 1200);
        ranked.battle_type = BattleType::Ranked;
        let err = service.join_queue(ranked).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BattleError>().unwrap(),
            BattleError::Conflict { .. }
        ));
        assert_eq!(service.queue_manager().waiting_count(), 1);
    }

    #[tokio::test]
    async fn test_full_battle_lifecycle_with_winner() {
        let (service, publisher) = test_service();

        service.join_queue(join_request("alice", 1200)).await.unwrap();
        let matched = service.join_queue(join_request("bob", 1220)).await.unwrap();
        let battle_id = matched.battle_id.unwrap();

        let snapshot = service.battle_snapshot(battle_id).await.unwrap();
        assert_eq!(snapshot.state, BattleState::Active);

        let response = service
            .submit_code(SubmitCodeRequest {
                player_id: "bob".to_string(),
                battle_id,
                code: "function solve() {}".to_string(),
                language: "javascript".to_string(),
            })
            .await
            .unwrap();

        assert!(response.all_passed);
        assert_eq!(response.winner.as_deref(), Some("bob"));

        let snapshot = service.battle_snapshot(battle_id).await.unwrap();
        assert_eq!(snapshot.state, BattleState::Completed);
        assert_eq!(snapshot.winner.as_deref(), Some("bob"));
        assert_eq!(publisher.count_events_of_type("battle-ended"), 2);
    }

    #[tokio::test]
    async fn test_resubmission_does_not_change_winner() {
        let (service, _) = test_service();

        service.join_queue(join_request("alice", 1200)).await.unwrap();
        let matched = service.join_queue(join_request("bob", 1220)).await.unwrap();
        let battle_id = matched.battle_id.unwrap();

        let submit = SubmitCodeRequest {
            player_id: "bob".to_string(),
            battle_id,
            code: "function solve() {}".to_string(),
            language: "javascript".to_string(),
        };
        let first = service.submit_code(submit.clone()).await.unwrap();
        assert_eq!(first.winner.as_deref(), Some("bob"));

        let replay = service.submit_code(submit).await.unwrap();
        assert!(replay.all_passed);
        assert_eq!(replay.winner.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_battle_running() {
        let (service, _) = test_service();

        service.join_queue(join_request("alice", 1200)).await.unwrap();
        let matched = service.join_queue(join_request("bob", 1220)).await.unwrap();
        let battle_id = matched.battle_id.unwrap();

        let response = service
            .submit_code(SubmitCodeRequest {
                player_id: "bob".to_string(),
                battle_id,
                code: "wrong answer".to_string(),
                language: "javascript".to_string(),
            })
            .await
            .unwrap();

        assert!(!response.all_passed);
        assert!(response.winner.is_none());
        let snapshot = service.battle_snapshot(battle_id).await.unwrap();
        assert_eq!(snapshot.state, BattleState::Active);
    }

    #[tokio::test]
    async fn test_hidden_case_details_redacted_in_response() {
        let (service, _) = test_service();

        service.join_queue(join_request("alice", 1200)).await.unwrap();
        let matched = service.join_queue(join_request("bob", 1220)).await.unwrap();

        let response = service
            .submit_code(SubmitCodeRequest {
                player_id: "bob".to_string(),
                battle_id: matched.battle_id.unwrap(),
                code: "function solve() {}".to_string(),
                language: "javascript".to_string(),
            })
            .await
            .unwrap();

        let hidden: Vec<_> = response.test_results.iter().filter(|r| r.hidden).collect();
        assert!(!hidden.is_empty());
        assert!(hidden.iter().all(|r| r.input.is_empty()));
    }

    #[tokio::test]
    async fn test_provisioning_failure_dissolves_room() {
        let (service, publisher) = service_with(Arc::new(MockChallengeProvider::failing()));

        service.join_queue(join_request("alice", 1200)).await.unwrap();
        let err = service
            .join_queue(join_request("bob", 1220))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BattleError>().unwrap(),
            BattleError::Provisioning { .. }
        ));
        assert_eq!(service.registry().active_count(), 0);
        // Both participants were told the room is gone
        assert_eq!(publisher.count_events_of_type("battle-ended"), 2);
        // Neither is re-queued automatically
        assert_eq!(service.queue_manager().waiting_count(), 0);
    }

    #[tokio::test]
    async fn test_private_battle_lifecycle() {
        let (service, publisher) = test_service();

        let created = service
            .create_private_battle(CreatePrivateBattleRequest {
                player_id: "host".to_string(),
                display_name: "Host".to_string(),
                skill_level: 5,
                rating: 1400,
                languages: languages(&["rust"]),
            })
            .unwrap();

        assert_eq!(created.invite_code.len(), 8);
        assert_eq!(
            service.resolve_invite_code(&created.invite_code).unwrap(),
            created.battle_id
        );

        let snapshot = service.battle_snapshot(created.battle_id).await.unwrap();
        assert_eq!(snapshot.state, BattleState::Waiting);

        let joined = service
            .join_private_battle(JoinPrivateBattleRequest {
                player_id: "guest".to_string(),
                display_name: "Guest".to_string(),
                battle_id: created.battle_id,
                skill_level: 5,
                rating: 1450,
            })
            .await
            .unwrap();
        assert!(joined.success);

        let snapshot = service.battle_snapshot(created.battle_id).await.unwrap();
        assert_eq!(snapshot.state, BattleState::Active);
        assert_eq!(publisher.count_events_of_type("battle-matched"), 2);

        // Third join is rejected without side effects
        let err = service
            .join_private_battle(JoinPrivateBattleRequest {
                player_id: "gate_crasher".to_string(),
                display_name: "Crash".to_string(),
                battle_id: created.battle_id,
                skill_level: 5,
                rating: 1500,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BattleError>().unwrap(),
            BattleError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_private_join_conflicts() {
        let (service, _) = test_service();

        let created = service
            .create_private_battle(CreatePrivateBattleRequest {
                player_id: "host".to_string(),
                display_name: "Host".to_string(),
                skill_level: 5,
                rating: 1400,
                languages: languages(&["rust"]),
            })
            .unwrap();

        let err = service
            .join_private_battle(JoinPrivateBattleRequest {
                player_id: "host".to_string(),
                display_name: "Host".to_string(),
                battle_id: created.battle_id,
                skill_level: 5,
                rating: 1400,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BattleError>().unwrap(),
            BattleError::Conflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_leave_queue_is_idempotent() {
        let (service, _) = test_service();

        service.join_queue(join_request("alice", 1200)).await.unwrap();
        assert!(service
            .leave_queue("alice", BattleType::Quick)
            .unwrap()
            .success);
        assert!(service
            .leave_queue("alice", BattleType::Quick)
            .unwrap()
            .success);
        assert!(!service.queue_status("alice").unwrap().in_queue);
    }

    #[tokio::test]
    async fn test_queue_status_reports_position() {
        let (service, _) = test_service();

        // Incompatible entries stack up
        let mut low = join_request("low", 100);
        low.skill_level = 1;
        low.languages = languages(&["cobol"]);
        service.join_queue(low).await.unwrap();

        let mut high = join_request("high", 3900);
        high.skill_level = 10;
        high.languages = languages(&["rust"]);
        service.join_queue(high).await.unwrap();

        let status = service.queue_status("high").unwrap();
        assert!(status.in_queue);
        assert_eq!(status.battle_type, Some(BattleType::Quick));
        assert_eq!(status.position, Some(2));
        assert_eq!(status.estimated_wait_seconds, Some(60));
    }

    #[tokio::test]
    async fn test_forfeit_hands_battle_to_opponent() {
        let (service, publisher) = test_service();

        service.join_queue(join_request("alice", 1200)).await.unwrap();
        let matched = service.join_queue(join_request("bob", 1220)).await.unwrap();
        let battle_id = matched.battle_id.unwrap();

        service.forfeit("alice", battle_id).await.unwrap();

        let snapshot = service.battle_snapshot(battle_id).await.unwrap();
        assert_eq!(snapshot.state, BattleState::Completed);
        assert_eq!(snapshot.winner.as_deref(), Some("bob"));
        assert_eq!(publisher.count_events_of_type("battle-ended"), 2);
    }

    #[tokio::test]
    async fn test_submission_to_unknown_battle_is_not_found() {
        let (service, _) = test_service();

        let err = service
            .submit_code(SubmitCodeRequest {
                player_id: "alice".to_string(),
                battle_id: crate::utils::generate_battle_id(),
                code: "function solve() {}".to_string(),
                language: "javascript".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BattleError>().unwrap(),
            BattleError::NotFound { .. }
        ));
    }
}
