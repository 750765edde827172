//! Battle room state machine
//!
//! This module contains the core room logic: participants, the
//! waiting/active/finishing/completed lifecycle, winner fixing and the
//! authoritative time-remaining derivation. Every method that depends on
//! time takes `now` explicitly so transitions stay deterministic and
//! testable.

use crate::battle::provider::BattleTypeConfig;
use crate::error::{BattleError, Result};
use crate::types::{
    BattleId, BattleSnapshot, BattleState, BattleType, Challenge, Language, Participant, PlayerId,
    TestCaseResult,
};
use crate::utils::{elapsed_seconds, generate_battle_id, invite_code_for};
use chrono::{DateTime, Duration, Utc};

/// What a recorded submission did to the room
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub all_passed: bool,
    /// New state if the submission caused a transition
    pub transitioned_to: Option<BattleState>,
    /// Fixed winner, present once the room is completed
    pub winner: Option<PlayerId>,
    /// True when the participant had already completed and nothing changed
    pub already_recorded: bool,
}

/// One battle room and its state machine
#[derive(Debug, Clone)]
pub struct BattleRoom {
    id: BattleId,
    invite_code: String,
    battle_type: BattleType,
    capacity: usize,
    grace_window_seconds: u64,
    participants: Vec<Participant>,
    challenge: Option<Challenge>,
    state: BattleState,
    created_at: DateTime<Utc>,
    time_limit_seconds: u64,
    grace_deadline: Option<DateTime<Utc>>,
    winner: Option<PlayerId>,
    /// Time remaining captured at the terminal transition
    frozen_remaining: Option<u64>,
    completed_at: Option<DateTime<Utc>>,
}

impl BattleRoom {
    /// Create a room for a matched pair, waiting for challenge provisioning
    pub fn new_matched(
        config: &BattleTypeConfig,
        participants: Vec<Participant>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = generate_battle_id();
        Self {
            id,
            invite_code: invite_code_for(&id),
            battle_type: config.battle_type,
            capacity: config.capacity,
            grace_window_seconds: config.grace_window_seconds,
            participants,
            challenge: None,
            state: BattleState::Waiting,
            created_at: now,
            time_limit_seconds: config.time_limit_seconds,
            grace_deadline: None,
            winner: None,
            frozen_remaining: None,
            completed_at: None,
        }
    }

    /// Create a private room with only its host; it grows to capacity
    /// exactly once via invite-code joins
    pub fn new_private(config: &BattleTypeConfig, host: Participant, now: DateTime<Utc>) -> Self {
        Self::new_matched(config, vec![host], now)
    }

    pub fn id(&self) -> BattleId {
        self.id
    }

    pub fn invite_code(&self) -> &str {
        &self.invite_code
    }

    pub fn battle_type(&self) -> BattleType {
        self.battle_type
    }

    pub fn state(&self) -> BattleState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn time_limit_seconds(&self) -> u64 {
        self.time_limit_seconds
    }

    pub fn winner(&self) -> Option<&PlayerId> {
        self.winner.as_ref()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, player_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.player_id == player_id)
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity
    }

    pub fn grace_deadline(&self) -> Option<DateTime<Utc>> {
        self.grace_deadline
    }

    /// Instant at which the authoritative countdown reaches zero
    pub fn expiry_deadline(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.time_limit_seconds as i64)
    }

    /// Authoritative time remaining.
    ///
    /// Always derived from `created_at + time_limit`, never from an
    /// accumulated decrement; non-increasing while the room is running and
    /// frozen in the waiting and completed states.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            BattleState::Waiting => self.time_limit_seconds,
            BattleState::Active | BattleState::Finishing => self
                .time_limit_seconds
                .saturating_sub(elapsed_seconds(self.created_at, now)),
            BattleState::Completed => self.frozen_remaining.unwrap_or(0),
        }
    }

    /// Add a participant to a waiting room.
    ///
    /// Rooms past `waiting` reject joins; duplicates and full rooms are
    /// conflicts. Returns true when the join made the room ready to start.
    pub fn add_participant(&mut self, participant: Participant) -> Result<bool> {
        if self.state != BattleState::Waiting {
            return Err(BattleError::InvalidState {
                battle_id: self.id.to_string(),
                state: self.state.to_string(),
                operation: "join".to_string(),
            }
            .into());
        }

        if self.participant(&participant.player_id).is_some() {
            return Err(BattleError::Conflict {
                reason: format!(
                    "Player {} is already a participant of battle {}",
                    participant.player_id, self.id
                ),
            }
            .into());
        }

        if self.is_full() {
            return Err(BattleError::Conflict {
                reason: format!("Battle {} is already at capacity", self.id),
            }
            .into());
        }

        self.participants.push(participant);

        if self.is_full() && self.challenge.is_some() {
            self.state = BattleState::Active;
        }
        Ok(self.state == BattleState::Active)
    }

    /// Attach the provisioned challenge; transitions to `active` once the
    /// room is at start capacity. Returns true on activation.
    pub fn attach_challenge(&mut self, challenge: Challenge) -> Result<bool> {
        if self.state != BattleState::Waiting {
            return Err(BattleError::InvalidState {
                battle_id: self.id.to_string(),
                state: self.state.to_string(),
                operation: "attach_challenge".to_string(),
            }
            .into());
        }
        if self.challenge.is_some() {
            return Err(BattleError::Conflict {
                reason: format!("Battle {} already has a challenge", self.id),
            }
            .into());
        }

        self.time_limit_seconds = challenge.time_limit_seconds;
        self.challenge = Some(challenge);

        if self.is_full() {
            self.state = BattleState::Active;
        }
        Ok(self.state == BattleState::Active)
    }

    /// Check that a submission by this player is currently legal
    pub fn ensure_submittable(&self, player_id: &str) -> Result<()> {
        if !matches!(self.state, BattleState::Active | BattleState::Finishing) {
            return Err(BattleError::InvalidState {
                battle_id: self.id.to_string(),
                state: self.state.to_string(),
                operation: "submit_code".to_string(),
            }
            .into());
        }
        if self.participant(player_id).is_none() {
            return Err(BattleError::NotFound {
                resource: format!("participant {} in battle {}", player_id, self.id),
            }
            .into());
        }
        Ok(())
    }

    /// Record a graded submission and apply any resulting transition.
    ///
    /// Idempotent for participants who already completed: their recorded
    /// result and the fixed winner never change.
    pub fn record_submission(
        &mut self,
        player_id: &str,
        code: String,
        language: Language,
        results: &[TestCaseResult],
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome> {
        self.ensure_submittable(player_id)?;

        let index = self
            .participants
            .iter()
            .position(|p| p.player_id == player_id)
            .expect("participant checked above");

        if self.participants[index].completed {
            return Ok(SubmissionOutcome {
                all_passed: true,
                transitioned_to: None,
                winner: self.winner.clone(),
                already_recorded: true,
            });
        }

        let all_passed = !results.is_empty() && results.iter().all(|r| r.passed);
        let passed_count = results.iter().filter(|r| r.passed).count() as u32;

        {
            let participant = &mut self.participants[index];
            participant.code = Some(code);
            participant.language = Some(language);
            participant.tests_passed = passed_count;
            if all_passed {
                participant.completed = true;
                participant.completed_at = Some(now);
            }
        }

        if !all_passed {
            return Ok(SubmissionOutcome {
                all_passed: false,
                transitioned_to: None,
                winner: None,
                already_recorded: false,
            });
        }

        let mut transitioned_to = None;
        if self.state == BattleState::Active {
            self.state = BattleState::Finishing;
            self.grace_deadline =
                Some(now + Duration::seconds(self.grace_window_seconds as i64));
            transitioned_to = Some(BattleState::Finishing);
        }

        if self.grace_window_seconds == 0 || self.all_contenders_completed() {
            self.finalize(now);
            transitioned_to = Some(BattleState::Completed);
        }

        Ok(SubmissionOutcome {
            all_passed: true,
            transitioned_to,
            winner: self.winner.clone(),
            already_recorded: false,
        })
    }

    /// Apply time-based transitions: grace-window elapse and timer expiry.
    ///
    /// Returns the new state when a transition fired.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<BattleState> {
        match self.state {
            BattleState::Active => {
                if now >= self.expiry_deadline() {
                    self.finalize(now);
                    return Some(BattleState::Completed);
                }
                None
            }
            BattleState::Finishing => {
                let grace_elapsed = self.grace_deadline.is_some_and(|d| now >= d);
                if grace_elapsed || now >= self.expiry_deadline() {
                    self.finalize(now);
                    return Some(BattleState::Completed);
                }
                None
            }
            BattleState::Waiting | BattleState::Completed => None,
        }
    }

    /// Record a forfeit.
    ///
    /// The participant stays in the room, flagged. When at most one
    /// contender remains the room completes; a lone remaining contender
    /// wins by default.
    pub fn forfeit(&mut self, player_id: &str, now: DateTime<Utc>) -> Result<Option<BattleState>> {
        if self.state == BattleState::Completed {
            return Err(BattleError::InvalidState {
                battle_id: self.id.to_string(),
                state: self.state.to_string(),
                operation: "forfeit".to_string(),
            }
            .into());
        }

        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.player_id == player_id)
            .ok_or_else(|| BattleError::NotFound {
                resource: format!("participant {} in battle {}", player_id, self.id),
            })?;

        if participant.forfeited {
            return Ok(None);
        }
        participant.forfeited = true;

        let contenders = self
            .participants
            .iter()
            .filter(|p| !p.forfeited)
            .count();
        if contenders <= 1 {
            self.finalize(now);
            return Ok(Some(BattleState::Completed));
        }
        Ok(None)
    }

    /// Fix the terminal state: winner, frozen countdown, completion time.
    ///
    /// The winner is the earliest full completion; with no completions, a
    /// sole remaining contender wins by default, otherwise no winner is
    /// recorded.
    fn finalize(&mut self, now: DateTime<Utc>) {
        self.winner = self
            .participants
            .iter()
            .filter(|p| p.completed && !p.forfeited)
            .min_by_key(|p| p.completed_at)
            .map(|p| p.player_id.clone())
            .or_else(|| {
                let contenders: Vec<_> = self
                    .participants
                    .iter()
                    .filter(|p| !p.forfeited)
                    .collect();
                if contenders.len() == 1 && self.participants.len() > 1 {
                    Some(contenders[0].player_id.clone())
                } else {
                    None
                }
            });

        self.frozen_remaining = Some(
            self.time_limit_seconds
                .saturating_sub(elapsed_seconds(self.created_at, now)),
        );
        self.state = BattleState::Completed;
        self.completed_at = Some(now);
    }

    fn all_contenders_completed(&self) -> bool {
        self.participants
            .iter()
            .filter(|p| !p.forfeited)
            .all(|p| p.completed)
    }

    /// Whether the room is due for removal
    pub fn should_cleanup(
        &self,
        now: DateTime<Utc>,
        retention_seconds: u64,
        waiting_ttl_seconds: u64,
    ) -> bool {
        match self.state {
            BattleState::Completed => self
                .completed_at
                .is_some_and(|at| elapsed_seconds(at, now) >= retention_seconds),
            BattleState::Waiting => elapsed_seconds(self.created_at, now) >= waiting_ttl_seconds,
            _ => false,
        }
    }

    /// Authoritative, fully reconstructible view of the room
    pub fn snapshot(&self, now: DateTime<Utc>) -> BattleSnapshot {
        BattleSnapshot {
            battle_id: self.id,
            invite_code: self.invite_code.clone(),
            battle_type: self.battle_type,
            participants: self.participants.clone(),
            challenge: self.challenge.as_ref().map(Challenge::client_view),
            state: self.state,
            created_at: self.created_at,
            time_limit_seconds: self.time_limit_seconds,
            time_remaining_seconds: self.remaining_seconds(now),
            winner: self.winner.clone(),
        }
    }
}
