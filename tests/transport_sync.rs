//! Dual-transport synchronization integration tests
//!
//! Exercise the client orchestrator against a live in-process service:
//! push mode, degradation to polling, and submission through either
//! transport with identical semantics.

mod fixtures;

use code_clash::error::BattleError;
use code_clash::events::ServerEvent;
use code_clash::transport::orchestrator::ClientUpdate;
use code_clash::transport::poll::PollApi;
use code_clash::transport::push::PushChannel;
use code_clash::transport::{TransportMode, TransportOrchestrator};
use code_clash::types::{BattleState, PlayerId, SubmitCodeRequest, SubmitCodeResponse};
use code_clash::utils::current_timestamp;
use fixtures::{build_system, join_request};
use std::sync::Arc;
use std::time::Duration;

/// Push channel that refuses every connection attempt
struct DownPushChannel;

#[async_trait::async_trait]
impl PushChannel for DownPushChannel {
    async fn connect(
        &self,
        _player_id: &PlayerId,
    ) -> code_clash::error::Result<tokio::sync::mpsc::Receiver<ServerEvent>> {
        Err(BattleError::Transport {
            message: "connection refused".to_string(),
        }
        .into())
    }

    async fn submit_code(
        &self,
        _request: SubmitCodeRequest,
    ) -> code_clash::error::Result<SubmitCodeResponse> {
        Err(BattleError::Transport {
            message: "not connected".to_string(),
        }
        .into())
    }
}

#[tokio::test]
async fn test_push_mode_delivers_match_and_result_events() {
    let system = build_system();
    let service = system.service.clone();

    let mut alice = system.orchestrator_for("alice");
    alice.connect().await;
    assert_eq!(alice.mode(), TransportMode::Push);

    service
        .join_queue(join_request("alice", 1200, 5, &["javascript"]))
        .await
        .unwrap();

    match alice.next_update().await.unwrap() {
        ClientUpdate::Event(ServerEvent::QueueJoined { position }) => assert_eq!(position, 1),
        other => panic!("expected queue-joined, got {:?}", other),
    }

    service
        .join_queue(join_request("bob", 1220, 5, &["javascript"]))
        .await
        .unwrap();

    match alice.next_update().await.unwrap() {
        ClientUpdate::Event(ServerEvent::BattleMatched {
            opponent,
            time_limit_ms,
            ..
        }) => {
            assert_eq!(opponent.player_id, "bob");
            assert!(time_limit_ms >= 1000);
        }
        other => panic!("expected battle-matched, got {:?}", other),
    }

    // The matched event seeded an authoritative snapshot for the countdown
    let snapshot = alice.current_snapshot().expect("seeded snapshot");
    assert_eq!(snapshot.state, BattleState::Active);
    assert!(alice.time_remaining_seconds(current_timestamp()).is_some());

    // Submitting over the push transport closes the battle
    let response = alice
        .submit_code(
            "function solve(input) { return input; }".to_string(),
            "javascript".to_string(),
        )
        .await
        .unwrap();
    assert!(response.all_passed);
    assert_eq!(response.winner.as_deref(), Some("alice"));

    match alice.next_update().await.unwrap() {
        ClientUpdate::Event(ServerEvent::CodeResult { all_passed, .. }) => assert!(all_passed),
        other => panic!("expected code-result, got {:?}", other),
    }
    match alice.next_update().await.unwrap() {
        ClientUpdate::Event(ServerEvent::BattleEnded { winner }) => {
            assert_eq!(winner.as_deref(), Some("alice"))
        }
        other => panic!("expected battle-ended, got {:?}", other),
    }
}

#[tokio::test]
async fn test_push_drop_mid_battle_degrades_to_poll() {
    let system = build_system();
    let service = system.service.clone();

    let mut bob = system.orchestrator_for("bob");
    bob.connect().await;
    assert_eq!(bob.mode(), TransportMode::Push);

    service
        .join_queue(join_request("alice", 1200, 5, &["javascript"]))
        .await
        .unwrap();
    service
        .join_queue(join_request("bob", 1220, 5, &["javascript"]))
        .await
        .unwrap();

    // Consume the battle-matched event in push mode
    match bob.next_update().await.unwrap() {
        ClientUpdate::Event(ServerEvent::BattleMatched { .. }) => {}
        other => panic!("expected battle-matched, got {:?}", other),
    }
    let battle_id = bob.battle_id().unwrap();

    // The server drops the push stream mid-battle
    system.publisher.unsubscribe(&"bob".to_string());

    // The orchestrator degrades to polling and keeps reflecting the room
    match bob.next_update().await.unwrap() {
        ClientUpdate::Snapshot(snapshot) => {
            assert_eq!(snapshot.battle_id, battle_id);
            assert_eq!(snapshot.state, BattleState::Active);
        }
        other => panic!("expected poll snapshot, got {:?}", other),
    }
    assert_eq!(bob.mode(), TransportMode::Poll);
    assert!(bob.connection_state().reconnect_attempts >= 1);

    // Submission over the poll transport is the same logical operation
    let response = bob
        .submit_code(
            "function solve(input) { return input; }".to_string(),
            "javascript".to_string(),
        )
        .await
        .unwrap();
    assert!(response.all_passed);
    assert_eq!(response.winner.as_deref(), Some("bob"));

    // Resubmitting identical code is a no-op, not a duplicate win
    let replay = bob
        .submit_code(
            "function solve(input) { return input; }".to_string(),
            "javascript".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(replay.winner.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_poll_only_client_discovers_battle() {
    let system = build_system();
    let service = system.service.clone();

    // Push refused outright: the orchestrator starts polling immediately
    let mut alice = TransportOrchestrator::new(
        "alice".to_string(),
        Arc::new(DownPushChannel),
        Arc::new(code_clash::transport::LocalPollApi::new(service.clone())),
        system.transport_settings.clone(),
    );
    alice.connect().await;
    assert_eq!(alice.mode(), TransportMode::Poll);

    service
        .join_queue(join_request("alice", 1200, 5, &["javascript"]))
        .await
        .unwrap();
    service
        .join_queue(join_request("bob", 1220, 5, &["javascript"]))
        .await
        .unwrap();

    // Without any battle id, the poll loop discovers the player's battle
    let update = tokio::time::timeout(Duration::from_secs(2), alice.next_update())
        .await
        .expect("poll loop should deliver a snapshot");
    match update.unwrap() {
        ClientUpdate::Snapshot(snapshot) => {
            assert_eq!(snapshot.state, BattleState::Active);
            assert!(snapshot
                .participants
                .iter()
                .any(|p| p.player_id == "alice"));
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_poll_reconciliation_is_full_replacement() {
    let system = build_system();
    let service = system.service.clone();

    service
        .join_queue(join_request("alice", 1200, 5, &["javascript"]))
        .await
        .unwrap();
    let matched = service
        .join_queue(join_request("bob", 1220, 5, &["javascript"]))
        .await
        .unwrap();
    let battle_id = matched.battle_id.unwrap();

    let api = code_clash::transport::LocalPollApi::new(service.clone());
    let first = api.fetch_snapshot(battle_id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let second = api.fetch_snapshot(battle_id).await.unwrap();

    // Authoritative countdown comes from created_at + time_limit, so two
    // fetches straddling a second differ accordingly
    assert!(second.time_remaining_seconds <= first.time_remaining_seconds);
    assert_eq!(first.battle_id, second.battle_id);
    assert_eq!(first.created_at, second.created_at);
}
