//! Integration tests for the code-clash matchmaking service
//!
//! These tests validate the entire system working together, including:
//! - The scored matching path for close candidates
//! - The starvation-avoidance fallback
//! - Provisioning failure dissolving the room
//! - Queue lifecycle invariants across battle types

mod fixtures;

use code_clash::challenge::executor::MockCodeExecutor;
use code_clash::challenge::provider::MockChallengeProvider;
use code_clash::config::MatchmakingSettings;
use code_clash::error::BattleError;
use code_clash::types::BattleState;
use fixtures::{build_system, build_system_with, join_request};
use std::sync::Arc;

#[tokio::test]
async fn test_close_candidates_pair_and_battle_completes() {
    let system = build_system();
    let service = &system.service;

    // Two candidates one second apart: 1200/1220, levels 5/5, javascript
    let first = service
        .join_queue(join_request("alice", 1200, 5, &["javascript"]))
        .await
        .unwrap();
    assert!(!first.matched);
    assert_eq!(first.position, Some(1));

    let second = service
        .join_queue(join_request("bob", 1220, 5, &["javascript"]))
        .await
        .unwrap();
    assert!(second.matched, "close candidates must pair");
    let battle_id = second.battle_id.unwrap();

    // Room is provisioned and active
    let snapshot = service.battle_snapshot(battle_id).await.unwrap();
    assert_eq!(snapshot.state, BattleState::Active);
    assert!(snapshot.challenge.is_some());
    assert_eq!(snapshot.participants.len(), 2);

    // First full pass wins
    let response = service
        .submit_code(code_clash::types::SubmitCodeRequest {
            player_id: "alice".to_string(),
            battle_id,
            code: "function solve(input) { return input; }".to_string(),
            language: "javascript".to_string(),
        })
        .await
        .unwrap();
    assert!(response.all_passed);
    assert_eq!(response.winner.as_deref(), Some("alice"));

    let snapshot = service.battle_snapshot(battle_id).await.unwrap();
    assert_eq!(snapshot.state, BattleState::Completed);
    assert_eq!(snapshot.winner.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_starvation_rule_matches_longest_waiting() {
    let system = build_system();
    let service = &system.service;

    // Three waiting candidates, mutually incompatible (score <= 0.3)
    for (id, rating, level, lang) in [
        ("patient", 100i64, 1u32, "cobol"),
        ("grinder", 900, 2, "fortran"),
        ("veteran", 2600, 9, "ada"),
    ] {
        let response = service
            .join_queue(join_request(id, rating, level, &[lang]))
            .await
            .unwrap();
        assert!(!response.matched, "{} should wait", id);
    }

    // Incompatible with everyone, but three others are already waiting:
    // the longest-waiting candidate is matched regardless of score
    let response = service
        .join_queue(join_request("outsider", 3900, 10, &["rust"]))
        .await
        .unwrap();
    assert!(response.matched);
    assert_eq!(
        response.opponent.map(|o| o.player_id),
        Some("patient".to_string())
    );

    let stats = service.queue_manager().stats().unwrap();
    assert_eq!(stats.starvation_matches, 1);
    assert_eq!(service.queue_manager().waiting_count(), 2);
}

#[tokio::test]
async fn test_provisioning_failure_returns_retryable_error() {
    let system = build_system_with(
        Arc::new(MockChallengeProvider::failing()),
        Arc::new(MockCodeExecutor::new()),
        MatchmakingSettings::default(),
    );
    let service = &system.service;

    service
        .join_queue(join_request("alice", 1200, 5, &["javascript"]))
        .await
        .unwrap();
    let err = service
        .join_queue(join_request("bob", 1220, 5, &["javascript"]))
        .await
        .unwrap_err();

    let battle_err = err.downcast_ref::<BattleError>().unwrap();
    assert!(matches!(battle_err, BattleError::Provisioning { .. }));
    assert!(battle_err.is_retryable());

    // Room dissolved, nobody re-queued
    assert_eq!(service.registry().active_count(), 0);
    assert_eq!(service.queue_manager().waiting_count(), 0);
}

#[tokio::test]
async fn test_provisioning_timeout_dissolves_room() {
    let settings = MatchmakingSettings {
        provision_timeout_seconds: 1,
        ..MatchmakingSettings::default()
    };
    let system = build_system_with(
        Arc::new(fixtures::StalledChallengeProvider),
        Arc::new(MockCodeExecutor::new()),
        settings,
    );
    let service = &system.service;

    service
        .join_queue(join_request("alice", 1200, 5, &["javascript"]))
        .await
        .unwrap();
    let err = service
        .join_queue(join_request("bob", 1220, 5, &["javascript"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<BattleError>().unwrap(),
        BattleError::Provisioning { .. }
    ));
    assert_eq!(service.registry().active_count(), 0);
}

#[tokio::test]
async fn test_duplicate_queue_join_leaves_queue_unchanged() {
    let system = build_system();
    let service = &system.service;

    service
        .join_queue(join_request("alice", 1500, 5, &["rust"]))
        .await
        .unwrap();
    let err = service
        .join_queue(join_request("alice", 1500, 5, &["rust"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<BattleError>().unwrap(),
        BattleError::Conflict { .. }
    ));
    assert_eq!(service.queue_manager().waiting_count(), 1);
}

#[tokio::test]
async fn test_leave_then_status_roundtrip() {
    let system = build_system();
    let service = &system.service;

    service
        .join_queue(join_request("alice", 1500, 5, &["rust"]))
        .await
        .unwrap();

    let status = service.queue_status("alice").unwrap();
    assert!(status.in_queue);
    assert_eq!(status.position, Some(1));

    // Leaving twice is a success both times
    assert!(service
        .leave_queue("alice", code_clash::types::BattleType::Quick)
        .unwrap()
        .success);
    assert!(service
        .leave_queue("alice", code_clash::types::BattleType::Quick)
        .unwrap()
        .success);

    let status = service.queue_status("alice").unwrap();
    assert!(!status.in_queue);
}

#[tokio::test]
async fn test_battle_types_keep_separate_pools() {
    let system = build_system();
    let service = &system.service;

    let mut ranked = join_request("ranked_player", 1500, 5, &["rust"]);
    ranked.battle_type = code_clash::types::BattleType::Ranked;
    service.join_queue(ranked).await.unwrap();

    // A compatible candidate in a different pool does not match
    let response = service
        .join_queue(join_request("quick_player", 1500, 5, &["rust"]))
        .await
        .unwrap();
    assert!(!response.matched);
    assert_eq!(service.queue_manager().waiting_count(), 2);
}

#[tokio::test]
async fn test_event_stream_for_full_match_flow() {
    let system = build_system();
    let service = &system.service;

    // Subscribe both players before they queue
    let mut alice_rx = system.publisher.subscribe(&"alice".to_string()).unwrap();
    let mut bob_rx = system.publisher.subscribe(&"bob".to_string()).unwrap();

    service
        .join_queue(join_request("alice", 1200, 5, &["javascript"]))
        .await
        .unwrap();
    let matched = service
        .join_queue(join_request("bob", 1220, 5, &["javascript"]))
        .await
        .unwrap();

    // Waiting player got its queue position, then the match
    let event = alice_rx.recv().await.unwrap();
    assert_eq!(event.name(), "queue-joined");
    let event = alice_rx.recv().await.unwrap();
    assert_eq!(event.name(), "battle-matched");

    // The triggering player only sees the match event
    let event = bob_rx.recv().await.unwrap();
    assert_eq!(event.name(), "battle-matched");

    service
        .submit_code(code_clash::types::SubmitCodeRequest {
            player_id: "bob".to_string(),
            battle_id: matched.battle_id.unwrap(),
            code: "function solve(input) { return input; }".to_string(),
            language: "javascript".to_string(),
        })
        .await
        .unwrap();

    let event = bob_rx.recv().await.unwrap();
    assert_eq!(event.name(), "code-result");
    let event = bob_rx.recv().await.unwrap();
    assert_eq!(event.name(), "battle-ended");
    let event = alice_rx.recv().await.unwrap();
    assert_eq!(event.name(), "battle-ended");
}
