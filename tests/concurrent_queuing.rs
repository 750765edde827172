//! Concurrency tests for queue and room coordination
//!
//! Joins against one battle type are serialized behind its queue lock, so
//! no two concurrent accepts may consume the same entry; queues of
//! different battle types and distinct rooms proceed independently.

mod fixtures;

use code_clash::types::BattleType;
use fixtures::{build_system, join_request};
use std::collections::HashSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_double_match() {
    let system = build_system();
    let service = system.service.clone();

    let total = 20;
    let mut handles = Vec::new();
    for i in 0..total {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            // All mutually compatible: same level, close ratings, shared language
            service
                .join_queue(join_request(
                    &format!("player_{}", i),
                    1500 + (i as i64 % 4) * 10,
                    5,
                    &["javascript"],
                ))
                .await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let mut matched = 0;
    for result in results {
        if result.unwrap().unwrap().matched {
            matched += 1;
        }
    }

    // Every match consumed exactly two entries
    let waiting = service.queue_manager().waiting_count();
    assert_eq!(matched * 2 + waiting, total);
    assert_eq!(service.registry().active_count(), matched);

    // No player appears in two rooms
    let mut seen: HashSet<String> = HashSet::new();
    for battle_id in service.registry().battle_ids() {
        let snapshot = service.battle_snapshot(battle_id).await.unwrap();
        assert_eq!(snapshot.participants.len(), 2);
        for participant in snapshot.participants {
            assert!(
                seen.insert(participant.player_id.clone()),
                "player {} is in more than one room",
                participant.player_id
            );
        }
    }
    assert_eq!(seen.len(), matched * 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_across_battle_types() {
    let system = build_system();
    let service = system.service.clone();

    let mut handles = Vec::new();
    for i in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let mut request =
                join_request(&format!("quick_{}", i), 1500, 5, &["javascript"]);
            request.battle_type = BattleType::Quick;
            service.join_queue(request).await
        }));
    }
    for i in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let mut request =
                join_request(&format!("ranked_{}", i), 1500, 5, &["javascript"]);
            request.battle_type = BattleType::Ranked;
            service.join_queue(request).await
        }));
    }

    let results = futures::future::join_all(handles).await;
    for result in results {
        result.unwrap().unwrap();
    }

    // Pools never mix: every room holds players from a single battle type
    for battle_id in service.registry().battle_ids() {
        let snapshot = service.battle_snapshot(battle_id).await.unwrap();
        let prefix = match snapshot.battle_type {
            BattleType::Quick => "quick_",
            BattleType::Ranked => "ranked_",
            BattleType::Private => panic!("no private battles were created"),
        };
        assert!(snapshot
            .participants
            .iter()
            .all(|p| p.player_id.starts_with(prefix)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_joins_yield_one_entry() {
    let system = build_system();
    let service = system.service.clone();

    // The same candidate races itself into one queue
    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .join_queue(join_request("racer", 9999, 10, &["zig"]))
                .await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let successes = results
        .into_iter()
        .filter(|r| r.as_ref().unwrap().is_ok())
        .count();

    assert_eq!(successes, 1, "exactly one concurrent join may win");
    assert_eq!(service.queue_manager().waiting_count(), 1);
}
