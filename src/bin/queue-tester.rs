//! Queue Tester CLI Tool
//!
//! Command-line tool for exercising the matchmaking and battle flow against
//! an in-process service instance.
//!
//! Usage:
//!   cargo run --bin queue-tester -- --help
//!   cargo run --bin queue-tester run-scenario --scenario two-player
//!   cargo run --bin queue-tester run-all-scenarios
//!   cargo run --bin queue-tester simulate --players 10

use anyhow::Result;
use clap::{Parser, Subcommand};
use code_clash::config::AppConfig;
use code_clash::service::AppState;
use code_clash::transport::{ClientUpdate, TransportMode};
use code_clash::types::{
    BattleState, BattleType, CreatePrivateBattleRequest, JoinPrivateBattleRequest,
    JoinQueueRequest, SubmitCodeRequest,
};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "queue-tester")]
#[command(about = "Scenario driver for the code-clash matchmaking service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a predefined scenario
    RunScenario {
        /// Scenario name (two-player, starvation, private, transport-fallback)
        #[arg(short, long)]
        scenario: String,
    },
    /// Run all predefined scenarios
    RunAllScenarios,
    /// Fill a queue with simulated players and report matches
    Simulate {
        /// Number of simulated players
        #[arg(short, long, default_value = "10")]
        players: usize,
    },
    /// Show service statistics after an empty startup
    Stats,
}

fn languages(names: &[&str]) -> HashSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn join_request(id: &str, rating: i64, level: u32) -> JoinQueueRequest {
    JoinQueueRequest {
        player_id: id.to_string(),
        display_name: id.to_string(),
        battle_type: BattleType::Quick,
        skill_level: level,
        rating,
        languages: languages(&["javascript"]),
    }
}

async fn new_app_state() -> Result<Arc<AppState>> {
    let app_state = Arc::new(AppState::new(AppConfig::from_env()?).await?);
    app_state.start().await?;
    Ok(app_state)
}

/// Two compatible players meet, the first submission wins
async fn scenario_two_player() -> Result<bool> {
    let app_state = new_app_state().await?;
    let service = app_state.matchmaking();

    let first = service.join_queue(join_request("alice", 1200, 5)).await?;
    println!(
        "  alice queued at position {:?} (est. wait {:?}s)",
        first.position, first.estimated_wait_seconds
    );

    let second = service.join_queue(join_request("bob", 1220, 5)).await?;
    let Some(battle_id) = second.battle_id else {
        println!("  expected a match for bob");
        return Ok(false);
    };
    println!(
        "  bob matched against {}",
        second.opponent.map(|o| o.player_id).unwrap_or_default()
    );

    let response = service
        .submit_code(SubmitCodeRequest {
            player_id: "bob".to_string(),
            battle_id,
            code: "function solve(input) { return input; }".to_string(),
            language: "javascript".to_string(),
        })
        .await?;

    let snapshot = service.battle_snapshot(battle_id).await?;
    println!(
        "  battle ended in state {} with winner {:?}",
        snapshot.state, snapshot.winner
    );

    app_state.stop().await?;
    Ok(response.all_passed && snapshot.state == BattleState::Completed)
}

/// A lone unusual candidate is rescued by the starvation fallback
async fn scenario_starvation() -> Result<bool> {
    let app_state = new_app_state().await?;
    let service = app_state.matchmaking();

    let incompatible = [
        ("patient", 100i64, 1u32),
        ("grinder", 900, 2),
        ("veteran", 2600, 9),
    ];
    for (id, rating, level) in incompatible {
        let mut request = join_request(id, rating, level);
        request.languages = languages(&[id]);
        service.join_queue(request).await?;
    }

    let mut outsider = join_request("outsider", 3900, 10);
    outsider.languages = languages(&["rust"]);
    let response = service.join_queue(outsider).await?;

    println!(
        "  outsider matched: {} (opponent {:?})",
        response.matched,
        response.opponent.as_ref().map(|o| &o.player_id)
    );

    app_state.stop().await?;
    Ok(response.matched
        && response.opponent.map(|o| o.player_id) == Some("patient".to_string()))
}

/// Private battle via invite code
async fn scenario_private() -> Result<bool> {
    let app_state = new_app_state().await?;
    let service = app_state.matchmaking();

    let created = service.create_private_battle(CreatePrivateBattleRequest {
        player_id: "host".to_string(),
        display_name: "Host".to_string(),
        skill_level: 5,
        rating: 1400,
        languages: languages(&["rust"]),
    })?;
    println!("  created private battle, invite code {}", created.invite_code);

    let battle_id = service.resolve_invite_code(&created.invite_code)?;
    service
        .join_private_battle(JoinPrivateBattleRequest {
            player_id: "guest".to_string(),
            display_name: "Guest".to_string(),
            battle_id,
            skill_level: 5,
            rating: 1450,
        })
        .await?;

    let snapshot = service.battle_snapshot(battle_id).await?;
    println!("  private battle is {}", snapshot.state);

    app_state.stop().await?;
    Ok(snapshot.state == BattleState::Active)
}

/// Client degrades from push to poll and still sees the battle
async fn scenario_transport_fallback() -> Result<bool> {
    let app_state = new_app_state().await?;
    let service = app_state.matchmaking();

    let mut client = app_state.local_orchestrator("alice".to_string());
    client.connect().await;
    println!("  alice transport mode: {:?}", client.mode());

    service.join_queue(join_request("alice", 1200, 5)).await?;
    service.join_queue(join_request("bob", 1220, 5)).await?;

    // Drain events until the client has a battle
    while client.battle_id().is_none() {
        match client.next_update().await {
            Some(ClientUpdate::Event(event)) => println!("  push event: {}", event.name()),
            Some(ClientUpdate::Snapshot(snapshot)) => {
                println!("  poll snapshot: {}", snapshot.state)
            }
            None => return Ok(false),
        }
    }

    // Server drops the push stream; client must degrade, not fail
    app_state.publisher().unsubscribe(&"alice".to_string());
    let update = client.next_update().await;
    let Some(update) = update else {
        return Ok(false);
    };
    println!("  after drop: {:?} via {:?}", update, client.mode());

    let degraded = client.mode() == TransportMode::Poll;
    app_state.stop().await?;
    Ok(degraded)
}

async fn run_scenario(name: &str) -> Result<bool> {
    match name {
        "two-player" => scenario_two_player().await,
        "starvation" => scenario_starvation().await,
        "private" => scenario_private().await,
        "transport-fallback" => scenario_transport_fallback().await,
        _ => {
            eprintln!(
                "Unknown scenario '{}'. Available: two-player, starvation, private, transport-fallback",
                name
            );
            std::process::exit(1);
        }
    }
}

async fn simulate(players: usize) -> Result<()> {
    let app_state = new_app_state().await?;
    let service = app_state.matchmaking();

    let mut matched = 0;
    for i in 0..players {
        let rating = 1000 + (i as i64 % 5) * 120;
        let level = 3 + (i as u32 % 4);
        let response = service
            .join_queue(join_request(&format!("player_{}", i), rating, level))
            .await?;
        if response.matched {
            matched += 1;
        }
    }

    let queue_stats = service.queue_manager().stats()?;
    let registry_stats = service.registry().stats()?;

    println!("Simulation of {} players:", players);
    println!("  matches made: {}", matched);
    println!("  still waiting: {}", service.queue_manager().waiting_count());
    println!("  starvation matches: {}", queue_stats.starvation_matches);
    println!("  battles created: {}", registry_stats.battles_created);

    app_state.stop().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario { scenario } => {
            println!("Running scenario: {}", scenario);
            if run_scenario(&scenario).await? {
                println!("Scenario '{}' passed", scenario);
            } else {
                println!("Scenario '{}' failed", scenario);
                std::process::exit(1);
            }
        }

        Commands::RunAllScenarios => {
            let scenarios = ["two-player", "starvation", "private", "transport-fallback"];
            let mut passed = 0;
            let mut failed = 0;

            for name in scenarios {
                println!("Running '{}' scenario...", name);
                match run_scenario(name).await {
                    Ok(true) => {
                        println!("  PASSED");
                        passed += 1;
                    }
                    Ok(false) => {
                        println!("  FAILED");
                        failed += 1;
                    }
                    Err(e) => {
                        println!("  FAILED ({})", e);
                        failed += 1;
                    }
                }
            }

            println!("\nResults: {} passed, {} failed", passed, failed);
            if failed > 0 {
                std::process::exit(1);
            }
        }

        Commands::Simulate { players } => {
            simulate(players).await?;
        }

        Commands::Stats => {
            let app_state = new_app_state().await?;
            let queue_stats = app_state.matchmaking().queue_manager().stats()?;
            let registry_stats = app_state.matchmaking().registry().stats()?;

            println!("Queue statistics:");
            println!("  players queued: {}", queue_stats.players_queued);
            println!("  matches made: {}", queue_stats.matches_made);
            println!("Battle statistics:");
            println!("  battles created: {}", registry_stats.battles_created);
            println!("  battles completed: {}", registry_stats.battles_completed);
            println!("  active battles: {}", registry_stats.active_battles);

            app_state.stop().await?;
        }
    }

    Ok(())
}
