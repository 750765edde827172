//! Test fixtures and mock implementations for integration testing
#![allow(dead_code)]

use async_trait::async_trait;
use code_clash::battle::provider::StaticBattleTypeProvider;
use code_clash::battle::registry::BattleRoomRegistry;
use code_clash::challenge::executor::{CodeExecutor, MockCodeExecutor};
use code_clash::challenge::provider::{ChallengeProvider, ChallengeRequest, StaticChallengeProvider};
use code_clash::config::{MatchmakingSettings, TransportSettings};
use code_clash::error::Result;
use code_clash::events::publisher::ChannelEventPublisher;
use code_clash::matching::queue::{MatchingConfig, QueueManager};
use code_clash::matching::scorer::WeightedMatchScorer;
use code_clash::metrics::MetricsCollector;
use code_clash::service::MatchmakingService;
use code_clash::timer::TimerService;
use code_clash::transport::{LocalPollApi, LocalPushChannel, TransportOrchestrator};
use code_clash::types::{
    BattleId, BattleType, Challenge, Difficulty, JoinQueueRequest, TestCase,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A fully wired in-process system under test
pub struct TestSystem {
    pub service: Arc<MatchmakingService>,
    pub publisher: Arc<ChannelEventPublisher>,
    pub timers: Arc<TimerService>,
    pub expiry_rx: Option<mpsc::UnboundedReceiver<BattleId>>,
    pub settings: MatchmakingSettings,
    pub transport_settings: TransportSettings,
}

impl TestSystem {
    /// Build a client orchestrator wired to this system
    pub fn orchestrator_for(&self, player_id: &str) -> TransportOrchestrator {
        TransportOrchestrator::new(
            player_id.to_string(),
            Arc::new(LocalPushChannel::new(
                self.publisher.clone(),
                self.service.clone(),
            )),
            Arc::new(LocalPollApi::new(self.service.clone())),
            self.transport_settings.clone(),
        )
    }

    /// Spawn the expiry consumer so timer deadlines reach the rooms
    pub fn spawn_expiry_consumer(&mut self) -> tokio::task::JoinHandle<()> {
        let mut expiry_rx = self
            .expiry_rx
            .take()
            .expect("expiry consumer already spawned");
        let service = self.service.clone();
        tokio::spawn(async move {
            while let Some(battle_id) = expiry_rx.recv().await {
                let _ = service.handle_expiry(battle_id).await;
            }
        })
    }
}

/// Build a system with the default static providers
pub fn build_system() -> TestSystem {
    build_system_with(
        Arc::new(StaticChallengeProvider::new()),
        Arc::new(MockCodeExecutor::new()),
        MatchmakingSettings::default(),
    )
}

/// Build a system with custom provisioning, grading and settings
pub fn build_system_with(
    challenges: Arc<dyn ChallengeProvider>,
    executor: Arc<dyn CodeExecutor>,
    settings: MatchmakingSettings,
) -> TestSystem {
    let transport_settings = TransportSettings {
        push_connect_timeout_seconds: 1,
        poll_interval_ms: 20,
        max_reconnect_attempts: 3,
        event_buffer_size: 64,
    };
    let publisher = Arc::new(ChannelEventPublisher::new(
        transport_settings.event_buffer_size,
    ));
    let (timers, expiry_rx) = TimerService::new();
    let timers = Arc::new(timers);

    let service = Arc::new(MatchmakingService::new(
        Arc::new(QueueManager::new(
            Arc::new(WeightedMatchScorer::new()),
            MatchingConfig::from(&settings),
        )),
        Arc::new(BattleRoomRegistry::new()),
        Arc::new(StaticBattleTypeProvider::new()),
        challenges,
        executor,
        publisher.clone(),
        timers.clone(),
        Arc::new(MetricsCollector::new().expect("metrics collector")),
        settings.clone(),
    ));

    TestSystem {
        service,
        publisher,
        timers,
        expiry_rx: Some(expiry_rx),
        settings,
        transport_settings,
    }
}

/// A join request with sensible defaults
pub fn join_request(id: &str, rating: i64, level: u32, langs: &[&str]) -> JoinQueueRequest {
    JoinQueueRequest {
        player_id: id.to_string(),
        display_name: id.to_string(),
        battle_type: BattleType::Quick,
        skill_level: level,
        rating,
        languages: langs.iter().map(|l| l.to_string()).collect::<HashSet<_>>(),
    }
}

/// Challenge provider serving a fixed challenge with a short time limit
pub struct ShortFuseChallengeProvider {
    pub time_limit_seconds: u64,
}

#[async_trait]
impl ChallengeProvider for ShortFuseChallengeProvider {
    async fn fetch_challenge(&self, request: ChallengeRequest) -> Result<Challenge> {
        let mut starter_code = HashMap::new();
        starter_code.insert(
            "javascript".to_string(),
            "function solve(input) {}\n".to_string(),
        );
        Ok(Challenge {
            id: Uuid::new_v4(),
            title: "Short Fuse".to_string(),
            description: "Echo the input before the clock runs out.".to_string(),
            difficulty: request.difficulty_override.unwrap_or(Difficulty::Easy),
            test_cases: vec![
                TestCase {
                    input: "x".to_string(),
                    expected_output: "x".to_string(),
                    hidden: false,
                },
                TestCase {
                    input: "y".to_string(),
                    expected_output: "y".to_string(),
                    hidden: true,
                },
            ],
            starter_code,
            time_limit_seconds: self.time_limit_seconds,
        })
    }
}

/// Challenge provider that never answers, for provisioning-timeout tests
pub struct StalledChallengeProvider;

#[async_trait]
impl ChallengeProvider for StalledChallengeProvider {
    async fn fetch_challenge(&self, _request: ChallengeRequest) -> Result<Challenge> {
        std::future::pending().await
    }
}
