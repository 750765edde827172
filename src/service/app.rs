//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the matchmaking
//! service together, owns the background tasks (expiry consumption, room
//! cleanup) and exposes local client construction for in-process use.

use crate::battle::provider::StaticBattleTypeProvider;
use crate::battle::registry::BattleRoomRegistry;
use crate::challenge::executor::MockCodeExecutor;
use crate::challenge::provider::StaticChallengeProvider;
use crate::config::AppConfig;
use crate::events::publisher::ChannelEventPublisher;
use crate::matching::queue::{MatchingConfig, QueueManager};
use crate::matching::scorer::WeightedMatchScorer;
use crate::metrics::health::{HealthServer, HealthServerConfig};
use crate::metrics::MetricsCollector;
use crate::service::matchmaking::MatchmakingService;
use crate::timer::{ScheduledTask, TimerService};
use crate::transport::orchestrator::TransportOrchestrator;
use crate::transport::poll::LocalPollApi;
use crate::transport::push::LocalPushChannel;
use crate::types::{BattleId, PlayerId};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{error, info};

/// Coordinates all service components and background tasks
pub struct AppState {
    config: AppConfig,
    metrics: Arc<MetricsCollector>,
    publisher: Arc<ChannelEventPublisher>,
    matchmaking: Arc<MatchmakingService>,
    running: Arc<RwLock<bool>>,
    background_tasks: Mutex<Vec<ScheduledTask>>,
    expiry_rx: Mutex<Option<mpsc::UnboundedReceiver<BattleId>>>,
    health_server: Mutex<Option<Arc<HealthServer>>>,
}

impl AppState {
    /// Construct the full component graph from configuration.
    ///
    /// The code executor is the in-process stand-in for the external
    /// sandboxed engine; deployments swap it behind the same trait.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);
        let publisher = Arc::new(ChannelEventPublisher::new(
            config.transport.event_buffer_size,
        ));
        let (timers, expiry_rx) = TimerService::new();

        let queue_manager = Arc::new(QueueManager::new(
            Arc::new(WeightedMatchScorer::new()),
            MatchingConfig::from(&config.matchmaking),
        ));

        let matchmaking = Arc::new(MatchmakingService::new(
            queue_manager,
            Arc::new(BattleRoomRegistry::new()),
            Arc::new(StaticBattleTypeProvider::new()),
            Arc::new(StaticChallengeProvider::new()),
            Arc::new(MockCodeExecutor::new()),
            publisher.clone(),
            Arc::new(timers),
            metrics.clone(),
            config.matchmaking.clone(),
        ));

        Ok(Self {
            config,
            metrics,
            publisher,
            matchmaking,
            running: Arc::new(RwLock::new(false)),
            background_tasks: Mutex::new(Vec::new()),
            expiry_rx: Mutex::new(Some(expiry_rx)),
            health_server: Mutex::new(None),
        })
    }

    /// Start background processing: timer expiry application and periodic
    /// room cleanup.
    pub async fn start(&self) -> Result<()> {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let mut tasks = self.background_tasks.lock().await;

        // Timer expiries arrive as messages; applying them is the only
        // place time-based room transitions happen server-side.
        if let Some(mut expiry_rx) = self.expiry_rx.lock().await.take() {
            let matchmaking = self.matchmaking.clone();
            let running = self.running.clone();
            tasks.push(ScheduledTask::spawn(async move {
                while let Some(battle_id) = expiry_rx.recv().await {
                    if !*running.read().await {
                        break;
                    }
                    if let Err(err) = matchmaking.handle_expiry(battle_id).await {
                        error!("Failed to apply expiry for battle {}: {}", battle_id, err);
                    }
                }
            }));
        }

        {
            let matchmaking = self.matchmaking.clone();
            let running = self.running.clone();
            let interval = self.config.cleanup_interval();
            tasks.push(ScheduledTask::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    if !*running.read().await {
                        break;
                    }
                    if let Err(err) = matchmaking.cleanup_rooms() {
                        error!("Room cleanup failed: {}", err);
                    }
                }
            }));
        }

        info!("Service components started");
        Ok(())
    }

    /// Start the HTTP monitoring server
    pub async fn start_health_server(self: &Arc<Self>) -> Result<()> {
        let server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port: self.config.service.health_port,
                    host: "0.0.0.0".to_string(),
                },
                self.metrics.clone(),
            )
            .with_app_state(self.clone()),
        );

        {
            let server = server.clone();
            let mut tasks = self.background_tasks.lock().await;
            tasks.push(ScheduledTask::spawn(async move {
                if let Err(err) = server.start().await {
                    error!("Health server error: {}", err);
                }
            }));
        }

        let mut health_server = self.health_server.lock().await;
        *health_server = Some(server);
        Ok(())
    }

    /// Stop background tasks and the monitoring server
    pub async fn stop(&self) -> Result<()> {
        {
            let mut running = self.running.write().await;
            *running = false;
        }

        if let Some(server) = self.health_server.lock().await.take() {
            server.stop().await?;
        }

        let mut tasks = self.background_tasks.lock().await;
        for task in tasks.drain(..) {
            task.cancel();
        }

        info!("Service components stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn matchmaking(&self) -> &Arc<MatchmakingService> {
        &self.matchmaking
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn publisher(&self) -> &Arc<ChannelEventPublisher> {
        &self.publisher
    }

    /// Build an in-process client orchestrator for a player, wired to the
    /// service over the same dual-transport contract a remote client uses
    pub fn local_orchestrator(&self, player_id: PlayerId) -> TransportOrchestrator {
        TransportOrchestrator::new(
            player_id,
            Arc::new(LocalPushChannel::new(
                self.publisher.clone(),
                self.matchmaking.clone(),
            )),
            Arc::new(LocalPollApi::new(self.matchmaking.clone())),
            self.config.transport.clone(),
        )
    }
}
