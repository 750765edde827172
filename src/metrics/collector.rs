//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the code-clash battle
//! orchestration service using Prometheus metrics.

use crate::types::BattleType;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the battle orchestration service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Battle-related metrics
    battle_metrics: BattleMetrics,

    /// Transport-related metrics
    transport_metrics: TransportMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total queue joins by battle type
    pub joins_total: IntCounterVec,

    /// Total matches made by battle type
    pub matches_total: IntCounterVec,

    /// Matches made through the starvation fallback
    pub starvation_matches_total: IntCounter,

    /// Players currently waiting across all queues
    pub players_waiting: IntGauge,

    /// Time players spent waiting before a match
    pub queue_wait_seconds: Histogram,
}

/// Battle-related metrics
#[derive(Clone)]
pub struct BattleMetrics {
    /// Total battles created by battle type
    pub battles_created_total: IntCounterVec,

    /// Total battles completed by outcome (winner / draw)
    pub battles_completed_total: IntCounterVec,

    /// Rooms dissolved because challenge provisioning failed
    pub provisioning_failures_total: IntCounter,

    /// Currently live battle rooms
    pub active_battles: IntGauge,

    /// Total code submissions by result (passed / failed / replayed)
    pub submissions_total: IntCounterVec,
}

/// Transport-related metrics
#[derive(Clone)]
pub struct TransportMetrics {
    /// Push-channel subscriptions opened
    pub push_subscribes_total: IntCounter,

    /// Clients that fell back from push to polling
    pub poll_fallbacks_total: IntCounter,

    /// Events published by event name
    pub events_published_total: IntCounterVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Queue join processing time
    pub join_processing_duration: Histogram,

    /// Submission grading round-trip time
    pub grading_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let queue_metrics = QueueMetrics::new(&registry)?;
        let battle_metrics = BattleMetrics::new(&registry)?;
        let transport_metrics = TransportMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            queue_metrics,
            battle_metrics,
            transport_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get battle metrics
    pub fn battle(&self) -> &BattleMetrics {
        &self.battle_metrics
    }

    /// Get transport metrics
    pub fn transport(&self) -> &TransportMetrics {
        &self.transport_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a processed queue join
    pub fn record_queue_join(&self, battle_type: BattleType, duration: Duration) {
        self.queue_metrics
            .joins_total
            .with_label_values(&[battle_type_label(battle_type)])
            .inc();
        self.performance_metrics
            .join_processing_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a match being made
    pub fn record_match(&self, battle_type: BattleType, partner_waited: Duration) {
        self.queue_metrics
            .matches_total
            .with_label_values(&[battle_type_label(battle_type)])
            .inc();
        self.queue_metrics
            .queue_wait_seconds
            .observe(partner_waited.as_secs_f64());
    }

    /// Record a battle room being created
    pub fn record_battle_created(&self, battle_type: BattleType) {
        self.battle_metrics
            .battles_created_total
            .with_label_values(&[battle_type_label(battle_type)])
            .inc();
    }

    /// Record a battle reaching its terminal state
    pub fn record_battle_completed(&self, has_winner: bool) {
        let outcome = if has_winner { "winner" } else { "draw" };
        self.battle_metrics
            .battles_completed_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a dissolved room
    pub fn record_provisioning_failure(&self) {
        self.battle_metrics.provisioning_failures_total.inc();
    }

    /// Record a graded submission
    pub fn record_submission(&self, result: &str, duration: Duration) {
        self.battle_metrics
            .submissions_total
            .with_label_values(&[result])
            .inc();
        self.performance_metrics
            .grading_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a published push event
    pub fn record_event_published(&self, event_name: &str) {
        self.transport_metrics
            .events_published_total
            .with_label_values(&[event_name])
            .inc();
    }

    /// Update the current-state gauges
    pub fn update_gauges(&self, players_waiting: usize, active_battles: usize) {
        self.queue_metrics
            .players_waiting
            .set(players_waiting as i64);
        self.battle_metrics.active_battles.set(active_battles as i64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        // Unregistered fallback collector; metrics exist but are not exported
        Self::with_registry(Arc::new(Registry::new()))
            .expect("default metrics collector construction cannot fail")
    }
}

fn battle_type_label(battle_type: BattleType) -> &'static str {
    match battle_type {
        BattleType::Quick => "quick",
        BattleType::Ranked => "ranked",
        BattleType::Private => "private",
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let joins_total = IntCounterVec::new(
            Opts::new("queue_joins_total", "Total queue joins"),
            &["battle_type"],
        )?;
        registry.register(Box::new(joins_total.clone()))?;

        let matches_total = IntCounterVec::new(
            Opts::new("queue_matches_total", "Total matches made"),
            &["battle_type"],
        )?;
        registry.register(Box::new(matches_total.clone()))?;

        let starvation_matches_total = IntCounter::new(
            "queue_starvation_matches_total",
            "Matches made through the starvation fallback",
        )?;
        registry.register(Box::new(starvation_matches_total.clone()))?;

        let players_waiting = IntGauge::new(
            "queue_players_waiting",
            "Players currently waiting across all queues",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let queue_wait_seconds = Histogram::with_opts(HistogramOpts::new(
            "queue_wait_seconds",
            "Time players spent waiting before a match",
        ))?;
        registry.register(Box::new(queue_wait_seconds.clone()))?;

        Ok(Self {
            joins_total,
            matches_total,
            starvation_matches_total,
            players_waiting,
            queue_wait_seconds,
        })
    }
}

impl BattleMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let battles_created_total = IntCounterVec::new(
            Opts::new("battles_created_total", "Total battles created"),
            &["battle_type"],
        )?;
        registry.register(Box::new(battles_created_total.clone()))?;

        let battles_completed_total = IntCounterVec::new(
            Opts::new("battles_completed_total", "Total battles completed"),
            &["outcome"],
        )?;
        registry.register(Box::new(battles_completed_total.clone()))?;

        let provisioning_failures_total = IntCounter::new(
            "battles_provisioning_failures_total",
            "Rooms dissolved because challenge provisioning failed",
        )?;
        registry.register(Box::new(provisioning_failures_total.clone()))?;

        let active_battles = IntGauge::new("battles_active", "Currently live battle rooms")?;
        registry.register(Box::new(active_battles.clone()))?;

        let submissions_total = IntCounterVec::new(
            Opts::new("battle_submissions_total", "Total code submissions"),
            &["result"],
        )?;
        registry.register(Box::new(submissions_total.clone()))?;

        Ok(Self {
            battles_created_total,
            battles_completed_total,
            provisioning_failures_total,
            active_battles,
            submissions_total,
        })
    }
}

impl TransportMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let push_subscribes_total = IntCounter::new(
            "transport_push_subscribes_total",
            "Push-channel subscriptions opened",
        )?;
        registry.register(Box::new(push_subscribes_total.clone()))?;

        let poll_fallbacks_total = IntCounter::new(
            "transport_poll_fallbacks_total",
            "Clients that fell back from push to polling",
        )?;
        registry.register(Box::new(poll_fallbacks_total.clone()))?;

        let events_published_total = IntCounterVec::new(
            Opts::new("transport_events_published_total", "Events published"),
            &["event"],
        )?;
        registry.register(Box::new(events_published_total.clone()))?;

        Ok(Self {
            push_subscribes_total,
            poll_fallbacks_total,
            events_published_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let join_processing_duration = Histogram::with_opts(HistogramOpts::new(
            "join_processing_duration_seconds",
            "Queue join processing time",
        ))?;
        registry.register(Box::new(join_processing_duration.clone()))?;

        let grading_duration = Histogram::with_opts(HistogramOpts::new(
            "grading_duration_seconds",
            "Submission grading round-trip time",
        ))?;
        registry.register(Box::new(grading_duration.clone()))?;

        Ok(Self {
            join_processing_duration,
            grading_duration,
        })
    }
}
