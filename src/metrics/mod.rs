//! Metrics and monitoring for the code-clash service
//!
//! This module provides metrics collection and the HTTP monitoring surface
//! (health probes and the Prometheus endpoint).

pub mod collector;
pub mod health;

pub use collector::{
    BattleMetrics, MetricsCollector, PerformanceMetrics, QueueMetrics, TransportMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
