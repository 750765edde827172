//! Main application configuration
//!
//! This module defines the primary configuration structures for the code-clash
//! battle orchestration service, including environment variable loading and
//! validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub transport: TransportSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and metrics endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// Minimum compatibility score required to accept a match
    pub accept_threshold: f64,
    /// Number of other waiting entries at which the longest-waiting one is
    /// matched regardless of score
    pub starvation_threshold: usize,
    /// Seconds of estimated wait attributed to each queue position
    pub estimated_wait_per_position_seconds: u64,
    /// Soft cap on queue wait before clients are expected to self-cancel
    pub queue_wait_cap_seconds: u64,
    /// How long challenge provisioning may take before the room is dissolved
    pub provision_timeout_seconds: u64,
    /// How long completed rooms are retained before cleanup
    pub retention_seconds: u64,
    /// How long a room may sit in waiting before being dissolved
    pub waiting_room_ttl_seconds: u64,
    /// Room cleanup interval in seconds
    pub cleanup_interval_seconds: u64,
}

/// Client transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// How long the push channel may take to connect before falling back to polling
    pub push_connect_timeout_seconds: u64,
    /// Fixed polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Consecutive transport failures tolerated before reporting disconnected
    pub max_reconnect_attempts: u32,
    /// Per-player bounded event channel capacity
    pub event_buffer_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "code-clash".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            accept_threshold: 0.3,
            starvation_threshold: 3,
            estimated_wait_per_position_seconds: 30,
            queue_wait_cap_seconds: 120,
            provision_timeout_seconds: 10,
            retention_seconds: 300,
            waiting_room_ttl_seconds: 1800,
            cleanup_interval_seconds: 60,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            push_connect_timeout_seconds: 5,
            poll_interval_ms: 1000,
            max_reconnect_attempts: 3,
            event_buffer_size: 256,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            config.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Matchmaking settings
        if let Ok(threshold) = env::var("MATCH_ACCEPT_THRESHOLD") {
            config.matchmaking.accept_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("Invalid MATCH_ACCEPT_THRESHOLD value: {}", threshold))?;
        }
        if let Ok(starvation) = env::var("STARVATION_THRESHOLD") {
            config.matchmaking.starvation_threshold = starvation
                .parse()
                .map_err(|_| anyhow!("Invalid STARVATION_THRESHOLD value: {}", starvation))?;
        }
        if let Ok(cap) = env::var("QUEUE_WAIT_CAP_SECONDS") {
            config.matchmaking.queue_wait_cap_seconds = cap
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_WAIT_CAP_SECONDS value: {}", cap))?;
        }
        if let Ok(timeout) = env::var("PROVISION_TIMEOUT_SECONDS") {
            config.matchmaking.provision_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid PROVISION_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(retention) = env::var("RETENTION_SECONDS") {
            config.matchmaking.retention_seconds = retention
                .parse()
                .map_err(|_| anyhow!("Invalid RETENTION_SECONDS value: {}", retention))?;
        }
        if let Ok(cleanup) = env::var("CLEANUP_INTERVAL_SECONDS") {
            config.matchmaking.cleanup_interval_seconds = cleanup
                .parse()
                .map_err(|_| anyhow!("Invalid CLEANUP_INTERVAL_SECONDS value: {}", cleanup))?;
        }

        // Transport settings
        if let Ok(timeout) = env::var("PUSH_CONNECT_TIMEOUT_SECONDS") {
            config.transport.push_connect_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid PUSH_CONNECT_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(interval) = env::var("POLL_INTERVAL_MS") {
            config.transport.poll_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid POLL_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(attempts) = env::var("MAX_RECONNECT_ATTEMPTS") {
            config.transport.max_reconnect_attempts = attempts
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_RECONNECT_ATTEMPTS value: {}", attempts))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get provisioning timeout as Duration
    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.matchmaking.provision_timeout_seconds)
    }

    /// Get cleanup interval as Duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.cleanup_interval_seconds)
    }

    /// Get push connect timeout as Duration
    pub fn push_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.push_connect_timeout_seconds)
    }

    /// Get polling interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.transport.poll_interval_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.matchmaking.provision_timeout_seconds == 0 {
        return Err(anyhow!("Provision timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    if !(0.0..=1.0).contains(&config.matchmaking.accept_threshold) {
        return Err(anyhow!("Match accept threshold must be within [0, 1]"));
    }
    if config.matchmaking.starvation_threshold == 0 {
        return Err(anyhow!("Starvation threshold must be greater than 0"));
    }
    if config.matchmaking.cleanup_interval_seconds == 0 {
        return Err(anyhow!("Cleanup interval must be greater than 0"));
    }
    if config.matchmaking.queue_wait_cap_seconds == 0 {
        return Err(anyhow!("Queue wait cap must be greater than 0"));
    }

    // Validate transport settings
    if config.transport.push_connect_timeout_seconds == 0 {
        return Err(anyhow!("Push connect timeout must be greater than 0"));
    }
    if config.transport.poll_interval_ms == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }
    if config.transport.event_buffer_size == 0 {
        return Err(anyhow!("Event buffer size must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.matchmaking.accept_threshold, 0.3);
        assert_eq!(config.matchmaking.starvation_threshold, 3);
        assert_eq!(config.transport.push_connect_timeout_seconds, 5);
        assert_eq!(config.transport.poll_interval_ms, 1000);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.matchmaking.accept_threshold = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duration_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.push_connect_timeout(), Duration::from_secs(5));
    }
}
