//! Battle-type provider traits and implementations
//!
//! This module defines the interface for configuring battle types, along
//! with the static implementation covering the three built-in pools.

use crate::error::{BattleError, Result};
use crate::types::BattleType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a specific battle type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleTypeConfig {
    /// Type of battle (Quick, Ranked or Private)
    pub battle_type: BattleType,
    /// Number of participants required to start
    pub capacity: usize,
    /// Default time limit; the attached challenge may carry its own
    pub time_limit_seconds: u64,
    /// Time other participants get to finish after the first completion.
    /// Zero means strict first-to-finish.
    pub grace_window_seconds: u64,
}

impl BattleTypeConfig {
    /// Create configuration for Quick battles
    pub fn quick() -> Self {
        Self {
            battle_type: BattleType::Quick,
            capacity: 2,
            time_limit_seconds: 600,
            grace_window_seconds: 0,
        }
    }

    /// Create configuration for Ranked battles
    pub fn ranked() -> Self {
        Self {
            battle_type: BattleType::Ranked,
            capacity: 2,
            time_limit_seconds: 900,
            grace_window_seconds: 0,
        }
    }

    /// Create configuration for Private (invite-only) battles
    pub fn private() -> Self {
        Self {
            battle_type: BattleType::Private,
            capacity: 2,
            time_limit_seconds: 600,
            grace_window_seconds: 30,
        }
    }

    /// Get the grace window as a Duration
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_seconds)
    }
}

/// Trait for providing battle-type configurations
pub trait BattleTypeProvider: Send + Sync {
    /// Get configuration for a specific battle type
    fn get_config(&self, battle_type: BattleType) -> Result<BattleTypeConfig>;

    /// Get all available battle types
    fn available_types(&self) -> Vec<BattleType>;

    /// Validate if a battle-type configuration is valid
    fn validate_config(&self, config: &BattleTypeConfig) -> Result<()>;
}

/// Static battle-type provider with the three predefined pools
#[derive(Debug, Clone)]
pub struct StaticBattleTypeProvider {
    quick_config: BattleTypeConfig,
    ranked_config: BattleTypeConfig,
    private_config: BattleTypeConfig,
}

impl StaticBattleTypeProvider {
    /// Create a new static provider with default configurations
    pub fn new() -> Self {
        Self {
            quick_config: BattleTypeConfig::quick(),
            ranked_config: BattleTypeConfig::ranked(),
            private_config: BattleTypeConfig::private(),
        }
    }

    /// Create with custom configurations
    pub fn with_configs(
        quick_config: BattleTypeConfig,
        ranked_config: BattleTypeConfig,
        private_config: BattleTypeConfig,
    ) -> Result<Self> {
        let provider = Self {
            quick_config: quick_config.clone(),
            ranked_config: ranked_config.clone(),
            private_config: private_config.clone(),
        };

        provider.validate_config(&quick_config)?;
        provider.validate_config(&ranked_config)?;
        provider.validate_config(&private_config)?;

        Ok(provider)
    }

    /// Replace the configuration for one battle type
    pub fn update_config(&mut self, config: BattleTypeConfig) -> Result<()> {
        self.validate_config(&config)?;
        match config.battle_type {
            BattleType::Quick => self.quick_config = config,
            BattleType::Ranked => self.ranked_config = config,
            BattleType::Private => self.private_config = config,
        }
        Ok(())
    }
}

impl Default for StaticBattleTypeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BattleTypeProvider for StaticBattleTypeProvider {
    fn get_config(&self, battle_type: BattleType) -> Result<BattleTypeConfig> {
        match battle_type {
            BattleType::Quick => Ok(self.quick_config.clone()),
            BattleType::Ranked => Ok(self.ranked_config.clone()),
            BattleType::Private => Ok(self.private_config.clone()),
        }
    }

    fn available_types(&self) -> Vec<BattleType> {
        vec![BattleType::Quick, BattleType::Ranked, BattleType::Private]
    }

    fn validate_config(&self, config: &BattleTypeConfig) -> Result<()> {
        if config.capacity < 2 {
            return Err(BattleError::Configuration {
                message: "Battle capacity must be at least 2".to_string(),
            }
            .into());
        }

        if config.capacity > 8 {
            return Err(BattleError::Configuration {
                message: "Battle capacity cannot exceed 8 participants".to_string(),
            }
            .into());
        }

        if config.time_limit_seconds == 0 {
            return Err(BattleError::Configuration {
                message: "Battle time limit must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
