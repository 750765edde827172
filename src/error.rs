//! Error types for the battle orchestration service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking and battle scenarios
#[derive(Debug, thiserror::Error)]
pub enum BattleError {
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Operation '{operation}' not allowed while battle {battle_id} is {state}")]
    InvalidState {
        battle_id: String,
        state: String,
        operation: String,
    },

    #[error("Challenge provisioning failed: {reason}")]
    Provisioning { reason: String },

    #[error("Transport unavailable: {message}")]
    Transport { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl BattleError {
    /// Whether the caller may retry the failed operation as-is
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BattleError::Provisioning { .. } | BattleError::Transport { .. }
        )
    }
}
