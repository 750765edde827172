//! Code Clash - Matchmaking and battle orchestration for head-to-head coding battles
//!
//! This crate provides scored matchmaking queues, battle-room lifecycle
//! management and dual-transport (push/poll) client synchronization for
//! timed competitive coding sessions.

pub mod battle;
pub mod challenge;
pub mod config;
pub mod error;
pub mod events;
pub mod matching;
pub mod metrics;
pub mod service;
pub mod timer;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{BattleError, Result};
pub use types::*;

// Re-export key components
pub use events::publisher::EventPublisher;
pub use service::{AppState, MatchmakingService};
pub use transport::{TransportMode, TransportOrchestrator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
