//! Client-side dual-transport synchronization
//!
//! One orchestrator drives either the push channel or the polling fallback;
//! both express the same logical operations against the service.

pub mod orchestrator;
pub mod poll;
pub mod push;

pub use orchestrator::{ClientUpdate, ConnectionState, TransportMode, TransportOrchestrator};
pub use poll::{LocalPollApi, PollApi, PollSession, PollUpdate};
pub use push::{LocalPushChannel, PushChannel, PushSession};
