//! Push-channel events and server-side fan-out

pub mod messages;
pub mod publisher;

pub use messages::ServerEvent;
pub use publisher::{ChannelEventPublisher, EventPublisher, MockEventPublisher};
