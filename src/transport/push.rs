//! Push transport: the persistent server-initiated event channel
//!
//! The contract is a connect call that yields a stream of discrete server
//! events plus a transport-agnostic submission call. The in-process
//! implementation wires directly into the service's event publisher; a
//! networked deployment would put a websocket behind the same trait.

use crate::error::Result;
use crate::events::messages::ServerEvent;
use crate::events::publisher::ChannelEventPublisher;
use crate::service::matchmaking::MatchmakingService;
use crate::types::{PlayerId, SubmitCodeRequest, SubmitCodeResponse};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Trait for the push channel
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Open the event stream for a player. The stream ending means the
    /// channel dropped and the orchestrator must fall back to polling.
    async fn connect(&self, player_id: &PlayerId) -> Result<mpsc::Receiver<ServerEvent>>;

    /// Submit code over the push channel
    async fn submit_code(&self, request: SubmitCodeRequest) -> Result<SubmitCodeResponse>;
}

/// An established push session owning the event stream
pub struct PushSession {
    events: mpsc::Receiver<ServerEvent>,
}

impl PushSession {
    pub fn new(events: mpsc::Receiver<ServerEvent>) -> Self {
        Self { events }
    }

    /// Next pushed event; `None` when the channel dropped
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }
}

/// In-process push channel speaking directly to the service
pub struct LocalPushChannel {
    publisher: Arc<ChannelEventPublisher>,
    service: Arc<MatchmakingService>,
}

impl LocalPushChannel {
    pub fn new(publisher: Arc<ChannelEventPublisher>, service: Arc<MatchmakingService>) -> Self {
        Self { publisher, service }
    }
}

#[async_trait]
impl PushChannel for LocalPushChannel {
    async fn connect(&self, player_id: &PlayerId) -> Result<mpsc::Receiver<ServerEvent>> {
        self.publisher.subscribe(player_id)
    }

    async fn submit_code(&self, request: SubmitCodeRequest) -> Result<SubmitCodeResponse> {
        self.service.submit_code(request).await
    }
}
