//! Server-side event fan-out for the push channel
//!
//! Each connected player gets a bounded channel; the battle and queue logic
//! publishes events without knowing whether anyone is listening. A player
//! who is not subscribed, or whose channel is full, simply misses the push
//! event and recovers through the polling transport.

use crate::error::{BattleError, Result};
use crate::events::messages::ServerEvent;
use crate::types::PlayerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for publishing events to players
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to one player. Best effort: a missing or saturated
    /// subscriber never fails the operation that produced the event.
    async fn publish(&self, player_id: &PlayerId, event: ServerEvent) -> Result<()>;

    /// Publish the same event to several players
    async fn publish_to_all(&self, player_ids: &[PlayerId], event: ServerEvent) -> Result<()> {
        for player_id in player_ids {
            self.publish(player_id, event.clone()).await?;
        }
        Ok(())
    }
}

/// In-process event publisher backed by per-player bounded channels.
///
/// Subscribing is what "connecting the push channel" means server-side;
/// the returned receiver is the event stream the push transport consumes.
pub struct ChannelEventPublisher {
    subscribers: RwLock<HashMap<PlayerId, mpsc::Sender<ServerEvent>>>,
    buffer_size: usize,
}

impl ChannelEventPublisher {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer_size,
        }
    }

    /// Open the push stream for a player.
    ///
    /// A second subscription replaces the first; the stale receiver closes,
    /// which the old transport observes as a dropped channel.
    pub fn subscribe(&self, player_id: &PlayerId) -> Result<mpsc::Receiver<ServerEvent>> {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let mut subscribers = self.subscribers.write().map_err(|_| BattleError::Internal {
            message: "Failed to acquire subscribers lock".to_string(),
        })?;
        subscribers.insert(player_id.clone(), tx);
        debug!("Player '{}' subscribed to push events", player_id);
        Ok(rx)
    }

    /// Drop a player's push stream
    pub fn unsubscribe(&self, player_id: &PlayerId) {
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.remove(player_id);
        }
    }

    /// Number of currently subscribed players
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, player_id: &PlayerId, event: ServerEvent) -> Result<()> {
        let sender = {
            let subscribers = self.subscribers.read().map_err(|_| BattleError::Internal {
                message: "Failed to acquire subscribers lock".to_string(),
            })?;
            subscribers.get(player_id).cloned()
        };

        let Some(sender) = sender else {
            debug!(
                "No push subscriber for '{}', dropping {} event",
                player_id,
                event.name()
            );
            return Ok(());
        };

        match sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Push channel for '{}' is full, dropping {} event",
                    player_id,
                    event.name()
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(
                    "Push channel for '{}' closed, dropping {} event",
                    player_id,
                    event.name()
                );
                self.unsubscribe(player_id);
                Ok(())
            }
        }
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<(PlayerId, ServerEvent)>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events (for testing)
    pub fn published_events(&self) -> Vec<(PlayerId, ServerEvent)> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of a specific wire name
    pub fn count_events_of_type(&self, event_name: &str) -> usize {
        self.published_events()
            .iter()
            .filter(|(_, event)| event.name() == event_name)
            .count()
    }

    /// Events published to one player
    pub fn events_for(&self, player_id: &str) -> Vec<ServerEvent> {
        self.published_events()
            .into_iter()
            .filter(|(id, _)| id == player_id)
            .map(|(_, event)| event)
            .collect()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, player_id: &PlayerId, event: ServerEvent) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push((player_id.clone(), event));
        }
        Ok(())
    }
}
