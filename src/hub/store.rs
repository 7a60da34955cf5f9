//! Fan-out hub implementation
//!
//! Holds per-event-key state and implements the long-poll contract used
//! by subscribers: return everything newer than the caller's cursor, or
//! park until a matching record arrives.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use super::config::HubConfig;
use super::entry::TopicEntry;
use crate::id::MessageId;
use crate::message::Message;

/// A batch of records handed to a subscriber, plus the cursor to present
/// on the next call
#[derive(Debug, Clone)]
pub struct MessageResult {
    /// Records newer than the presented cursor, in insertion order
    pub messages: Vec<Arc<Message>>,
    /// Cursor marking the last record in `messages`, or the presented
    /// cursor unchanged when the wait was cancelled
    pub cursor: Option<MessageId>,
}

impl MessageResult {
    /// The cursor as an opaque token for the host boundary
    pub fn cursor_token(&self) -> Option<String> {
        self.cursor.map(|id| id.token())
    }
}

struct HubState {
    topics: HashMap<String, TopicEntry>,
    /// Highest record id the hub has seen; baseline for cursor-less calls
    last_id: Option<MessageId>,
}

/// Local in-process fan-out bus
///
/// The tail follower feeds records in; subscribers drain them through
/// [`MessageHub::get_messages`]. Waiters park on broadcast channels, so
/// the steady-state publish path never spins.
pub struct MessageHub {
    state: RwLock<HubState>,
    config: HubConfig,
}

impl MessageHub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            state: RwLock::new(HubState {
                topics: HashMap::new(),
                last_id: None,
            }),
            config,
        }
    }

    /// Deliver a record observed on the shared log
    ///
    /// Returns the number of waiters that were woken. Records without an
    /// id never came from the log and are dropped.
    pub async fn publish(&self, message: Message) -> usize {
        let Some(id) = message.id else {
            tracing::warn!(
                event_key = %message.event_key,
                "Dropping record without a store-assigned id"
            );
            return 0;
        };

        let message = Arc::new(message);
        let mut state = self.state.write().await;

        if state.last_id.map_or(true, |last| id > last) {
            state.last_id = Some(id);
        }

        let entry = state
            .topics
            .entry(message.event_key.clone())
            .or_insert_with(|| TopicEntry::new(&self.config));
        entry.push(message)
    }

    /// Long-poll for records on any of the given event keys
    ///
    /// Returns every retained record with an id greater than `cursor`,
    /// merged across keys in id order. A `None` cursor means "from now":
    /// history already in the hub is not replayed. When nothing qualifies
    /// the call parks until a matching record arrives or `cancel` fires;
    /// cancellation resolves with an empty batch and the cursor
    /// unchanged.
    pub async fn get_messages(
        &self,
        event_keys: &[String],
        cursor: Option<MessageId>,
        cancel: &CancellationToken,
    ) -> MessageResult {
        // Subscribe before the first scan so a record published between
        // scan and park cannot be missed.
        let (mut receivers, baseline) = {
            let mut state = self.state.write().await;
            let receivers = event_keys
                .iter()
                .map(|key| {
                    state
                        .topics
                        .entry(key.clone())
                        .or_insert_with(|| TopicEntry::new(&self.config))
                        .subscribe()
                })
                .collect::<Vec<_>>();
            (receivers, state.last_id)
        };

        let cursor = cursor.or(baseline);

        loop {
            {
                let state = self.state.read().await;
                let mut batch = Vec::new();
                for key in event_keys {
                    if let Some(entry) = state.topics.get(key) {
                        batch.extend(entry.since(cursor));
                    }
                }
                if !batch.is_empty() {
                    batch.sort_by_key(|message| message.id);
                    let cursor = batch.last().and_then(|message| message.id).or(cursor);
                    return MessageResult {
                        messages: batch,
                        cursor,
                    };
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return MessageResult {
                        messages: Vec::new(),
                        cursor,
                    };
                }
                _ = wait_any(&mut receivers) => {}
            }
        }
    }
}

impl Default for MessageHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Park until any receiver yields
///
/// Lag and closure both just trigger a rescan of the backlog, which is
/// the source of truth. With no receivers there is nothing to wait on and
/// only cancellation can finish the call.
async fn wait_any(receivers: &mut [broadcast::Receiver<Arc<Message>>]) {
    if receivers.is_empty() {
        return futures_util::future::pending::<()>().await;
    }

    let waits = receivers
        .iter_mut()
        .map(|rx| Box::pin(rx.recv()))
        .collect::<Vec<_>>();
    let _ = futures_util::future::select_all(waits).await;
}
