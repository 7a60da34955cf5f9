//! Per-event-key state held by the hub

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::broadcast;

use super::config::HubConfig;
use crate::id::MessageId;
use crate::message::Message;

/// State for a single event key: a bounded catch-up backlog plus a
/// broadcast channel that wakes parked waiters
pub(super) struct TopicEntry {
    backlog: VecDeque<Arc<Message>>,
    tx: broadcast::Sender<Arc<Message>>,
    backlog_capacity: usize,
}

impl TopicEntry {
    pub(super) fn new(config: &HubConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity);

        Self {
            backlog: VecDeque::with_capacity(config.backlog_capacity.min(64)),
            tx,
            backlog_capacity: config.backlog_capacity,
        }
    }

    /// Append a record and wake waiters
    ///
    /// The backlog is appended before the broadcast so a waiter woken by
    /// the send always finds the record when it rescans. Returns the
    /// number of waiters that were woken.
    pub(super) fn push(&mut self, message: Arc<Message>) -> usize {
        if self.backlog.len() == self.backlog_capacity {
            self.backlog.pop_front();
        }
        self.backlog.push_back(Arc::clone(&message));

        self.tx.send(message).unwrap_or(0)
    }

    /// Backlog records with an id greater than the cursor, oldest first
    ///
    /// A `None` cursor matches the whole backlog.
    pub(super) fn since(&self, cursor: Option<MessageId>) -> Vec<Arc<Message>> {
        self.backlog
            .iter()
            .filter(|message| match (message.id, cursor) {
                (Some(id), Some(cursor)) => id > cursor,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .cloned()
            .collect()
    }

    pub(super) fn subscribe(&self) -> broadcast::Receiver<Arc<Message>> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub(super) fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event_key: &str, payload: &str) -> Arc<Message> {
        let mut message = Message::new("conn1", event_key, payload);
        message.id = Some(MessageId::generate());
        Arc::new(message)
    }

    #[test]
    fn test_backlog_drops_oldest_on_overflow() {
        let config = HubConfig::default().backlog_capacity(3);
        let mut entry = TopicEntry::new(&config);

        for n in 0..5 {
            entry.push(record("chat", &n.to_string()));
        }

        assert_eq!(entry.backlog_len(), 3);
        let kept = entry.since(None);
        let payloads: Vec<&str> = kept.iter().map(|m| m.payload.as_str()).collect();
        assert_eq!(payloads, ["2", "3", "4"]);
    }

    #[test]
    fn test_since_filters_by_cursor() {
        let mut entry = TopicEntry::new(&HubConfig::default());

        entry.push(record("chat", "old"));
        let cursor = MessageId::generate();
        entry.push(record("chat", "new"));

        let fresh = entry.since(Some(cursor));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].payload, "new");
    }

    #[tokio::test]
    async fn test_push_reaches_subscribers() {
        let mut entry = TopicEntry::new(&HubConfig::default());
        let mut rx = entry.subscribe();

        let woken = entry.push(record("chat", "hello"));
        assert_eq!(woken, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.payload, "hello");
    }
}
