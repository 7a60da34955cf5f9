//! Backplane composition root
//!
//! Wires the connection manager, the tail follower, and the local hub
//! behind the publish/subscribe contract a host consumes. Construct one
//! instance per process and pass it (or a [`MessageBus`] trait object)
//! to whatever dispatches messages; there is no framework registration
//! hook.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::BackplaneConfig;
use crate::connection::{ConnectionManager, Session};
use crate::error::Result;
use crate::hub::{HubConfig, MessageHub, MessageResult};
use crate::id::MessageId;
use crate::message::Message;
use crate::stats::{BackplaneStats, StatsSnapshot};
use crate::tail::TailFollower;

/// The publish/subscribe contract consumed by the host
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Best-effort publish; resolves once the append is dispatched
    async fn send(&self, connection_id: &str, event_key: &str, value: &str) -> Result<()>;

    /// Long-poll for records on any of the given event keys
    async fn get_messages(
        &self,
        event_keys: &[String],
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<MessageResult>;
}

/// A message bus backplane over a shared capped MongoDB collection
///
/// Every process appends published messages to the same capped log and
/// tails it from its own last-seen position, so a message published on
/// any process reaches subscribers on all of them.
pub struct MongoBackplane {
    connection: ConnectionManager,
    hub: Arc<MessageHub>,
    stats: Arc<BackplaneStats>,
    cancel: CancellationToken,
    tail_started: AtomicBool,
    tail_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MongoBackplane {
    /// Create a backplane with default hub configuration
    ///
    /// Validates the configuration synchronously; nothing touches the
    /// network until the first publish or an explicit
    /// [`ensure_ready`](Self::ensure_ready).
    pub fn new(config: BackplaneConfig) -> Result<Self> {
        Self::with_hub_config(config, HubConfig::default())
    }

    /// Create a backplane with custom hub configuration
    pub fn with_hub_config(config: BackplaneConfig, hub_config: HubConfig) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(BackplaneStats::new());
        Ok(Self {
            connection: ConnectionManager::new(config, Arc::clone(&stats)),
            hub: Arc::new(MessageHub::with_config(hub_config)),
            stats,
            cancel: CancellationToken::new(),
            tail_started: AtomicBool::new(false),
            tail_handle: Mutex::new(None),
        })
    }

    /// Resolve once the session is Ready, establishing it if necessary
    ///
    /// The first successful call also launches the tail follower, so
    /// Ready always implies the hub is being fed.
    pub async fn ensure_ready(&self) -> Result<()> {
        let session = self.connection.ensure_ready().await?;
        self.start_tail(session);
        Ok(())
    }

    /// Best-effort publish
    ///
    /// The value is stringified; the returned future resolves once the
    /// append is dispatched, not once the store confirms it. Append
    /// failures after dispatch are counted and logged, never surfaced
    /// here. Publishers only ever see configuration or
    /// connection-establishment errors.
    pub async fn send(
        &self,
        connection_id: &str,
        event_key: &str,
        value: impl ToString,
    ) -> Result<()> {
        let message = Message::new(connection_id, event_key, value.to_string());

        let session = match self.connection.session() {
            // Steady state: Ready, append goes off the caller's path
            Some(session) => session,
            None => {
                let session = self.connection.ensure_ready().await?;
                self.start_tail(session.clone());
                session
            }
        };

        self.dispatch_append(session, message);
        Ok(())
    }

    /// Long-poll for records on any of the given event keys
    ///
    /// Delegated to the local hub; the backplane's job is keeping that
    /// hub fed via the tail follower. The cursor is an opaque token
    /// previously handed out in a [`MessageResult`].
    pub async fn get_messages(
        &self,
        event_keys: &[String],
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<MessageResult> {
        let cursor = cursor.map(MessageId::parse_token).transpose()?;
        Ok(self.hub.get_messages(event_keys, cursor, cancel).await)
    }

    /// Mint a new id in the same id space as the log
    pub fn new_id(&self) -> MessageId {
        MessageId::generate()
    }

    /// Format an id as an opaque cursor token
    pub fn id_to_string(&self, id: MessageId) -> String {
        id.token()
    }

    /// Parse a cursor token back into an id
    pub fn id_from_string(&self, token: &str) -> Result<MessageId> {
        MessageId::parse_token(token)
    }

    /// Snapshot of the observability counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the tail follower and wait for it to exit
    ///
    /// Publishes after shutdown still append to the log; they are simply
    /// no longer replayed into this process's hub.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let handle = self.tail_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn start_tail(&self, session: Session) {
        if self.tail_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let follower = TailFollower::new(
            session,
            Arc::clone(&self.hub),
            Arc::clone(&self.stats),
            self.cancel.child_token(),
        );
        let handle = follower.spawn();
        *self.tail_handle.lock().unwrap() = Some(handle);
    }

    fn dispatch_append(&self, session: Session, message: Message) {
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            BackplaneStats::incr(&stats.appends_dispatched);
            if let Err(e) = session.collection().insert_one(message).await {
                BackplaneStats::incr(&stats.append_failures);
                tracing::warn!(error = %e, "Best-effort append failed");
            }
        });
    }
}

#[async_trait]
impl MessageBus for MongoBackplane {
    async fn send(&self, connection_id: &str, event_key: &str, value: &str) -> Result<()> {
        MongoBackplane::send(self, connection_id, event_key, value).await
    }

    async fn get_messages(
        &self,
        event_keys: &[String],
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<MessageResult> {
        MongoBackplane::get_messages(self, event_keys, cursor, cancel).await
    }
}
