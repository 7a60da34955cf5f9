//! Tail follower: replays the shared log into the local hub
//!
//! One long-lived task per process. An outer session loop picks a
//! starting position and opens a tailing cursor; an inner read loop
//! delivers every record the cursor yields. When the cursor dies (capped
//! rotation, server timeout, disconnect) the outer loop recomputes the
//! starting position and reopens, so the follower survives anything short
//! of process exit.
//!
//! The starting position is always the newest record currently in the
//! log: a freshly (re)started follower never replays history. Records
//! rotated out of the capped log before this follower observed them are
//! gone; delivery across restarts is best-effort by design.

use std::sync::Arc;
use std::time::Duration;

use bson::doc;
use futures_util::TryStreamExt;
use mongodb::error::ErrorKind;
use mongodb::options::CursorType;
use mongodb::Cursor;
use tokio_util::sync::CancellationToken;

use crate::connection::Session;
use crate::hub::MessageHub;
use crate::id::MessageId;
use crate::message::Message;
use crate::stats::BackplaneStats;

/// How long a caught-up follower parks before polling the cursor again
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long the server may hold an await-capable getMore open
const MAX_AWAIT_TIME: Duration = Duration::from_secs(1);

/// The long-running loop that tails the shared log
pub struct TailFollower {
    session: Session,
    hub: Arc<MessageHub>,
    stats: Arc<BackplaneStats>,
    cancel: CancellationToken,
    poll_interval: Duration,
    /// Last record id delivered in this tailing session; in memory only,
    /// so a restarted process always begins from "now"
    position: Option<MessageId>,
}

impl TailFollower {
    pub fn new(
        session: Session,
        hub: Arc<MessageHub>,
        stats: Arc<BackplaneStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            hub,
            stats,
            cancel,
            poll_interval: DEFAULT_POLL_INTERVAL,
            position: None,
        }
    }

    /// Set the caught-up poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Spawn the follower as its own task
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until cancelled
    pub async fn run(mut self) {
        tracing::debug!(
            collection = self.session.collection().name(),
            "Tail follower started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            // Start from "now": the newest record currently in the log.
            let start = match self.latest_id().await {
                Ok(start) => start,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read tail start position");
                    if self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            let cursor = match self.open_cursor(start).await {
                Ok(cursor) => cursor,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to open tailing cursor");
                    if self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            self.position = start;
            self.drain(cursor).await;

            if self.cancel.is_cancelled() {
                break;
            }
            BackplaneStats::incr(&self.stats.tail_restarts);
            tracing::debug!(position = ?self.position, "Tailing cursor died, reopening");
        }

        tracing::debug!(position = ?self.position, "Tail follower stopped");
    }

    /// Id of the most recently inserted record, by reverse natural order
    ///
    /// `None` when the log is empty, in which case the cursor is opened
    /// with no lower bound and observes everything inserted from now on.
    async fn latest_id(&self) -> mongodb::error::Result<Option<MessageId>> {
        let newest = self
            .session
            .collection()
            .find_one(doc! {})
            .sort(doc! { "$natural": -1 })
            .await?;
        Ok(newest.and_then(|message| message.id))
    }

    /// Open a forward, order-preserving, await-capable tail over records
    /// newer than `start`
    async fn open_cursor(
        &self,
        start: Option<MessageId>,
    ) -> mongodb::error::Result<Cursor<Message>> {
        let filter = match start {
            Some(id) => doc! { "_id": { "$gt": id.as_object_id() } },
            None => doc! {},
        };

        self.session
            .collection()
            .find(filter)
            .sort(doc! { "$natural": 1 })
            .cursor_type(CursorType::TailableAwait)
            .max_await_time(MAX_AWAIT_TIME)
            .await
    }

    /// Inner read loop: consume the cursor until it dies or we are
    /// cancelled
    async fn drain(&mut self, mut cursor: Cursor<Message>) {
        while cursor.has_next() {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return,
                next = cursor.try_next() => next,
            };

            match next {
                Ok(Some(message)) => self.deliver(message).await,
                // Caught up but the cursor is still alive; the server
                // already parks the getMore, a short client-side pause
                // covers the remainder.
                Ok(None) => {
                    if self.pause().await {
                        return;
                    }
                }
                Err(e) if is_decode_error(&e) => {
                    // One bad record must not stop the stream
                    BackplaneStats::incr(&self.stats.decode_failures);
                    tracing::warn!(error = %e, "Skipping record that failed to decode");
                }
                Err(e) => {
                    tracing::warn!(error = %e, position = ?self.position, "Tailing cursor error");
                    return;
                }
            }
        }
    }

    async fn deliver(&mut self, message: Message) {
        let id = message.id;
        let woken = self.hub.publish(message).await;

        if id.is_some() {
            self.position = id;
        }
        BackplaneStats::incr(&self.stats.records_delivered);
        tracing::trace!(position = ?self.position, woken, "Delivered record");
    }

    /// Park briefly; returns true when cancelled
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(self.poll_interval) => false,
        }
    }
}

fn is_decode_error(error: &mongodb::error::Error) -> bool {
    matches!(&*error.kind, ErrorKind::BsonDeserialization(_))
}
