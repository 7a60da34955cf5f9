//! MongoDB-backed backplane for scaling out real-time message buses
//!
//! Multiple server processes, each holding its own live client
//! connections, share published events through a single capped MongoDB
//! collection: an append-only, size-bounded log that silently discards
//! its oldest records. Every process appends newly published messages to
//! the log and tails it from its own last-seen position, replaying new
//! records into a local in-process hub that wakes waiting subscribers.
//!
//! ```text
//!   process A                process B                process C
//!  ┌─────────┐              ┌─────────┐              ┌─────────┐
//!  │ send()──┼──┐           │ send()──┼──┐           │         │
//!  │  hub ◄──┼─┐│           │  hub ◄──┼─┐│           │  hub ◄──┼─┐
//!  └─────────┘ ││           └─────────┘ ││           └─────────┘ │
//!     tail ────┘│              tail ────┘│              tail ────┘
//!       ▲       ▼                ▲       ▼                ▲
//!       │  ┌────────────────────────────────────────┐    │
//!       └──┤        capped collection (the log)      ├────┘
//!          └────────────────────────────────────────┘
//! ```
//!
//! Delivery is best-effort: appends are unacknowledged, and records
//! rotated out of the capped log before a process observed them are
//! gone. What the backplane does guarantee is that within one tailing
//! session records reach the hub exactly once, in insertion order, and
//! that a (re)started process begins from "now" rather than replaying
//! history.
//!
//! # Example
//!
//! ```no_run
//! use mongo_backplane::{BackplaneConfig, MongoBackplane};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> mongo_backplane::Result<()> {
//! let config = BackplaneConfig::new("localhost", "realtime", "events");
//! let backplane = MongoBackplane::new(config)?;
//!
//! backplane.send("conn1", "chat", "hello").await?;
//!
//! let cancel = CancellationToken::new();
//! let batch = backplane
//!     .get_messages(&["chat".to_string()], None, &cancel)
//!     .await?;
//! for message in &batch.messages {
//!     println!("{}: {}", message.event_key, message.payload);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backplane;
pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod id;
pub mod message;
pub mod stats;
pub mod tail;

pub use backplane::{MessageBus, MongoBackplane};
pub use config::BackplaneConfig;
pub use connection::{ConnectionManager, Session, SingleFlight};
pub use error::{BackplaneError, ConfigError, Result};
pub use hub::{HubConfig, MessageHub, MessageResult};
pub use id::MessageId;
pub use message::Message;
pub use stats::{BackplaneStats, StatsSnapshot};
pub use tail::TailFollower;
