//! Local in-process fan-out bus
//!
//! The backplane keeps this hub fed: every record observed on the shared
//! log is pushed in exactly once, in insertion order, and long-polling
//! subscribers are woken as records arrive.
//!
//! # Architecture
//!
//! ```text
//!                           Arc<MessageHub>
//!                     ┌──────────────────────────┐
//!                     │ topics: HashMap<String,  │
//!                     │   TopicEntry {           │
//!                     │     backlog (bounded),   │
//!                     │     tx: broadcast::Tx,   │
//!                     │   }                      │
//!                     │ >                        │
//!                     └────────────┬─────────────┘
//!                                  │
//!          ┌───────────────────────┼───────────────────────┐
//!          │                       │                       │
//!          ▼                       ▼                       ▼
//!     [TailFollower]          [Subscriber]            [Subscriber]
//!     publish()               get_messages()          get_messages()
//! ```
//!
//! Records are shared as `Arc<Message>`, so fan-out to many subscribers
//! never copies payloads.

pub mod config;
pub mod entry;
pub mod store;

pub use config::HubConfig;
pub use store::{MessageHub, MessageResult};
