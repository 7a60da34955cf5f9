//! Session lifecycle for the shared log store
//!
//! One logical session per process: the first caller to need the store
//! establishes it, concurrent callers coalesce onto the same attempt, and
//! a failed attempt clears so the next publish retries from scratch.
//! Ready is never reported before the log collection has been validated
//! as capped.

pub mod single_flight;

use std::sync::Arc;

use bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::{Acknowledgment, CollectionOptions, WriteConcern};
use mongodb::{Client, Collection};

use crate::config::BackplaneConfig;
use crate::error::{BackplaneError, Result};
use crate::message::Message;
use crate::stats::BackplaneStats;

pub use single_flight::SingleFlight;

/// An established session: a validated handle to the capped log
///
/// Cheap to clone; the append path and the tail follower each hold one.
#[derive(Clone)]
pub struct Session {
    collection: Collection<Message>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("collection", &self.collection.name())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(collection: Collection<Message>) -> Self {
        Self { collection }
    }

    /// The log collection handle
    ///
    /// Writes through this handle are unacknowledged: appends trade
    /// durable confirmation for throughput.
    pub fn collection(&self) -> &Collection<Message> {
        &self.collection
    }
}

/// Owns the single logical session to the log store
pub struct ConnectionManager {
    config: BackplaneConfig,
    flight: SingleFlight<Session, BackplaneError>,
    stats: Arc<BackplaneStats>,
}

impl ConnectionManager {
    pub fn new(config: BackplaneConfig, stats: Arc<BackplaneStats>) -> Self {
        Self {
            config,
            flight: SingleFlight::new(),
            stats,
        }
    }

    /// Non-blocking peek at an already-established session
    pub fn session(&self) -> Option<Session> {
        self.flight.get()
    }

    /// Resolve once the session is Ready
    ///
    /// The first caller establishes the session; every concurrent caller
    /// awaits the same outcome. Failure is handed to all of them and the
    /// next call starts over.
    pub async fn ensure_ready(&self) -> Result<Session> {
        let config = self.config.clone();
        let stats = Arc::clone(&self.stats);
        self.flight.run(|| Self::establish(config, stats)).await
    }

    async fn establish(config: BackplaneConfig, stats: Arc<BackplaneStats>) -> Result<Session> {
        tracing::info!(
            server = %config.server,
            port = config.port,
            database = %config.database,
            collection = %config.collection,
            "Connecting to log store"
        );

        let client = Client::with_uri_str(&config.connection_uri())
            .await
            .map_err(BackplaneError::Connection)?;
        let database = client.database(&config.database);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(BackplaneError::Connection)?;

        let names = database
            .list_collection_names()
            .await
            .map_err(BackplaneError::Connection)?;

        if !names.iter().any(|name| name == &config.collection) {
            match database
                .create_collection(&config.collection)
                .capped(true)
                .size(config.max_log_size)
                .await
            {
                Ok(()) => tracing::info!(
                    collection = %config.collection,
                    max_bytes = config.max_log_size,
                    "Created capped log collection"
                ),
                // Another process won the create race; the capped check
                // below still applies to whatever it created.
                Err(e) if namespace_exists(&e) => {}
                Err(e) => return Err(BackplaneError::Connection(e)),
            }
        }

        let coll_stats = database
            .run_command(doc! { "collStats": &config.collection })
            .await
            .map_err(BackplaneError::Connection)?;
        if !coll_stats.get_bool("capped").unwrap_or(false) {
            return Err(BackplaneError::CollectionNotCapped(config.collection.clone()));
        }

        let write_concern = WriteConcern::builder().w(Acknowledgment::Nodes(0)).build();
        let options = CollectionOptions::builder()
            .write_concern(write_concern)
            .build();
        let collection =
            database.collection_with_options::<Message>(&config.collection, options);

        BackplaneStats::incr(&stats.sessions_established);
        tracing::info!(collection = %config.collection, "Log store session ready");

        Ok(Session::new(collection))
    }
}

fn namespace_exists(error: &mongodb::error::Error) -> bool {
    matches!(&*error.kind, ErrorKind::Command(e) if e.code == 48)
}
