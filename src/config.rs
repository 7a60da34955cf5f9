//! Backplane configuration
//!
//! Connection parameters for the shared log store. Validation is
//! synchronous and happens before any network activity; an invalid
//! configuration is a construction error, never silently defaulted.

use crate::error::ConfigError;

/// Default maximum size of the capped log collection (2 GiB)
pub const DEFAULT_MAX_LOG_SIZE: u64 = 2_147_483_648;

/// Default MongoDB port
pub const DEFAULT_PORT: u16 = 27017;

/// Configuration for the MongoDB backplane
#[derive(Debug, Clone)]
pub struct BackplaneConfig {
    /// Server host name or address
    pub server: String,

    /// Server port
    pub port: u16,

    /// Database holding the log collection
    pub database: String,

    /// Name of the capped log collection
    pub collection: String,

    /// Allow reads from secondary members of a replica set
    pub allow_secondary_reads: bool,

    /// Maximum size of the capped log collection in bytes
    pub max_log_size: u64,
}

impl BackplaneConfig {
    /// Create a configuration for the given server, database, and log
    /// collection, with defaults for everything else
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_PORT,
            database: database.into(),
            collection: collection.into(),
            allow_secondary_reads: false,
            max_log_size: DEFAULT_MAX_LOG_SIZE,
        }
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Allow reads from secondary replica-set members
    pub fn allow_secondary_reads(mut self, allow: bool) -> Self {
        self.allow_secondary_reads = allow;
        self
    }

    /// Set the maximum size of the capped log collection in bytes
    pub fn max_log_size(mut self, bytes: u64) -> Self {
        self.max_log_size = bytes;
        self
    }

    /// Validate the configuration
    ///
    /// Fails fast on an empty server, zero port, empty database, or empty
    /// collection name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::MissingServer);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::MissingDatabase);
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::MissingCollection);
        }
        Ok(())
    }

    /// Connection string for the configured server
    ///
    /// Server selection is bounded so an unreachable store fails the
    /// connection attempt instead of hanging it.
    pub(crate) fn connection_uri(&self) -> String {
        let mut uri = format!(
            "mongodb://{}:{}/?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000",
            self.server, self.port
        );
        if self.allow_secondary_reads {
            uri.push_str("&readPreference=secondaryPreferred");
        }
        uri
    }
}
