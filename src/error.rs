//! Error types for the backplane
//!
//! Configuration problems are surfaced synchronously at construction and
//! never retried. Connection-establishment failures are shared with every
//! caller waiting on the same attempt. Append and tail errors are handled
//! internally; publishers never observe them.

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, BackplaneError>;

/// Invalid configuration detected before any network activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Server address is empty
    MissingServer,
    /// Port is zero
    ZeroPort,
    /// Database name is empty
    MissingDatabase,
    /// Log collection name is empty
    MissingCollection,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingServer => write!(f, "server address must be set"),
            ConfigError::ZeroPort => write!(f, "port must be non-zero"),
            ConfigError::MissingDatabase => write!(f, "database name must be set"),
            ConfigError::MissingCollection => write!(f, "log collection name must be set"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Error type for backplane operations
///
/// `Clone` so a single connection attempt can hand the same failure to
/// every waiter that coalesced onto it.
#[derive(Debug, Clone)]
pub enum BackplaneError {
    /// Invalid configuration
    Config(ConfigError),
    /// Connecting to or setting up the log store failed
    Connection(mongodb::error::Error),
    /// The named collection exists but is not capped
    CollectionNotCapped(String),
    /// Appending a record failed (internal; counted and logged, never
    /// returned to publishers)
    Append(mongodb::error::Error),
    /// A cursor token from the host could not be parsed
    InvalidCursor { token: String, message: String },
}

impl std::fmt::Display for BackplaneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackplaneError::Config(e) => write!(f, "invalid configuration: {}", e),
            BackplaneError::Connection(e) => write!(f, "log store connection failed: {}", e),
            BackplaneError::CollectionNotCapped(name) => {
                write!(f, "collection {} must be capped", name)
            }
            BackplaneError::Append(e) => write!(f, "append failed: {}", e),
            BackplaneError::InvalidCursor { token, message } => {
                write!(f, "invalid cursor token {:?}: {}", token, message)
            }
        }
    }
}

impl std::error::Error for BackplaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackplaneError::Config(e) => Some(e),
            BackplaneError::Connection(e) | BackplaneError::Append(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for BackplaneError {
    fn from(e: ConfigError) -> Self {
        BackplaneError::Config(e)
    }
}
