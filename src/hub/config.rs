//! Hub configuration

/// Configuration for the in-process fan-out hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Catch-up records retained per event key
    ///
    /// Oldest records are dropped when the backlog overflows, mirroring
    /// the ring semantics of the shared log itself.
    pub backlog_capacity: usize,

    /// Capacity of each broadcast channel used to wake parked waiters
    pub broadcast_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: 1024,
            broadcast_capacity: 256,
        }
    }
}

impl HubConfig {
    /// Set the per-key catch-up backlog capacity
    pub fn backlog_capacity(mut self, capacity: usize) -> Self {
        self.backlog_capacity = capacity.max(1);
        self
    }

    /// Set the broadcast channel capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.backlog_capacity, 1024);
        assert_eq!(config.broadcast_capacity, 256);
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .backlog_capacity(16)
            .broadcast_capacity(8);

        assert_eq!(config.backlog_capacity, 16);
        assert_eq!(config.broadcast_capacity, 8);
    }

    #[test]
    fn test_capacities_never_zero() {
        let config = HubConfig::default().backlog_capacity(0).broadcast_capacity(0);

        assert_eq!(config.backlog_capacity, 1);
        assert_eq!(config.broadcast_capacity, 1);
    }
}
