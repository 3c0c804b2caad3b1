use serde::{Deserialize, Serialize};

/// Server-level configuration shared by the exchange boundary and binary.
///
/// `max_sessions` bounds the shared session pool; per-function row worker
/// pools are configured independently at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address advertised to the catalog, `host:port`.
    pub bind: String,
    /// Maximum number of concurrently served exchange sessions.
    pub max_sessions: usize,
    /// Buffered output batches per session before backpressure applies.
    pub batch_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8815".to_string(),
            max_sessions: 128,
            batch_channel_capacity: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_bounds_sessions() {
        let config = ServerConfig::default();
        assert_eq!(config.max_sessions, 128);
        assert!(config.batch_channel_capacity > 0);
    }
}
