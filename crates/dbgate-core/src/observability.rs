use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Snapshot of one unit of work's change tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerCounts {
    pub unchanged: usize,
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl TrackerCounts {
    /// Records `save_changes` would write.
    pub fn pending(&self) -> usize {
        self.added + self.modified + self.deleted
    }

    pub fn tracked(&self) -> usize {
        self.unchanged + self.pending()
    }
}

/// Install a fmt subscriber. `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
