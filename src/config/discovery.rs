use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Retry budget for resolving a primary
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DiscoveryConfig {
    /// Existence checks before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Fixed pause between unsuccessful attempts (unit: milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "discovery max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_attempts() -> usize {
    10
}
fn default_poll_interval_ms() -> u64 {
    1000
}
