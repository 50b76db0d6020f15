use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

/// State store settings. The whole `[state]` section may be omitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// Period of the background sweep that reclaims TTL-expired entries.
    pub sweep_interval: HumanDuration,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            sweep_interval: HumanDuration::from(Duration::from_secs(30)),
        }
    }
}
