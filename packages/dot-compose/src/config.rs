//! Configuration for the compose service and the RPC chain client

use serde::{Deserialize, Serialize};

/// Compose service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeConfig {
    /// Mortality period requested for new payloads (rounded up to a power of two)
    #[serde(default = "default_era_period")]
    pub era_period: u64,
    /// How long a round 1 session stays consumable
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Tip attached to every payload (in planck)
    #[serde(default)]
    pub tip: u128,
}

/// Upper bound on the session TTL (100 years)
const MAX_SESSION_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn default_era_period() -> u64 {
    50
}

fn default_session_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            era_period: default_era_period(),
            session_ttl_secs: default_session_ttl_secs(),
            tip: 0,
        }
    }
}

impl ComposeConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs.min(MAX_SESSION_TTL_SECS) as i64)
    }
}

/// JSON-RPC endpoint of a Substrate node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcConfig {
    /// HTTP(S) URL of the node
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}
