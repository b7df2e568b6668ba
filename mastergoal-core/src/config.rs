//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::animation::AnimationTiming;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Host-independent client settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Service root, without trailing slash (`.../api`).
    pub base_url: String,
    pub timing: AnimationTiming,
    /// How long a notice banner stays up.
    pub notice_ttl_ms: u64,
    /// Period at which hosts call `BoardController::tick` while something is animating.
    pub frame_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timing: AnimationTiming::default(),
            notice_ttl_ms: 3000,
            frame_ms: 30,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}
