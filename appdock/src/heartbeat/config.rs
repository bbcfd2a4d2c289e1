//! Heartbeat configuration and runtime updates.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between periodic beats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Identifies the app on the backend and how often to report in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatConfig {
    /// App identifier the beats are filed under.
    pub app_id: String,
    /// Backend base URL, without a trailing slash.
    pub backend_url: String,
    /// Interval between periodic beats.
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    /// Free-form metadata attached to every beat.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl HeartbeatConfig {
    pub fn new(app_id: impl Into<String>, backend_url: impl Into<String>) -> Self {
        let mut backend_url = backend_url.into();
        while backend_url.ends_with('/') {
            backend_url.pop();
        }
        Self {
            app_id: app_id.into(),
            backend_url,
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            metadata: serde_json::Map::new(),
        }
    }

    /// Full heartbeat endpoint: `{backend_url}/api/apps/{app_id}/heartbeat`.
    pub fn endpoint_url(&self) -> String {
        format!("{}/api/apps/{}/heartbeat", self.backend_url, self.app_id)
    }

    /// Merges a partial update in place. Present fields replace their
    /// current value wholesale; metadata is not deep-merged.
    pub fn apply(&mut self, update: HeartbeatConfigUpdate) {
        if let Some(app_id) = update.app_id {
            self.app_id = app_id;
        }
        if let Some(backend_url) = update.backend_url {
            self.backend_url = backend_url;
            while self.backend_url.ends_with('/') {
                self.backend_url.pop();
            }
        }
        if let Some(interval) = update.interval {
            self.interval = interval;
        }
        if let Some(metadata) = update.metadata {
            self.metadata = metadata;
        }
    }
}

/// Partial [`HeartbeatConfig`]; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatConfigUpdate {
    pub app_id: Option<String>,
    pub backend_url: Option<String>,
    pub interval: Option<Duration>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
