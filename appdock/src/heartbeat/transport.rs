//! Wire types and the transport seam for heartbeat delivery.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Liveness state reported in a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    Online,
    Offline,
}

impl HeartbeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// JSON body POSTed to the heartbeat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatBody {
    pub status: HeartbeatStatus,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Backend acknowledgement of a beat.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatAck {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum HeartbeatSendError {
    /// The request never completed (connection refused, timeout).
    #[error("heartbeat request to {url} failed: {message}")]
    Request { url: String, message: String },
    /// The backend answered with a non-success status.
    #[error("heartbeat rejected with HTTP status {status}")]
    Status { status: u16 },
    /// The acknowledgement body was not valid JSON.
    #[error("failed to decode heartbeat acknowledgement: {0}")]
    Decode(String),
    /// The HTTP client could not be constructed.
    #[error("failed to create heartbeat client: {0}")]
    Client(String),
}

/// Delivers one beat to a backend endpoint.
pub trait HeartbeatTransport: Send + Sync + 'static {
    fn send(
        &self,
        url: &str,
        body: &HeartbeatBody,
    ) -> impl std::future::Future<Output = Result<HeartbeatAck, HeartbeatSendError>> + Send;
}

/// Production transport: JSON POST over reqwest.
#[derive(Debug, Clone)]
pub struct HttpHeartbeatTransport {
    client: reqwest::Client,
}

impl HttpHeartbeatTransport {
    pub fn new() -> Result<Self, HeartbeatSendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent(concat!("appdock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HeartbeatSendError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HeartbeatTransport for HttpHeartbeatTransport {
    async fn send(
        &self,
        url: &str,
        body: &HeartbeatBody,
    ) -> Result<HeartbeatAck, HeartbeatSendError> {
        trace!(url, status = body.status.as_str(), "sending heartbeat");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| HeartbeatSendError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HeartbeatSendError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<HeartbeatAck>()
            .await
            .map_err(|e| HeartbeatSendError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_serializes_lowercase_status() {
        let body = HeartbeatBody {
            status: HeartbeatStatus::Online,
            metadata: serde_json::Map::new(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "online");
        // Empty metadata is elided entirely.
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn http_transport_builds_with_timeout_and_user_agent() {
        // Construction is fallible so builder errors surface instead of
        // silently downgrading to a default client.
        assert!(HttpHeartbeatTransport::new().is_ok());
    }

    #[test]
    fn ack_tolerates_missing_optional_fields() {
        let ack: HeartbeatAck = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(ack.success);
        assert!(ack.message.is_none());
        assert!(ack.timestamp.is_none());
    }
}
