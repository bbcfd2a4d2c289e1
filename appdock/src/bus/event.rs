//! Command event wire format and endpoint identity.

use crate::bus::BusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope name used on every bus message.
pub const COMMAND_EVENT: &str = "command-event";

/// One message on the command bus.
///
/// `app_id` addresses a specific app endpoint; absent means broadcast to
/// every endpoint except the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Application-level event name handlers are keyed on.
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "appId", skip_serializing_if = "Option::is_none", default)]
    pub app_id: Option<String>,
}

impl CommandEvent {
    /// Broadcast event addressed to every other endpoint.
    pub fn broadcast(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            app_id: None,
        }
    }

    /// Event addressed to a single app endpoint.
    pub fn addressed(
        event_type: impl Into<String>,
        payload: serde_json::Value,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            app_id: Some(app_id.into()),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.app_id.is_none()
    }

    /// Wraps the event in its wire envelope:
    /// `{"event": "command-event", "data": {...}}`. Socket-style channels
    /// carry every bus message under the [`COMMAND_EVENT`] name.
    pub fn to_frame(&self) -> serde_json::Value {
        serde_json::json!({ "event": COMMAND_EVENT, "data": self })
    }

    /// Parses a wire frame, rejecting envelopes not named
    /// [`COMMAND_EVENT`].
    pub fn from_frame(frame: &serde_json::Value) -> Result<Self, BusError> {
        match frame.get("event").and_then(serde_json::Value::as_str) {
            Some(COMMAND_EVENT) => {}
            Some(other) => {
                return Err(BusError::Decode(format!("unexpected envelope '{other}'")))
            }
            None => return Err(BusError::Decode("frame has no envelope name".into())),
        }
        let data = frame
            .get("data")
            .ok_or_else(|| BusError::Decode("frame has no data".into()))?;
        serde_json::from_value(data.clone()).map_err(|e| BusError::Decode(e.to_string()))
    }
}

/// Who an endpoint is on the bus: the container shell or one hosted app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BusIdentity {
    Container,
    App(String),
}

impl BusIdentity {
    /// Routing key this identity registers under.
    pub fn channel_key(&self) -> String {
        match self {
            Self::Container => "container".to_string(),
            Self::App(id) => id.clone(),
        }
    }
}

impl fmt::Display for BusIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container => write!(f, "container"),
            Self::App(id) => write!(f, "app:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_renamed_fields() {
        let event = CommandEvent::addressed("ping", serde_json::json!({"n": 1}), "shop");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ping");
        assert_eq!(json["appId"], "shop");
        assert_eq!(json["payload"]["n"], 1);
    }

    #[test]
    fn broadcast_omits_app_id() {
        let event = CommandEvent::broadcast("refresh", serde_json::Value::Null);
        assert!(event.is_broadcast());
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("appId"));
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let event: CommandEvent = serde_json::from_str(r#"{"type":"refresh"}"#).unwrap();
        assert_eq!(event.payload, serde_json::Value::Null);
        assert!(event.is_broadcast());
    }

    #[test]
    fn frame_wraps_event_under_envelope_name() {
        let event = CommandEvent::addressed("ping", serde_json::json!({"n": 1}), "shop");
        let frame = event.to_frame();
        assert_eq!(frame["event"], COMMAND_EVENT);
        assert_eq!(frame["data"]["type"], "ping");

        let decoded = CommandEvent::from_frame(&frame).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn foreign_envelope_is_rejected() {
        let frame = serde_json::json!({ "event": "other-event", "data": {"type": "ping"} });
        assert!(matches!(
            CommandEvent::from_frame(&frame),
            Err(BusError::Decode(_))
        ));
        let bare = serde_json::json!({ "type": "ping" });
        assert!(CommandEvent::from_frame(&bare).is_err());
    }

    #[test]
    fn identity_channel_keys() {
        assert_eq!(BusIdentity::Container.channel_key(), "container");
        assert_eq!(BusIdentity::App("shop".into()).channel_key(), "shop");
        assert_eq!(BusIdentity::App("shop".into()).to_string(), "app:shop");
    }
}
