//! Periodic liveness reporting to the platform backend.
//!
//! Each hosted app runs one [`HeartbeatEmitter`], which POSTs an online
//! beat on start, one per configured interval, and a final offline beat on
//! stop. Delivery goes through the [`HeartbeatTransport`] seam so tests
//! never touch the network.

mod config;
mod emitter;
mod transport;

pub use config::{HeartbeatConfig, HeartbeatConfigUpdate, DEFAULT_HEARTBEAT_INTERVAL};
pub use emitter::{HeartbeatEmitter, HeartbeatStats};
pub use transport::{
    HeartbeatAck, HeartbeatBody, HeartbeatSendError, HeartbeatStatus, HeartbeatTransport,
    HttpHeartbeatTransport,
};
