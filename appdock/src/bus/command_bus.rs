//! Per-endpoint command bus: handler registry plus outbound channel.

use super::event::{BusIdentity, CommandEvent};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// The underlying channel is not connected.
    #[error("event channel is disconnected")]
    Disconnected,
    /// The channel accepted the event but delivery failed.
    #[error("failed to send event: {0}")]
    Send(String),
    /// A received frame could not be decoded into an event.
    #[error("failed to decode event: {0}")]
    Decode(String),
}

/// Outbound side of a bus connection.
pub trait EventChannel: Send + Sync + 'static {
    fn is_connected(&self) -> bool;
    fn send(&self, event: CommandEvent) -> Result<(), BusError>;
}

type Handler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Counters exposed by [`CommandBus::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    pub emitted: u64,
    pub dispatched: u64,
    pub dropped: u64,
}

/// One endpoint's view of the bus.
///
/// Holds at most one handler per event type; registering again replaces
/// the previous handler. Emitting while disconnected is a silent drop, so
/// a remote keeps working when the hub is absent.
pub struct CommandBus {
    identity: BusIdentity,
    channel: Arc<dyn EventChannel>,
    handlers: DashMap<String, Handler>,
    emitted: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

impl CommandBus {
    pub fn new(identity: BusIdentity, channel: Arc<dyn EventChannel>) -> Self {
        Self {
            identity,
            channel,
            handlers: DashMap::new(),
            emitted: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn identity(&self) -> &BusIdentity {
        &self.identity
    }

    /// Registers the handler for `event_type`, replacing any previous one.
    pub fn on<F>(&self, event_type: impl Into<String>, handler: F)
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let replaced = self
            .handlers
            .insert(event_type.clone(), Arc::new(handler))
            .is_some();
        debug!(identity = %self.identity, event_type, replaced, "handler registered");
    }

    /// Removes the handler for `event_type`, if one is registered.
    pub fn off(&self, event_type: &str) {
        if self.handlers.remove(event_type).is_some() {
            debug!(identity = %self.identity, event_type, "handler removed");
        }
    }

    /// Sends an event out on the channel.
    ///
    /// `target` of `None` broadcasts; a disconnected channel drops the
    /// event without error.
    pub fn emit(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        target: Option<String>,
    ) -> Result<(), BusError> {
        let event = CommandEvent {
            event_type: event_type.into(),
            payload,
            app_id: target,
        };
        if !self.channel.is_connected() {
            debug!(identity = %self.identity, event_type = %event.event_type, "channel disconnected, dropping event");
            return Ok(());
        }
        self.channel.send(event)?;
        self.emitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Delivers an inbound event to its registered handler.
    ///
    /// Unhandled event types are counted and logged at debug.
    pub fn dispatch(&self, event: CommandEvent) {
        // Clone the handler out so the map guard is released before the
        // callback runs; a handler may re-enter on()/off().
        let handler = self
            .handlers
            .get(&event.event_type)
            .map(|entry| Arc::clone(entry.value()));
        match handler {
            Some(handler) => {
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                handler(event.payload);
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    identity = %self.identity,
                    event_type = %event.event_type,
                    "no handler for event, dropping"
                );
            }
        }
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBus")
            .field("identity", &self.identity)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
