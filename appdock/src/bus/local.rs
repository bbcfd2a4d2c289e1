//! In-process event hub wiring endpoints together.
//!
//! Routing rules: an addressed event goes only to the target endpoint, an
//! unknown target is a silent drop, and a broadcast goes to every endpoint
//! except the sender.

use super::command_bus::{BusError, CommandBus, EventChannel};
use super::event::{BusIdentity, CommandEvent};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Shared routing table for a set of in-process endpoints.
#[derive(Debug, Clone, Default)]
pub struct LocalHub {
    endpoints: Arc<DashMap<String, mpsc::UnboundedSender<CommandEvent>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint and returns its outbound channel plus the
    /// receiver its dispatch loop should drain.
    ///
    /// Connecting the same identity again replaces the previous endpoint.
    pub fn connect(
        &self,
        identity: &BusIdentity,
    ) -> (LocalChannel, mpsc::UnboundedReceiver<CommandEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = identity.channel_key();
        self.endpoints.insert(key.clone(), tx);
        debug!(identity = %identity, "endpoint connected to local hub");
        (
            LocalChannel {
                origin: key,
                endpoints: Arc::clone(&self.endpoints),
            },
            rx,
        )
    }

    /// Removes an endpoint from the routing table.
    pub fn disconnect(&self, identity: &BusIdentity) {
        if self.endpoints.remove(&identity.channel_key()).is_some() {
            debug!(identity = %identity, "endpoint disconnected from local hub");
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

/// Outbound channel for one endpoint on a [`LocalHub`].
#[derive(Debug, Clone)]
pub struct LocalChannel {
    origin: String,
    endpoints: Arc<DashMap<String, mpsc::UnboundedSender<CommandEvent>>>,
}

impl EventChannel for LocalChannel {
    fn is_connected(&self) -> bool {
        self.endpoints.contains_key(&self.origin)
    }

    fn send(&self, event: CommandEvent) -> Result<(), BusError> {
        match &event.app_id {
            Some(target) => {
                // Unknown targets are dropped, not errors; apps come and go.
                if let Some(endpoint) = self.endpoints.get(target) {
                    endpoint
                        .send(event.clone())
                        .map_err(|e| BusError::Send(e.to_string()))?;
                } else {
                    trace!(target, event_type = %event.event_type, "no endpoint for target, dropping");
                }
            }
            None => {
                for endpoint in self.endpoints.iter() {
                    if endpoint.key() == &self.origin {
                        continue;
                    }
                    // A closed receiver just means that endpoint is gone.
                    let _ = endpoint.value().send(event.clone());
                }
            }
        }
        Ok(())
    }
}

/// Spawns the dispatch loop draining `rx` into `bus`.
pub fn spawn_dispatch(
    bus: Arc<CommandBus>,
    mut rx: mpsc::UnboundedReceiver<CommandEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            bus.dispatch(event);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<CommandEvent>) -> Vec<CommandEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn addressed_event_reaches_only_target() {
        let hub = LocalHub::new();
        let (container, _container_rx) = hub.connect(&BusIdentity::Container);
        let (_shop, mut shop_rx) = hub.connect(&BusIdentity::App("shop".into()));
        let (_billing, mut billing_rx) = hub.connect(&BusIdentity::App("billing".into()));

        container
            .send(CommandEvent::addressed(
                "refresh",
                serde_json::Value::Null,
                "shop",
            ))
            .unwrap();

        assert_eq!(drain(&mut shop_rx).len(), 1);
        assert!(drain(&mut billing_rx).is_empty());
    }

    #[test]
    fn broadcast_skips_sender() {
        let hub = LocalHub::new();
        let (container, mut container_rx) = hub.connect(&BusIdentity::Container);
        let (_shop, mut shop_rx) = hub.connect(&BusIdentity::App("shop".into()));
        let (_billing, mut billing_rx) = hub.connect(&BusIdentity::App("billing".into()));

        container
            .send(CommandEvent::broadcast("refresh", serde_json::Value::Null))
            .unwrap();

        assert!(drain(&mut container_rx).is_empty());
        assert_eq!(drain(&mut shop_rx).len(), 1);
        assert_eq!(drain(&mut billing_rx).len(), 1);
    }

    #[test]
    fn unknown_target_is_silently_dropped() {
        let hub = LocalHub::new();
        let (container, _rx) = hub.connect(&BusIdentity::Container);

        let result = container.send(CommandEvent::addressed(
            "refresh",
            serde_json::Value::Null,
            "ghost",
        ));
        assert!(result.is_ok());
    }

    #[test]
    fn disconnect_marks_channel_disconnected() {
        let hub = LocalHub::new();
        let identity = BusIdentity::App("shop".into());
        let (channel, _rx) = hub.connect(&identity);

        assert!(channel.is_connected());
        hub.disconnect(&identity);
        assert!(!channel.is_connected());
        assert_eq!(hub.endpoint_count(), 0);
    }
}
