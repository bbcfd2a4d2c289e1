//! Background heartbeat emitter.
//!
//! Sends an immediate online beat on start, then one per interval from a
//! spawned task until stopped. Stopping cancels the task and sends a final
//! offline beat. Individual send failures are logged and counted but never
//! stop the loop.

use super::config::{HeartbeatConfig, HeartbeatConfigUpdate};
use super::transport::{HeartbeatBody, HeartbeatSendError, HeartbeatStatus, HeartbeatTransport};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters exposed by [`HeartbeatEmitter::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatStats {
    pub beats_sent: u64,
    pub send_failures: u64,
}

/// Periodic liveness reporter for one app.
pub struct HeartbeatEmitter<T: HeartbeatTransport> {
    transport: Arc<T>,
    config: RwLock<HeartbeatConfig>,
    config_changed: Notify,
    shutdown: Mutex<Option<CancellationToken>>,
    running: AtomicBool,
    beats_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl<T: HeartbeatTransport> HeartbeatEmitter<T> {
    pub fn new(transport: T, config: HeartbeatConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config: RwLock::new(config),
            config_changed: Notify::new(),
            shutdown: Mutex::new(None),
            running: AtomicBool::new(false),
            beats_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    /// Starts the periodic loop.
    ///
    /// Sends one online beat immediately, then spawns the interval task.
    /// Calling start on an already-running emitter is a logged no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("heartbeat emitter already running, ignoring start");
            return;
        }

        let token = CancellationToken::new();
        *self.shutdown.lock().await = Some(token.clone());

        if let Err(error) = self.send_heartbeat(HeartbeatStatus::Online, None).await {
            warn!(%error, "initial heartbeat failed");
        }

        let emitter = Arc::clone(self);
        tokio::spawn(async move {
            emitter.run(token).await;
        });

        let config = self.config.read().await;
        info!(
            app_id = %config.app_id,
            interval_secs = config.interval.as_secs(),
            "heartbeat emitter started"
        );
    }

    /// Stops the loop and sends a final offline beat.
    ///
    /// No-op if the emitter is not running.
    pub async fn stop(&self) {
        let token = match self.shutdown.lock().await.take() {
            Some(token) => token,
            None => return,
        };
        token.cancel();
        self.running.store(false, Ordering::SeqCst);

        if let Err(error) = self.send_heartbeat(HeartbeatStatus::Offline, None).await {
            warn!(%error, "final offline heartbeat failed");
        }
        info!("heartbeat emitter stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sends one beat now, outside the periodic schedule.
    ///
    /// `overrides` are merged over the configured metadata, call-site keys
    /// winning on conflict.
    pub async fn send_heartbeat(
        &self,
        status: HeartbeatStatus,
        overrides: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<(), HeartbeatSendError> {
        let (url, mut metadata) = {
            let config = self.config.read().await;
            (config.endpoint_url(), config.metadata.clone())
        };
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                metadata.insert(key, value);
            }
        }

        let body = HeartbeatBody { status, metadata };
        match self.transport.send(&url, &body).await {
            Ok(ack) => {
                self.beats_sent.fetch_add(1, Ordering::Relaxed);
                debug!(
                    status = body.status.as_str(),
                    success = ack.success,
                    "heartbeat acknowledged"
                );
                Ok(())
            }
            Err(error) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(error)
            }
        }
    }

    /// Applies a partial configuration update.
    ///
    /// The running loop is nudged to restart its current cycle, so a new
    /// interval takes effect without a restart.
    pub async fn update_config(&self, update: HeartbeatConfigUpdate) {
        self.config.write().await.apply(update);
        // notify_one stores a permit, so an update landing before the loop
        // reaches its select still interrupts the next cycle.
        self.config_changed.notify_one();
    }

    pub async fn config(&self) -> HeartbeatConfig {
        self.config.read().await.clone()
    }

    pub fn stats(&self) -> HeartbeatStats {
        HeartbeatStats {
            beats_sent: self.beats_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let interval = self.config.read().await.interval;
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("heartbeat loop shutting down");
                    break;
                }
                // Restart the cycle so a new interval applies immediately.
                _ = self.config_changed.notified() => {}
                _ = tokio::time::sleep(interval) => {
                    if let Err(error) = self.send_heartbeat(HeartbeatStatus::Online, None).await {
                        warn!(%error, "periodic heartbeat failed");
                    }
                }
            }
        }
    }
}

impl<T: HeartbeatTransport> std::fmt::Debug for HeartbeatEmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatEmitter")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
