//! The context bridge: shared state across the host/remote boundary.
//!
//! One [`ContextBridge`] is installed per host process. Remotes observe
//! state through [`PlatformContext::use_platform`], which hands back the
//! current state plus a [`Dispatcher`] for submitting actions. In platform
//! mode every accepted action republishes the snapshot for other remotes;
//! in standalone mode the bridge synthesizes a development identity so a
//! remote runs unchanged outside the platform.

use super::env::HostEnvironment;
use super::state::{reduce, Action, ContextSnapshot, PlatformSession, PlatformState, PlatformUser};
use chrono::{Duration, Utc};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// Synthesized standalone identity. Deterministic so tests and local
/// development see stable values.
pub const FALLBACK_USER_ID: &str = "dev-user";
pub const FALLBACK_USER_NAME: &str = "Development User";
pub const FALLBACK_USER_EMAIL: &str = "dev@localhost";
pub const FALLBACK_SESSION_ID: &str = "dev-session";
pub const FALLBACK_SESSION_TOKEN: &str = "dev-token";
/// Lifetime of the synthesized session.
pub const FALLBACK_SESSION_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// `use_platform` was called before `install`.
    #[error("platform context has not been initialized")]
    NotInitialized,
    /// No platform host was found and the standalone fallback is disabled.
    #[error("no platform host present and fallback is disabled")]
    FallbackDisabled,
    /// `install` was called twice in the same process.
    #[error("platform context is already installed")]
    AlreadyInitialized,
}

/// Bridge construction options.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Synthesize a development identity when no platform host is present.
    pub allow_fallback: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            allow_fallback: true,
        }
    }
}

/// Owns the platform state and its watch channel.
pub struct ContextBridge {
    env: Arc<dyn HostEnvironment>,
    tx: watch::Sender<PlatformState>,
}

impl ContextBridge {
    /// Builds and initializes a bridge against `env`.
    ///
    /// Platform mode seeds state from the host snapshot and immediately
    /// republishes it; standalone mode synthesizes the development
    /// identity, or fails with [`BridgeError::FallbackDisabled`] when the
    /// options forbid it. Either way the resulting state has loading
    /// cleared.
    pub fn initialize(
        env: Arc<dyn HostEnvironment>,
        options: BridgeOptions,
    ) -> Result<Self, BridgeError> {
        let mut state = PlatformState::default();

        if env.is_platform() {
            state.is_platform_mode = true;
            if let Some(snapshot) = env.read_snapshot() {
                state.user = snapshot.user;
                state.session = snapshot.session;
                state.apps = snapshot.apps;
                state.active_app = snapshot.active_app;
                state.menu_items = snapshot.menu_items;
            }
            state.is_loading = false;
            env.publish_snapshot(&ContextSnapshot::from(&state));
            info!(
                user = state.user.as_ref().map(|u| u.id.as_str()),
                apps = state.apps.len(),
                "context bridge initialized in platform mode"
            );
        } else if options.allow_fallback {
            state.user = Some(PlatformUser {
                id: FALLBACK_USER_ID.to_string(),
                name: FALLBACK_USER_NAME.to_string(),
                email: FALLBACK_USER_EMAIL.to_string(),
                roles: vec!["user".to_string(), "developer".to_string()],
            });
            state.session = Some(PlatformSession {
                id: FALLBACK_SESSION_ID.to_string(),
                token: FALLBACK_SESSION_TOKEN.to_string(),
                expires_at: Utc::now() + Duration::hours(FALLBACK_SESSION_HOURS),
            });
            state.is_loading = false;
            info!("context bridge initialized standalone with development identity");
        } else {
            return Err(BridgeError::FallbackDisabled);
        }

        let (tx, _rx) = watch::channel(state);
        Ok(Self { env, tx })
    }

    /// Applies one action through the reducer and publishes the result.
    ///
    /// In platform mode the post-transition snapshot is republished so
    /// other remotes observe the change.
    pub fn dispatch(&self, action: Action) {
        debug!(?action, "dispatching platform action");
        let mut snapshot = None;
        // The reduce-and-store runs under the channel's write lock, so
        // concurrent dispatches serialize instead of clobbering each
        // other's transitions. The snapshot is taken inside the closure to
        // match the exact state this action produced.
        self.tx.send_modify(|state| {
            *state = reduce(state, action);
            if state.is_platform_mode {
                snapshot = Some(ContextSnapshot::from(&*state));
            }
        });
        if let Some(snapshot) = snapshot {
            self.env.publish_snapshot(&snapshot);
        }
    }

    /// The current state, cloned.
    pub fn snapshot(&self) -> PlatformState {
        self.tx.borrow().clone()
    }

    /// Watch-channel subscription for observers that want change
    /// notifications rather than polling.
    pub fn subscribe(&self) -> watch::Receiver<PlatformState> {
        self.tx.subscribe()
    }
}

impl std::fmt::Debug for ContextBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBridge").finish_non_exhaustive()
    }
}

/// Clonable handle for submitting actions to an installed bridge.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    bridge: Arc<ContextBridge>,
}

impl Dispatcher {
    pub fn dispatch(&self, action: Action) {
        self.bridge.dispatch(action);
    }
}

/// Process-wide access point to the installed bridge.
///
/// Mirrors what remotes call at their boundary: one [`install`] at host
/// startup, then any number of [`use_platform`] reads.
///
/// [`install`]: PlatformContext::install
/// [`use_platform`]: PlatformContext::use_platform
pub struct PlatformContext;

static BRIDGE: OnceLock<Arc<ContextBridge>> = OnceLock::new();

impl PlatformContext {
    /// Installs `bridge` as the process-wide context.
    ///
    /// Fails with [`BridgeError::AlreadyInitialized`] on a second call;
    /// the first installation wins.
    pub fn install(bridge: Arc<ContextBridge>) -> Result<(), BridgeError> {
        BRIDGE
            .set(bridge)
            .map_err(|_| BridgeError::AlreadyInitialized)
    }

    /// Current state plus a dispatcher, the way a remote consumes context.
    pub fn use_platform() -> Result<(PlatformState, Dispatcher), BridgeError> {
        let bridge = BRIDGE.get().ok_or(BridgeError::NotInitialized)?;
        Ok((
            bridge.snapshot(),
            Dispatcher {
                bridge: Arc::clone(bridge),
            },
        ))
    }

    /// Whether a bridge has been installed.
    pub fn is_installed() -> bool {
        BRIDGE.get().is_some()
    }
}
