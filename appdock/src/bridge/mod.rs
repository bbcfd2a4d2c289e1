//! Cross-boundary context bridge.
//!
//! Shares host-owned platform state (user, session, installed apps,
//! navigation) with remotes through a watch channel, falling back to a
//! synthesized development identity when no platform host is present.

mod context;
mod env;
mod state;

pub use context::{
    BridgeError, BridgeOptions, ContextBridge, Dispatcher, PlatformContext, FALLBACK_SESSION_HOURS,
    FALLBACK_SESSION_ID, FALLBACK_SESSION_TOKEN, FALLBACK_USER_EMAIL, FALLBACK_USER_ID,
    FALLBACK_USER_NAME,
};
pub use env::{HostEnvironment, StandaloneEnvironment, StaticEnvironment};
pub use state::{
    reduce, Action, ContextSnapshot, InstalledApp, MenuItem, PlatformSession, PlatformState,
    PlatformUser,
};
