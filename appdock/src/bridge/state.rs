//! Platform state, actions and the pure reducer.
//!
//! The bridge owns a single [`PlatformState`] instance per host lifetime.
//! It is mutated only through the fixed set of [`Action`] variants; the
//! reducer is pure, producing the next state with no side effects.
//! Snapshot types serialize camelCase because they cross the boundary to
//! remotes as JSON.

use crate::remote::RemoteDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user as seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
}

/// The active session issued by the external authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSession {
    pub id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// One installable remote app from the external registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub remote: RemoteDescriptor,
}

/// Navigation entry surfaced to the host shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub label: String,
    pub path: String,
}

/// Host-owned state readable by remotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformState {
    pub user: Option<PlatformUser>,
    pub session: Option<PlatformSession>,
    pub apps: Vec<InstalledApp>,
    pub active_app: Option<String>,
    pub menu_items: Vec<MenuItem>,
    pub is_loading: bool,
    pub is_platform_mode: bool,
    pub config: serde_json::Value,
}

impl Default for PlatformState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            apps: Vec::new(),
            active_app: None,
            menu_items: Vec::new(),
            // Loading until initialization seeds or synthesizes identity.
            is_loading: true,
            is_platform_mode: false,
            config: serde_json::Value::Null,
        }
    }
}

/// The snapshot shared across the execution boundary.
///
/// A strict subset of [`PlatformState`]: mode flags and host config stay
/// host-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub user: Option<PlatformUser>,
    pub session: Option<PlatformSession>,
    #[serde(default)]
    pub apps: Vec<InstalledApp>,
    pub active_app: Option<String>,
    #[serde(default)]
    pub menu_items: Vec<MenuItem>,
}

impl From<&PlatformState> for ContextSnapshot {
    fn from(state: &PlatformState) -> Self {
        Self {
            user: state.user.clone(),
            session: state.session.clone(),
            apps: state.apps.clone(),
            active_app: state.active_app.clone(),
            menu_items: state.menu_items.clone(),
        }
    }
}

/// The eight enumerated state transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetUser(Option<PlatformUser>),
    SetSession(Option<PlatformSession>),
    SetApps(Vec<InstalledApp>),
    SetActiveApp(Option<String>),
    SetMenuItems(Vec<MenuItem>),
    SetLoading(bool),
    SetPlatformMode(bool),
    SetConfig(serde_json::Value),
}

/// Pure state transition: returns the next state, touches nothing else.
pub fn reduce(state: &PlatformState, action: Action) -> PlatformState {
    let mut next = state.clone();
    match action {
        Action::SetUser(user) => next.user = user,
        Action::SetSession(session) => next.session = session,
        Action::SetApps(apps) => next.apps = apps,
        Action::SetActiveApp(active_app) => next.active_app = active_app,
        Action::SetMenuItems(menu_items) => next.menu_items = menu_items,
        Action::SetLoading(is_loading) => next.is_loading = is_loading,
        Action::SetPlatformMode(is_platform_mode) => next.is_platform_mode = is_platform_mode,
        Action::SetConfig(config) => next.config = config,
    }
    next
}
