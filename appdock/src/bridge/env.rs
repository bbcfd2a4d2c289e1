//! Host environment seam for the context bridge.
//!
//! The bridge never talks to the surrounding platform directly; it goes
//! through [`HostEnvironment`], which answers whether a platform host is
//! present and moves [`ContextSnapshot`]s across the boundary. Production
//! code wires in a real environment, tests use [`StaticEnvironment`].

use super::state::ContextSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Access to the surrounding platform host, if any.
pub trait HostEnvironment: Send + Sync + 'static {
    /// Whether a platform host marker is present in this environment.
    fn is_platform(&self) -> bool;

    /// Reads the host-published snapshot, if one exists.
    fn read_snapshot(&self) -> Option<ContextSnapshot>;

    /// Publishes a snapshot for remotes running in this environment.
    fn publish_snapshot(&self, snapshot: &ContextSnapshot);
}

/// Environment with no platform host present.
///
/// `read_snapshot` always returns `None` and publishing is a no-op, which
/// forces the bridge down its standalone fallback path.
#[derive(Debug, Default)]
pub struct StandaloneEnvironment;

impl HostEnvironment for StandaloneEnvironment {
    fn is_platform(&self) -> bool {
        false
    }

    fn read_snapshot(&self) -> Option<ContextSnapshot> {
        None
    }

    fn publish_snapshot(&self, _snapshot: &ContextSnapshot) {}
}

/// Scripted environment for tests and the demo CLI.
///
/// Reports a platform host, serves a fixed initial snapshot, and records
/// everything published back to it.
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    initial: Option<ContextSnapshot>,
    published: Mutex<Option<ContextSnapshot>>,
    publish_count: AtomicU64,
}

impl StaticEnvironment {
    /// Platform environment serving `initial` as the host snapshot.
    pub fn with_snapshot(initial: ContextSnapshot) -> Self {
        Self {
            initial: Some(initial),
            ..Self::default()
        }
    }

    /// The most recently published snapshot, if any.
    pub fn last_published(&self) -> Option<ContextSnapshot> {
        self.published.lock().ok().and_then(|guard| guard.clone())
    }

    /// How many snapshots have been published so far.
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }
}

impl HostEnvironment for StaticEnvironment {
    fn is_platform(&self) -> bool {
        true
    }

    fn read_snapshot(&self) -> Option<ContextSnapshot> {
        self.initial.clone()
    }

    fn publish_snapshot(&self, snapshot: &ContextSnapshot) {
        if let Ok(mut guard) = self.published.lock() {
            *guard = Some(snapshot.clone());
        }
        self.publish_count.fetch_add(1, Ordering::Relaxed);
    }
}
