//! Remote descriptors and module cache keys.
//!
//! A "remote" is an independently built application bundle loadable at
//! runtime. The host identifies a loadable unit by a [`RemoteDescriptor`]
//! (where the bundle lives, which container scope it registers, and which
//! export to instantiate). The loader keys its cache on the strongly typed
//! [`ModuleKey`] derived from a descriptor, rather than a joined string.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Conventional file name of a remote's bootstrap script.
pub const REMOTE_ENTRY_FILE: &str = "remoteEntry.js";

/// Identifies a loadable unit published by a remote.
///
/// Immutable; constructed by the caller from app registry data. The same
/// descriptor always resolves to the same cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDescriptor {
    /// Base URL the remote is served from, without a trailing slash.
    pub remote_url: String,
    /// Container scope the remote registers its exports under.
    pub scope: String,
    /// Named export to instantiate from the container.
    pub module_export: String,
}

impl RemoteDescriptor {
    /// Creates a descriptor, trimming any trailing slash from the URL so
    /// that equivalent descriptors produce equal cache keys.
    pub fn new(
        remote_url: impl Into<String>,
        scope: impl Into<String>,
        module_export: impl Into<String>,
    ) -> Self {
        let mut remote_url = remote_url.into();
        while remote_url.ends_with('/') {
            remote_url.pop();
        }
        Self {
            remote_url,
            scope: scope.into(),
            module_export: module_export.into(),
        }
    }

    /// URL of the remote's bootstrap script: `{remote_url}/remoteEntry.js`.
    pub fn entry_url(&self) -> String {
        format!("{}/{}", self.remote_url, REMOTE_ENTRY_FILE)
    }

    /// Stable identifier for the injected bootstrap script.
    ///
    /// Derived only from the remote URL, so every descriptor pointing at the
    /// same remote shares one injection regardless of scope or export. The
    /// readable part replaces non-alphanumeric characters, which can make
    /// distinct URLs read the same, so a hash of the exact URL keeps the
    /// ids distinct.
    pub fn element_id(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.remote_url.hash(&mut hasher);
        let sanitized: String = self
            .remote_url
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("remote-entry-{}-{:016x}", sanitized, hasher.finish())
    }

    /// The cache key for this descriptor.
    pub fn key(&self) -> ModuleKey {
        ModuleKey {
            remote_url: self.remote_url.clone(),
            scope: self.scope.clone(),
            module_export: self.module_export.clone(),
        }
    }
}

/// Composite cache key: `(remote_url, scope, module_export)`.
///
/// Displays as `url:scope:export` for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub remote_url: String,
    pub scope: String,
    pub module_export: String,
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.remote_url, self.scope, self.module_export
        )
    }
}
