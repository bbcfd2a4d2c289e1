//! Error types for the remote module loader.

use crate::remote::ModuleKey;
use thiserror::Error;

/// Errors raised by a [`ModuleHost`](super::ModuleHost) during one step of
/// the load sequence.
///
/// Every variant is retryable: a missing container or export can be a
/// load-ordering race just as much as a network failure, so the loader
/// treats them all the same and retries the full sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The bootstrap script could not be loaded (network failure, 404).
    #[error("script load failed: {0}")]
    ScriptLoad(String),

    /// The loaded script did not register the expected container scope.
    #[error("container '{0}' not found after script load")]
    ContainerMissing(String),

    /// The container does not expose the requested export, or the factory
    /// produced a handle without the expected entry shape.
    #[error("export '{0}' missing from container")]
    ExportMissing(String),
}

/// Terminal load failures surfaced to `load_app` callers.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// All retry attempts were exhausted. Carries the identity of the
    /// failed remote/export and the last underlying cause.
    #[error("load of {key} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        key: ModuleKey,
        attempts: u32,
        last_error: HostError,
    },

    /// The in-flight load this caller joined was dropped before producing
    /// a result (e.g. the cache was cleared mid-load).
    #[error("load of {key} was abandoned before completing")]
    Abandoned { key: ModuleKey },
}

impl LoadError {
    /// The cache key of the failed load.
    pub fn key(&self) -> &ModuleKey {
        match self {
            LoadError::Exhausted { key, .. } => key,
            LoadError::Abandoned { key } => key,
        }
    }

    /// The last underlying host error, if this failure wraps one.
    pub fn last_error(&self) -> Option<&HostError> {
        match self {
            LoadError::Exhausted { last_error, .. } => Some(last_error),
            LoadError::Abandoned { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteDescriptor;

    #[test]
    fn exhausted_error_references_key_and_cause() {
        let key = RemoteDescriptor::new("https://x.test", "shop", "./App").key();
        let err = LoadError::Exhausted {
            key: key.clone(),
            attempts: 3,
            last_error: HostError::ScriptLoad("HTTP 404".into()),
        };

        let rendered = err.to_string();
        assert!(rendered.contains("https://x.test:shop:./App"));
        assert!(rendered.contains("3 attempt"));
        assert!(rendered.contains("HTTP 404"));
        assert_eq!(err.key(), &key);
        assert!(matches!(
            err.last_error(),
            Some(HostError::ScriptLoad(msg)) if msg == "HTTP 404"
        ));
    }

    #[test]
    fn abandoned_error_has_no_cause() {
        let key = RemoteDescriptor::new("https://x.test", "shop", "./App").key();
        let err = LoadError::Abandoned { key };
        assert!(err.last_error().is_none());
    }
}
