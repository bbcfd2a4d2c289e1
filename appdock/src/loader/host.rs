//! The module host abstraction.
//!
//! This trait is the seam between the loader's orchestration (caching,
//! dedup, retry, scope negotiation) and the environment-specific mechanics
//! of actually getting federated code into the process. A browser-like
//! environment injects script tags; other hosts may load dynamic libraries,
//! instantiate WASM, or spawn subprocesses - all behind the same contract.
//!
//! The loader depends on the abstraction, never on a concrete host, so
//! tests drive it with mock implementations (see the integration tests).

use crate::loader::HostError;
use crate::remote::RemoteDescriptor;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a resolved container scope.
///
/// Produced by [`ModuleHost::resolve_container`] and consumed by
/// [`ModuleHost::factory`]; the loader never inspects the token.
#[derive(Clone)]
pub struct ContainerHandle {
    scope: String,
    token: Arc<dyn Any + Send + Sync>,
}

impl ContainerHandle {
    /// Creates a handle for the given scope wrapping a host-specific token.
    pub fn new(scope: impl Into<String>, token: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            scope: scope.into(),
            token,
        }
    }

    /// The container scope this handle resolves.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Downcasts the host-specific token.
    pub fn token<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.token.downcast_ref::<T>()
    }
}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Handle to a loaded module, cheap to clone and share between callers.
///
/// The payload is host-specific: the HTTP host stores the fetched artifact,
/// a dynamic-library host would store the loaded symbol table, and so on.
#[derive(Clone)]
pub struct ModuleHandle {
    export: String,
    payload: Arc<dyn Any + Send + Sync>,
}

impl ModuleHandle {
    /// Creates a handle for a factory-instantiated export.
    pub fn new(export: impl Into<String>, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            export: export.into(),
            payload,
        }
    }

    /// The export name this module was instantiated from.
    pub fn export(&self) -> &str {
        &self.export
    }

    /// Downcasts the host-specific payload.
    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("export", &self.export)
            .finish_non_exhaustive()
    }
}

/// Environment-specific loading primitive behind the loader's contract.
///
/// The loader invokes these hooks in order for each attempt: inject the
/// bootstrap entry, initialize the shared dependency scope, resolve the
/// named container, invoke the factory for the requested export, then
/// verify the handle. Hosts only implement mechanics; idempotence of
/// injection and once-per-scope negotiation are enforced by the loader.
pub trait ModuleHost: Send + Sync + 'static {
    /// Loads the remote's bootstrap entry into the environment.
    ///
    /// Called at most once per remote URL per process (the loader
    /// deduplicates by the descriptor's derived element id). A failed
    /// injection is not recorded, so the next attempt re-injects.
    fn inject_entry(
        &self,
        descriptor: &RemoteDescriptor,
    ) -> impl std::future::Future<Output = Result<(), HostError>> + Send;

    /// Registers shared runtime libraries as singletons for the scope.
    ///
    /// Called once per scope per process; later loads of the same scope
    /// skip negotiation entirely.
    fn init_shared_scope(
        &self,
        scope: &str,
    ) -> impl std::future::Future<Output = Result<(), HostError>> + Send;

    /// Resolves the named container registered by the bootstrap script.
    fn resolve_container(
        &self,
        descriptor: &RemoteDescriptor,
    ) -> impl std::future::Future<Output = Result<ContainerHandle, HostError>> + Send;

    /// Invokes the container's factory for the requested export.
    fn factory(
        &self,
        container: &ContainerHandle,
        export: &str,
    ) -> impl std::future::Future<Output = Result<ModuleHandle, HostError>> + Send;

    /// Verifies the factory result exposes the expected entry shape.
    ///
    /// The default accepts every handle; hosts with a richer artifact
    /// format should override and fail with [`HostError::ExportMissing`].
    fn verify(&self, _handle: &ModuleHandle) -> Result<(), HostError> {
        Ok(())
    }

    /// Releases whatever `inject_entry` installed for an element id.
    ///
    /// Invoked by `clear_cache` for every previously injected entry.
    fn teardown(
        &self,
        _element_id: &str,
    ) -> impl std::future::Future<Output = ()> + Send {
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_handle_downcasts_token() {
        let handle = ContainerHandle::new("shop", Arc::new(42u32));
        assert_eq!(handle.scope(), "shop");
        assert_eq!(handle.token::<u32>(), Some(&42));
        assert!(handle.token::<String>().is_none());
    }

    #[test]
    fn module_handle_downcasts_payload() {
        let handle = ModuleHandle::new("./App", Arc::new("entry".to_string()));
        assert_eq!(handle.export(), "./App");
        assert_eq!(handle.payload::<String>().map(String::as_str), Some("entry"));
    }

    #[test]
    fn debug_omits_opaque_payload() {
        let handle = ModuleHandle::new("./App", Arc::new(1u8));
        let rendered = format!("{handle:?}");
        assert!(rendered.contains("./App"));
    }
}
