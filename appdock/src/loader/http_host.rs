//! HTTP-backed module host.
//!
//! Fetches a remote's bootstrap artifact over HTTP and resolves exports
//! from it. The HTTP layer sits behind the [`HttpFetch`] trait so tests can
//! substitute a mock transport; [`ReqwestFetch`] is the production
//! implementation.

use crate::loader::{ContainerHandle, HostError, ModuleHandle, ModuleHost};
use crate::remote::RemoteDescriptor;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("appdock/", env!("CARGO_PKG_VERSION"));

/// Minimal async HTTP GET abstraction for the module host.
pub trait HttpFetch: Send + Sync + 'static {
    /// Fetches a URL, returning the response body.
    ///
    /// Non-success statuses must map to [`HostError::ScriptLoad`].
    fn get(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, HostError>> + Send;
}

/// Production HTTP fetcher built on reqwest.
#[derive(Clone)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    /// Creates a fetcher with the default 30 second timeout.
    pub fn new() -> Result<Self, HostError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a fetcher with a custom request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HostError::ScriptLoad(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetch {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HostError> {
        trace!(url = %url, "Fetching remote artifact");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HostError::ScriptLoad(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(HostError::ScriptLoad(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| HostError::ScriptLoad(format!("failed to read response: {e}")))
    }
}

/// Module host that fetches `remoteEntry.js` over HTTP.
///
/// Injection downloads the bootstrap artifact and stores it under the
/// descriptor's element id; container resolution looks that artifact up;
/// the factory wraps it in a [`ModuleHandle`] for the requested export.
/// Federation convention requires exports to be container-relative paths
/// (`./Name`), so anything else fails with [`HostError::ExportMissing`].
pub struct HttpModuleHost<F: HttpFetch = ReqwestFetch> {
    fetch: F,
    entries: DashMap<String, Arc<Vec<u8>>>,
}

impl HttpModuleHost<ReqwestFetch> {
    /// Creates a host with the default reqwest fetcher.
    pub fn new() -> Result<Self, HostError> {
        Ok(Self::with_fetch(ReqwestFetch::new()?))
    }
}

impl<F: HttpFetch> HttpModuleHost<F> {
    /// Creates a host over a custom fetch implementation.
    pub fn with_fetch(fetch: F) -> Self {
        Self {
            fetch,
            entries: DashMap::new(),
        }
    }
}

impl<F: HttpFetch> ModuleHost for HttpModuleHost<F> {
    async fn inject_entry(&self, descriptor: &RemoteDescriptor) -> Result<(), HostError> {
        let bytes = self.fetch.get(&descriptor.entry_url()).await?;
        if bytes.is_empty() {
            return Err(HostError::ScriptLoad(format!(
                "empty bootstrap script at {}",
                descriptor.entry_url()
            )));
        }
        debug!(
            element_id = %descriptor.element_id(),
            size = bytes.len(),
            "Fetched remote bootstrap entry"
        );
        self.entries.insert(descriptor.element_id(), Arc::new(bytes));
        Ok(())
    }

    async fn init_shared_scope(&self, scope: &str) -> Result<(), HostError> {
        // Shared singletons live inside the executing environment; for a
        // fetched artifact there is nothing to register beyond recording
        // that negotiation ran.
        trace!(scope = %scope, "Shared scope initialized");
        Ok(())
    }

    async fn resolve_container(
        &self,
        descriptor: &RemoteDescriptor,
    ) -> Result<ContainerHandle, HostError> {
        match self.entries.get(&descriptor.element_id()) {
            Some(entry) => Ok(ContainerHandle::new(
                &descriptor.scope,
                Arc::clone(entry.value()) as Arc<dyn std::any::Any + Send + Sync>,
            )),
            None => Err(HostError::ContainerMissing(descriptor.scope.clone())),
        }
    }

    async fn factory(
        &self,
        container: &ContainerHandle,
        export: &str,
    ) -> Result<ModuleHandle, HostError> {
        if !export.starts_with("./") {
            return Err(HostError::ExportMissing(export.to_string()));
        }
        let artifact = container
            .token::<Vec<u8>>()
            .ok_or_else(|| HostError::ContainerMissing(container.scope().to_string()))?;
        Ok(ModuleHandle::new(
            export,
            Arc::new(artifact.clone()) as Arc<dyn std::any::Any + Send + Sync>,
        ))
    }

    fn verify(&self, handle: &ModuleHandle) -> Result<(), HostError> {
        match handle.payload::<Vec<u8>>() {
            Some(artifact) if !artifact.is_empty() => Ok(()),
            _ => Err(HostError::ExportMissing(handle.export().to_string())),
        }
    }

    async fn teardown(&self, element_id: &str) {
        self.entries.remove(element_id);
    }
}
