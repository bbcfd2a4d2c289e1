//! Remote module loading: fetch, initialize and cache federated modules.
//!
//! The loader resolves a `(remote_url, scope, module_export)` triple to a
//! loaded module handle, memoizing in-flight and completed loads and
//! retrying transient failures with exponential backoff and jitter.
//! Environment-specific mechanics live behind the [`ModuleHost`] trait.

mod app_loader;
mod cache;
mod error;
mod host;
mod http_host;
mod injector;
mod metrics;
mod retry;
mod scope;

pub use app_loader::AppLoader;
pub use cache::{CacheLookup, LoadGuard, LoadOutcome, ModuleCache};
pub use error::{HostError, LoadError};
pub use host::{ContainerHandle, ModuleHandle, ModuleHost};
pub use http_host::{HttpFetch, HttpModuleHost, ReqwestFetch};
pub use injector::ScriptInjector;
pub use metrics::{LoaderMetrics, LoaderMetricsSnapshot};
pub use retry::{
    RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, MAX_JITTER_MS,
};
pub use scope::ScopeNegotiator;
