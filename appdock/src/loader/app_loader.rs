//! The remote module loader.
//!
//! Composes the script injector, scope negotiator and module cache into a
//! single `load_app` entry point:
//!
//! 1. Register the descriptor's key in the cache. A resolved entry is
//!    returned immediately; an in-flight entry is joined; otherwise this
//!    caller leads the load.
//! 2. Per attempt: inject the bootstrap entry (idempotent), negotiate the
//!    shared scope (once per scope), resolve the container, invoke its
//!    factory for the export, verify the handle.
//! 3. On failure, sleep with exponential backoff plus jitter and retry the
//!    full sequence. After the final attempt the last cause is wrapped in
//!    [`LoadError::Exhausted`] and fanned out to joined waiters.

use crate::loader::{
    CacheLookup, HostError, LoadError, LoaderMetrics, LoaderMetricsSnapshot, ModuleCache,
    ModuleHandle, ModuleHost, RetryPolicy, ScopeNegotiator, ScriptInjector,
};
use crate::remote::{ModuleKey, RemoteDescriptor};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loads, caches and retries federated remote modules.
pub struct AppLoader<H: ModuleHost> {
    host: Arc<H>,
    cache: ModuleCache,
    injector: ScriptInjector,
    scopes: ScopeNegotiator,
    metrics: LoaderMetrics,
    default_policy: RetryPolicy,
}

impl<H: ModuleHost> AppLoader<H> {
    /// Creates a loader with the default retry policy.
    pub fn new(host: Arc<H>) -> Self {
        Self::with_policy(host, RetryPolicy::default())
    }

    /// Creates a loader with a custom default retry policy.
    pub fn with_policy(host: Arc<H>, default_policy: RetryPolicy) -> Self {
        Self {
            host,
            cache: ModuleCache::new(),
            injector: ScriptInjector::new(),
            scopes: ScopeNegotiator::new(),
            metrics: LoaderMetrics::new(),
            default_policy,
        }
    }

    /// Loads the module identified by the descriptor, using the loader's
    /// default retry policy.
    pub async fn load_app(
        &self,
        descriptor: &RemoteDescriptor,
    ) -> Result<ModuleHandle, LoadError> {
        let policy = self.default_policy.clone();
        self.load_app_with_policy(descriptor, &policy).await
    }

    /// Loads the module identified by the descriptor with an explicit
    /// retry policy.
    ///
    /// Concurrent calls for the same descriptor share one load: the first
    /// caller performs the sequence, everyone else receives its outcome.
    pub async fn load_app_with_policy(
        &self,
        descriptor: &RemoteDescriptor,
        policy: &RetryPolicy,
    ) -> Result<ModuleHandle, LoadError> {
        let key = descriptor.key();
        self.metrics.load_started();

        match self.cache.register(key.clone()) {
            CacheLookup::Ready(handle) => {
                self.metrics.cache_hit();
                debug!(key = %key, "Module served from cache");
                Ok(handle)
            }
            CacheLookup::Join(mut rx) => {
                self.metrics.load_joined();
                debug!(key = %key, "Joining in-flight load");
                match rx.recv().await {
                    Ok(outcome) => outcome,
                    // Sender dropped without an outcome: cache cleared or
                    // the leader was torn down mid-load.
                    Err(_) => Err(LoadError::Abandoned { key }),
                }
            }
            CacheLookup::Lead(guard) => {
                // The guard settles the entry. If this future is cancelled
                // mid-load, dropping it frees the key and closes the
                // joiners' channel instead of wedging the entry forever.
                let result = self.lead_load(descriptor, &key, policy).await;
                match result {
                    Ok(handle) => {
                        guard.complete(handle.clone());
                        self.metrics.load_succeeded();
                        Ok(handle)
                    }
                    Err(error) => {
                        guard.fail(error.clone());
                        self.metrics.load_failed();
                        Err(error)
                    }
                }
            }
        }
    }

    /// Runs the attempt loop for a key this caller leads.
    async fn lead_load(
        &self,
        descriptor: &RemoteDescriptor,
        key: &ModuleKey,
        policy: &RetryPolicy,
    ) -> Result<ModuleHandle, LoadError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = HostError::ScriptLoad("load never attempted".into());

        for attempt in 1..=max_attempts {
            match self.attempt(descriptor).await {
                Ok(handle) => {
                    info!(key = %key, attempt, "Remote module loaded");
                    return Ok(handle);
                }
                Err(error) => {
                    warn!(
                        key = %key,
                        attempt,
                        max_attempts,
                        error = %error,
                        "Remote load attempt failed"
                    );
                    last_error = error;
                }
            }

            // No sleep after the final attempt; the failure surfaces as-is.
            if attempt < max_attempts {
                self.metrics.retry();
                let delay = policy.backoff_delay_jittered(attempt);
                debug!(key = %key, attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        Err(LoadError::Exhausted {
            key: key.clone(),
            attempts: max_attempts,
            last_error,
        })
    }

    /// One pass of the full load sequence.
    async fn attempt(&self, descriptor: &RemoteDescriptor) -> Result<ModuleHandle, HostError> {
        self.injector
            .ensure_injected(self.host.as_ref(), descriptor)
            .await?;
        self.scopes
            .negotiate(self.host.as_ref(), &descriptor.scope)
            .await?;
        let container = self.host.resolve_container(descriptor).await?;
        let handle = self
            .host
            .factory(&container, &descriptor.module_export)
            .await?;
        self.host.verify(&handle)?;
        Ok(handle)
    }

    /// Drops every cache entry, tears down injected bootstrap entries and
    /// forgets negotiated scopes, so the next load starts from scratch.
    /// Intended for development reload; in-flight loads observe an
    /// abandoned-load error.
    pub async fn clear_cache(&self) {
        self.cache.clear();
        self.scopes.reset();
        let element_ids = self.injector.drain();
        for element_id in &element_ids {
            self.host.teardown(element_id).await;
        }
        info!(
            torn_down = element_ids.len(),
            "Module cache cleared"
        );
    }

    /// Whether the descriptor has a resolved cache entry. Pending loads do
    /// not count as cached.
    pub fn is_cached(&self, descriptor: &RemoteDescriptor) -> bool {
        self.cache.peek(&descriptor.key()).is_some()
    }

    /// Non-blocking peek at a resolved cache entry. Returns `None` when
    /// the key is absent or the load is still pending.
    pub fn get_cached(&self, descriptor: &RemoteDescriptor) -> Option<ModuleHandle> {
        self.cache.peek(&descriptor.key())
    }

    /// Number of bootstrap scripts injected over the loader's lifetime.
    pub fn injection_count(&self) -> u64 {
        self.injector.injection_count()
    }

    /// Current loader counters.
    pub fn metrics(&self) -> LoaderMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Scriptable host: counts every hook and fails a configured number of
    /// leading attempts at a chosen step.
    struct ScriptedHost {
        injects: AtomicU32,
        scope_inits: AtomicU32,
        factories: AtomicU32,
        teardowns: AtomicU32,
        fail_factory_first: u32,
    }

    impl ScriptedHost {
        fn reliable() -> Self {
            Self::failing_factory(0)
        }

        fn failing_factory(fail_factory_first: u32) -> Self {
            Self {
                injects: AtomicU32::new(0),
                scope_inits: AtomicU32::new(0),
                factories: AtomicU32::new(0),
                teardowns: AtomicU32::new(0),
                fail_factory_first,
            }
        }
    }

    impl ModuleHost for ScriptedHost {
        async fn inject_entry(&self, _descriptor: &RemoteDescriptor) -> Result<(), HostError> {
            self.injects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn init_shared_scope(&self, _scope: &str) -> Result<(), HostError> {
            self.scope_inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn resolve_container(
            &self,
            descriptor: &RemoteDescriptor,
        ) -> Result<ContainerHandle, HostError> {
            Ok(ContainerHandle::new(&descriptor.scope, Arc::new(())))
        }

        async fn factory(
            &self,
            _container: &ContainerHandle,
            export: &str,
        ) -> Result<ModuleHandle, HostError> {
            let call = self.factories.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_factory_first {
                Err(HostError::ExportMissing(export.to_string()))
            } else {
                Ok(ModuleHandle::new(export, Arc::new(())))
            }
        }

        async fn teardown(&self, _element_id: &str) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    use crate::loader::ContainerHandle;

    fn descriptor() -> RemoteDescriptor {
        RemoteDescriptor::new("https://apps.test/shop", "shop", "./App")
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn load_resolves_and_caches() {
        let host = Arc::new(ScriptedHost::reliable());
        let loader = AppLoader::new(Arc::clone(&host));

        let handle = loader.load_app(&descriptor()).await.unwrap();
        assert_eq!(handle.export(), "./App");
        assert!(loader.is_cached(&descriptor()));

        // Second call is a cache hit: no further host activity.
        loader.load_app(&descriptor()).await.unwrap();
        assert_eq!(host.injects.load(Ordering::SeqCst), 1);
        assert_eq!(host.factories.load(Ordering::SeqCst), 1);
        assert_eq!(loader.metrics().cache_hits, 1);
    }

    #[tokio::test]
    async fn transient_failure_recovers_within_policy() {
        let host = Arc::new(ScriptedHost::failing_factory(2));
        let loader = AppLoader::with_policy(Arc::clone(&host), fast_policy(3));

        let handle = loader.load_app(&descriptor()).await.unwrap();
        assert_eq!(handle.export(), "./App");
        assert_eq!(host.factories.load(Ordering::SeqCst), 3);
        assert_eq!(loader.metrics().retries, 2);
        // The entry script is injected once even across retries.
        assert_eq!(host.injects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_wraps_final_cause() {
        let host = Arc::new(ScriptedHost::failing_factory(u32::MAX));
        let loader = AppLoader::with_policy(Arc::clone(&host), fast_policy(3));

        let error = loader.load_app(&descriptor()).await.unwrap_err();
        match error {
            LoadError::Exhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last_error, HostError::ExportMissing(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(host.factories.load(Ordering::SeqCst), 3);
        // Failed loads are not cached; the next call starts over.
        assert!(!loader.is_cached(&descriptor()));
    }

    #[tokio::test]
    async fn get_cached_returns_none_for_pending() {
        let loader = AppLoader::new(Arc::new(ScriptedHost::reliable()));
        assert!(loader.get_cached(&descriptor()).is_none());
    }

    #[tokio::test]
    async fn clear_cache_triggers_teardown_and_fresh_injection() {
        let host = Arc::new(ScriptedHost::reliable());
        let loader = AppLoader::new(Arc::clone(&host));

        loader.load_app(&descriptor()).await.unwrap();
        assert_eq!(loader.injection_count(), 1);

        loader.clear_cache().await;
        assert!(!loader.is_cached(&descriptor()));
        assert_eq!(host.teardowns.load(Ordering::SeqCst), 1);

        loader.load_app(&descriptor()).await.unwrap();
        assert_eq!(loader.injection_count(), 2);
        assert_eq!(host.injects.load(Ordering::SeqCst), 2);
        assert_eq!(host.scope_inits.load(Ordering::SeqCst), 2);
    }
}
