//! Bootstrap script injection, deduplicated by derived element id.
//!
//! Each remote URL maps to one stable element id; the first load for any
//! descriptor pointing at that URL performs the injection, every later load
//! (any scope or export) finds it already done. A failed injection is not
//! recorded, so the retrying attempt injects again.

use crate::loader::{HostError, ModuleHost};
use crate::remote::RemoteDescriptor;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Tracks which bootstrap entries have been injected.
pub struct ScriptInjector {
    /// Per-element-id latch: `true` once injection succeeded. The mutex
    /// serializes concurrent first-injections of the same remote URL
    /// arriving through different cache keys.
    entries: DashMap<String, Arc<Mutex<bool>>>,
    /// Successful injections performed since creation or the last reset.
    injections: AtomicU64,
}

impl ScriptInjector {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            injections: AtomicU64::new(0),
        }
    }

    /// Injects the descriptor's bootstrap entry unless already done.
    ///
    /// Returns `true` if this call performed the injection, `false` if it
    /// was already in place.
    pub async fn ensure_injected<H: ModuleHost>(
        &self,
        host: &H,
        descriptor: &RemoteDescriptor,
    ) -> Result<bool, HostError> {
        let element_id = descriptor.element_id();
        let latch = self
            .entries
            .entry(element_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(false)))
            .clone();

        let mut injected = latch.lock().await;
        if *injected {
            return Ok(false);
        }

        host.inject_entry(descriptor).await?;
        *injected = true;
        self.injections.fetch_add(1, Ordering::Relaxed);
        debug!(
            element_id = %element_id,
            entry_url = %descriptor.entry_url(),
            "Injected remote bootstrap entry"
        );
        Ok(true)
    }

    /// Whether the element id has a completed injection.
    pub fn is_injected(&self, element_id: &str) -> bool {
        self.entries
            .get(element_id)
            .map(|latch| latch.try_lock().map(|done| *done).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Number of injections performed.
    pub fn injection_count(&self) -> u64 {
        self.injections.load(Ordering::Relaxed)
    }

    /// Forgets all injected entries, returning their element ids so the
    /// caller can tear them down. The injection counter is not reset; it
    /// counts injections over the injector's lifetime.
    pub fn drain(&self) -> Vec<String> {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .map(|done| *done)
                    .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();
        self.entries.clear();
        ids
    }
}

impl Default for ScriptInjector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{ContainerHandle, ModuleHandle};
    use std::sync::atomic::AtomicU32;

    /// Host that counts injections and optionally fails the first N.
    struct CountingHost {
        inject_calls: AtomicU32,
        fail_first: u32,
    }

    impl CountingHost {
        fn new(fail_first: u32) -> Self {
            Self {
                inject_calls: AtomicU32::new(0),
                fail_first,
            }
        }
    }

    impl ModuleHost for CountingHost {
        async fn inject_entry(&self, _descriptor: &RemoteDescriptor) -> Result<(), HostError> {
            let call = self.inject_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(HostError::ScriptLoad("simulated failure".into()))
            } else {
                Ok(())
            }
        }

        async fn init_shared_scope(&self, _scope: &str) -> Result<(), HostError> {
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
            Ok(ModuleHandle::new(export, Arc::new(())))
        }
    }

    fn descriptor() -> RemoteDescriptor {
        RemoteDescriptor::new("https://apps.test/shop", "shop", "./App")
    }

    #[tokio::test]
    async fn injects_once_per_remote_url() {
        let injector = ScriptInjector::new();
        let host = CountingHost::new(0);

        assert!(injector.ensure_injected(&host, &descriptor()).await.unwrap());
        assert!(!injector.ensure_injected(&host, &descriptor()).await.unwrap());

        // Different export, same remote URL: still no second injection.
        let widget = RemoteDescriptor::new("https://apps.test/shop", "shop", "./Widget");
        assert!(!injector.ensure_injected(&host, &widget).await.unwrap());

        assert_eq!(host.inject_calls.load(Ordering::SeqCst), 1);
        assert_eq!(injector.injection_count(), 1);
    }

    #[tokio::test]
    async fn failed_injection_is_retried() {
        let injector = ScriptInjector::new();
        let host = CountingHost::new(1);

        let err = injector.ensure_injected(&host, &descriptor()).await;
        assert!(err.is_err());
        assert!(!injector.is_injected(&descriptor().element_id()));

        assert!(injector.ensure_injected(&host, &descriptor()).await.unwrap());
        assert!(injector.is_injected(&descriptor().element_id()));
        assert_eq!(host.inject_calls.load(Ordering::SeqCst), 2);
        assert_eq!(injector.injection_count(), 1);
    }

    #[tokio::test]
    async fn drain_returns_injected_ids_and_forgets_them() {
        let injector = ScriptInjector::new();
        let host = CountingHost::new(0);

        injector.ensure_injected(&host, &descriptor()).await.unwrap();
        let drained = injector.drain();
        assert_eq!(drained, vec![descriptor().element_id()]);
        assert!(!injector.is_injected(&descriptor().element_id()));

        // A fresh load injects again.
        assert!(injector.ensure_injected(&host, &descriptor()).await.unwrap());
        assert_eq!(injector.injection_count(), 2);
    }
}
