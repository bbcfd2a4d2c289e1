//! Module cache with in-flight load coalescing.
//!
//! Maps a [`ModuleKey`] to either a resolved [`ModuleHandle`] or an
//! in-flight load. When several callers request the same key, only the
//! first (the leader) performs the load; the rest subscribe to a broadcast
//! channel and receive the leader's outcome. The entry is registered
//! atomically *before* any I/O happens, so the at-most-one-in-flight-load
//! invariant holds even under true parallelism.
//!
//! The leader's obligation is reified as a [`LoadGuard`]. Settling it via
//! [`LoadGuard::complete`] or [`LoadGuard::fail`] resolves the entry; a
//! guard dropped unsettled (the leading future was cancelled) removes the
//! entry and closes the channel, so joiners surface an abandoned-load
//! error and the key is immediately loadable again. Entries carry a
//! generation tag, so a guard that outlives a [`ModuleCache::clear`]
//! cannot touch a newer entry for the same key.
//!
//! Resolved entries live until an explicit [`ModuleCache::clear`]. A
//! terminally failed load removes its entry, otherwise every later call for
//! that key would fail forever with a stale error.

use crate::loader::{LoadError, ModuleHandle};
use crate::remote::ModuleKey;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Outcome broadcast to callers that joined an in-flight load.
pub type LoadOutcome = Result<ModuleHandle, LoadError>;

/// Waiters per in-flight entry. First loads typically have 1-4 concurrent
/// joiners; 16 leaves headroom for burst mounting.
const JOINER_CAPACITY: usize = 16;

enum Slot {
    InFlight {
        tx: broadcast::Sender<LoadOutcome>,
        generation: u64,
    },
    Ready(ModuleHandle),
}

type SlotMap = Arc<DashMap<ModuleKey, Slot>>;

/// Result of registering interest in a key.
pub enum CacheLookup {
    /// The module is resolved; use this handle.
    Ready(ModuleHandle),
    /// Another caller is loading this key; wait on the receiver.
    Join(broadcast::Receiver<LoadOutcome>),
    /// This caller is the leader, must perform the load and settle the
    /// guard.
    Lead(LoadGuard),
}

impl CacheLookup {
    /// True when this caller must perform the load.
    pub fn is_lead(&self) -> bool {
        matches!(self, CacheLookup::Lead(_))
    }
}

/// The leader's obligation for one in-flight entry.
///
/// Exactly one guard exists per in-flight entry. `complete` and `fail`
/// consume it; dropping it unsettled removes the entry and closes the
/// broadcast channel, which is how a cancelled leader hands the key back.
pub struct LoadGuard {
    key: ModuleKey,
    generation: u64,
    slots: SlotMap,
    settled: bool,
}

impl LoadGuard {
    /// Promotes the entry to resolved and fans the handle out to every
    /// joined waiter. The replacement happens in place, so a caller
    /// registering concurrently can never observe a gap between the
    /// in-flight and resolved states.
    ///
    /// No-ops when the entry was cleared or superseded since this guard
    /// was issued: the generation tag no longer matches.
    pub fn complete(mut self, handle: ModuleHandle) {
        self.settled = true;
        if let Some(mut slot) = self.slots.get_mut(&self.key) {
            match &*slot {
                Slot::InFlight { generation, .. } if *generation == self.generation => {}
                _ => return,
            }
            let previous = std::mem::replace(&mut *slot, Slot::Ready(handle.clone()));
            if let Slot::InFlight { tx, .. } = previous {
                // Joiners may have given up already; a send error is fine.
                let _ = tx.send(Ok(handle));
            }
        }
    }

    /// Removes the failed entry and fans the error out to joined waiters.
    /// The next `register` for this key starts a fresh load.
    ///
    /// No-ops when the entry was cleared or superseded since this guard
    /// was issued.
    pub fn fail(mut self, error: LoadError) {
        self.settled = true;
        let removed = self.slots.remove_if(&self.key, |_, slot| {
            matches!(slot, Slot::InFlight { generation, .. } if *generation == self.generation)
        });
        if let Some((_, Slot::InFlight { tx, .. })) = removed {
            let _ = tx.send(Err(error));
        }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // An unsettled drop means the leading future was cancelled.
        // Removing the entry drops the sender with it; joiners observe a
        // closed channel and the key is free for a fresh load.
        self.slots.remove_if(&self.key, |_, slot| {
            matches!(slot, Slot::InFlight { generation, .. } if *generation == self.generation)
        });
    }
}

impl std::fmt::Debug for LoadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGuard")
            .field("key", &self.key)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

/// Concurrent module cache keyed by `(remote_url, scope, module_export)`.
pub struct ModuleCache {
    slots: SlotMap,
    generations: AtomicU64,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Registers interest in a key.
    ///
    /// The entry API makes the check-and-insert atomic: exactly one caller
    /// holds the [`LoadGuard`] for a key at any time, no matter how many
    /// register concurrently.
    pub fn register(&self, key: ModuleKey) -> CacheLookup {
        match self.slots.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(handle) => CacheLookup::Ready(handle.clone()),
                Slot::InFlight { tx, .. } => CacheLookup::Join(tx.subscribe()),
            },
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                let (tx, _rx) = broadcast::channel(JOINER_CAPACITY);
                entry.insert(Slot::InFlight { tx, generation });
                CacheLookup::Lead(LoadGuard {
                    key,
                    generation,
                    slots: Arc::clone(&self.slots),
                    settled: false,
                })
            }
        }
    }

    /// Non-blocking peek: a resolved handle, or `None` when the key is
    /// absent or still loading (pending loads do not count as cached).
    pub fn peek(&self, key: &ModuleKey) -> Option<ModuleHandle> {
        self.slots.get(key).and_then(|slot| match &*slot {
            Slot::Ready(handle) => Some(handle.clone()),
            Slot::InFlight { .. } => None,
        })
    }

    /// Whether a load for the key is currently in flight.
    pub fn is_inflight(&self, key: &ModuleKey) -> bool {
        self.slots
            .get(key)
            .map(|slot| matches!(&*slot, Slot::InFlight { .. }))
            .unwrap_or(false)
    }

    /// Drops every entry. In-flight senders are dropped too, so joined
    /// waiters observe a closed channel and surface an abandoned-load
    /// error; outstanding guards turn stale and no-op when settled.
    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Number of entries, resolved or in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteDescriptor;
    use std::sync::Arc;

    fn key() -> ModuleKey {
        RemoteDescriptor::new("https://apps.test/shop", "shop", "./App").key()
    }

    fn handle() -> ModuleHandle {
        ModuleHandle::new("./App", Arc::new(()))
    }

    fn lead(cache: &ModuleCache) -> LoadGuard {
        match cache.register(key()) {
            CacheLookup::Lead(guard) => guard,
            _ => panic!("expected to lead"),
        }
    }

    #[test]
    fn first_register_leads_second_joins() {
        let cache = ModuleCache::new();
        let _guard = lead(&cache);
        assert!(matches!(cache.register(key()), CacheLookup::Join(_)));
        assert!(cache.is_inflight(&key()));
    }

    #[test]
    fn complete_promotes_to_ready() {
        let cache = ModuleCache::new();
        let guard = lead(&cache);
        guard.complete(handle());

        assert!(!cache.is_inflight(&key()));
        assert!(cache.peek(&key()).is_some());
        assert!(matches!(cache.register(key()), CacheLookup::Ready(_)));
    }

    #[test]
    fn peek_on_pending_returns_none() {
        let cache = ModuleCache::new();
        let _guard = lead(&cache);
        assert!(cache.peek(&key()).is_none());
    }

    #[tokio::test]
    async fn joiners_receive_the_completed_handle() {
        let cache = ModuleCache::new();
        let guard = lead(&cache);

        let joined = cache.register(key());
        guard.complete(handle());

        match joined {
            CacheLookup::Join(mut rx) => {
                let outcome = rx.recv().await.unwrap();
                assert_eq!(outcome.unwrap().export(), "./App");
            }
            _ => panic!("expected a joined lookup"),
        }
    }

    #[tokio::test]
    async fn failure_removes_entry_and_notifies_joiners() {
        let cache = ModuleCache::new();
        let guard = lead(&cache);
        let joined = cache.register(key());

        guard.fail(LoadError::Abandoned { key: key() });

        match joined {
            CacheLookup::Join(mut rx) => {
                assert!(rx.recv().await.unwrap().is_err());
            }
            _ => panic!("expected a joined lookup"),
        }
        // Failed loads are forgotten; the next caller leads a fresh load.
        assert!(cache.register(key()).is_lead());
    }

    #[tokio::test]
    async fn dropped_guard_closes_channel_and_frees_key() {
        let cache = ModuleCache::new();
        let guard = lead(&cache);
        let joined = cache.register(key());

        // The leading future was cancelled before settling.
        drop(guard);

        match joined {
            CacheLookup::Join(mut rx) => {
                assert!(rx.recv().await.is_err());
            }
            _ => panic!("expected a joined lookup"),
        }
        assert!(!cache.is_inflight(&key()));
        assert!(cache.register(key()).is_lead());
    }

    #[tokio::test]
    async fn clear_abandons_inflight_loads() {
        let cache = ModuleCache::new();
        let _guard = lead(&cache);
        let joined = cache.register(key());

        cache.clear();
        assert!(cache.is_empty());

        match joined {
            CacheLookup::Join(mut rx) => {
                assert!(rx.recv().await.is_err());
            }
            _ => panic!("expected a joined lookup"),
        }
    }

    #[test]
    fn stale_settlement_after_clear_is_ignored() {
        let cache = ModuleCache::new();
        let stale = lead(&cache);
        cache.clear();

        // A new leader takes the same key before the old guard settles.
        let fresh = lead(&cache);
        stale.complete(handle());
        assert!(
            cache.peek(&key()).is_none(),
            "stale complete must not resolve the new entry"
        );
        assert!(cache.is_inflight(&key()));

        fresh.complete(handle());
        assert!(cache.peek(&key()).is_some());
    }

    #[test]
    fn stale_failure_after_clear_leaves_new_entry() {
        let cache = ModuleCache::new();
        let stale = lead(&cache);
        cache.clear();

        let _fresh = lead(&cache);
        stale.fail(LoadError::Abandoned { key: key() });
        assert!(cache.is_inflight(&key()), "stale fail must not evict");
    }

    #[test]
    fn stale_drop_after_clear_leaves_new_entry() {
        let cache = ModuleCache::new();
        let stale = lead(&cache);
        cache.clear();

        let _fresh = lead(&cache);
        drop(stale);
        assert!(cache.is_inflight(&key()));
    }
}
