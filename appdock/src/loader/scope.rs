//! Shared dependency scope negotiation.
//!
//! Shared runtime libraries must be registered as singletons across the
//! host and every remote before any remote code runs. The first caller for
//! a scope performs the negotiation; every later caller no-ops. A failed
//! negotiation leaves the scope unnegotiated, so the retrying attempt runs
//! it again.

use crate::loader::{HostError, ModuleHost};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Once-per-scope negotiation registry.
pub struct ScopeNegotiator {
    scopes: DashMap<String, Arc<Mutex<bool>>>,
}

impl ScopeNegotiator {
    pub fn new() -> Self {
        Self {
            scopes: DashMap::new(),
        }
    }

    /// Ensures the scope's shared dependencies are negotiated.
    ///
    /// Returns `true` if this call performed the negotiation.
    pub async fn negotiate<H: ModuleHost>(
        &self,
        host: &H,
        scope: &str,
    ) -> Result<bool, HostError> {
        let latch = self
            .scopes
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(false)))
            .clone();

        let mut negotiated = latch.lock().await;
        if *negotiated {
            return Ok(false);
        }

        host.init_shared_scope(scope).await?;
        *negotiated = true;
        debug!(scope = %scope, "Negotiated shared dependency scope");
        Ok(true)
    }

    /// Whether the scope has completed negotiation.
    pub fn is_negotiated(&self, scope: &str) -> bool {
        self.scopes
            .get(scope)
            .map(|latch| latch.try_lock().map(|done| *done).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Forgets all negotiated scopes (dev reload path).
    pub fn reset(&self) {
        self.scopes.clear();
    }
}

impl Default for ScopeNegotiator {
    fn default() -> Self {
        Self::new()
    }
}
