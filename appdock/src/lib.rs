//! AppDock - runtime host for federated remote apps
//!
//! This library provides the runtime plumbing a container shell needs to
//! host independently deployed app bundles: loading remote modules with
//! retry and cache deduplication, sharing platform context across the
//! host/remote boundary, reporting app liveness to the backend, and
//! routing command events between endpoints.
//!
//! # High-Level API
//!
//! ```ignore
//! use appdock::loader::{AppLoader, HttpModuleHost};
//! use appdock::remote::RemoteDescriptor;
//! use std::sync::Arc;
//!
//! let loader = AppLoader::new(Arc::new(HttpModuleHost::new()?));
//! let descriptor = RemoteDescriptor::new("https://apps.example.com/shop", "shop", "./App");
//!
//! // Concurrent loads of the same module share one in-flight attempt.
//! let module = loader.load_app(&descriptor).await?;
//! ```

pub mod bridge;
pub mod bus;
pub mod config;
pub mod heartbeat;
pub mod loader;
pub mod logging;
pub mod remote;

/// Version of the AppDock library and CLI.
///
/// Synchronized across all components in the workspace; defined in
/// `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
