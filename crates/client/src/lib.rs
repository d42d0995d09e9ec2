//! Offline worker runtime for haven.
//!
//! This crate drives one deployed version through install and activation,
//! intercepts requests with a network-first, cache-fallback strategy, and
//! exposes both behind the [`WorkerEvents`] trait a host calls into.

pub mod control;
pub mod fetch;
pub mod intercept;
pub mod lifecycle;
pub mod worker;

#[cfg(test)]
mod testing;

pub use control::{ControlChannel, ControlMessage, ControlOutcome};
pub use fetch::{FetchClient, FetchConfig, Fetcher, Request, Response, ResponseKind};
pub use intercept::{CacheableExtensions, FetchInterceptor, FetchOutcome, ResponseSource, Served};
pub use lifecycle::{ActivateReport, ClientRegistry, InstallReport, LifecycleController, WorkerState};
pub use worker::{OfflineWorker, WorkerEvents};
