//! # Runtime
//!
//! Everything that drives the reconcile handlers.
//!
//! - `initialization`: rustls, tracing, metrics, server, client and handler setup
//! - `watch_loop`: watches feeding the caches and the spec sync queue
//! - `controller`: work queues, worker pools and the vault poll ticker
//! - `workqueue`: deduplicating, rate-limited work queue
//! - `worker`: workers draining one queue each
//! - `error_policy`: retry and drop decisions after a reconcile call
//! - `poll`: vault poll schedule with slow-down for failing resources

pub mod controller;
pub mod error_policy;
pub mod initialization;
pub mod poll;
pub mod watch_loop;
pub mod worker;
pub mod workqueue;
