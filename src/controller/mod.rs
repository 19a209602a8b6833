//! # Controller
//!
//! Core controller modules for the Azure Key Vault controller.
//!
//! - `backoff`: Exponential backoff for work queue retries
//! - `events`: Kubernetes Event recording
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod events;
pub mod reconciler;
pub mod server;
