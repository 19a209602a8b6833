//! # Configuration
//!
//! Controller-level settings.
//!
//! - `controller`: settings loaded from environment variables
//! - `duration`: Kubernetes duration string parsing

mod controller;
mod duration;

pub use controller::ControllerConfig;
pub use duration::parse_kubernetes_duration;
