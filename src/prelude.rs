//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use azure_keyvault_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (AzureKeyVaultSecret, OutputSecret, etc.)
//! - The reconcile handler and its error type
//! - Store, vault and event traits with their implementations
//! - Config types

// CRD types - most commonly used
pub use crate::crd::*;

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    content_hash, create_new_secret, split_meta_namespace_key, Handler, ObjectEvent,
    ReconcilerError,
};

// Capability traits and their implementations
pub use crate::controller::events::{EventRecorder, KubeEventRecorder, MemoryEventRecorder};
pub use crate::provider::{AzureKeyVaultReader, InMemoryVault, VaultReader};
pub use crate::store::{
    InMemoryCluster, KubeSecretRefStore, KubeSecretStore, SecretReader, SecretRefReader,
    SecretRefWriter, SecretWriter, StoreError,
};

// Runtime
pub use crate::runtime::controller::Controller;

// Config types - for configuration management
pub use crate::config::ControllerConfig;
