//! In-memory vault used by tests.

use super::VaultReader;
use crate::crd::AzureKeyVaultSecret;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Vault values keyed by `(vault name, object name)`
#[derive(Debug, Default)]
pub struct InMemoryVault {
    values: Mutex<HashMap<(String, String), String>>,
    failures: AtomicU32,
    reads: AtomicUsize,
}

impl InMemoryVault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&self, vault: &str, object: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert((vault.to_string(), object.to_string()), value.to_string());
        }
    }

    pub fn remove_value(&self, vault: &str, object: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(&(vault.to_string(), object.to_string()));
        }
    }

    /// Fail the next `times` reads
    pub fn fail_next(&self, times: u32) {
        self.failures.store(times, Ordering::SeqCst);
    }

    /// Number of reads attempted, failed ones included
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VaultReader for InMemoryVault {
    async fn get_secret_value(&self, akvs: &AzureKeyVaultSecret) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let vault = &akvs.spec.vault.name;
        let object = &akvs.spec.vault.object.name;

        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(anyhow!("vault '{vault}' unavailable"));
        }

        self.values
            .lock()
            .map_err(|e| anyhow!("in-memory vault poisoned: {e}"))?
            .get(&(vault.clone(), object.clone()))
            .cloned()
            .ok_or_else(|| anyhow!("secret '{object}' not found in vault '{vault}'"))
    }
}
