//! # Poll Schedule
//!
//! Decides which AzureKeyVaultSecrets are due for a vault poll on each tick.
//!
//! Every resource is polled at the normal interval. A resource whose poll
//! failed `max_failures_before_slowing_down` times in a row is only polled at
//! the slow interval until a poll succeeds again, so a broken vault reference
//! does not hammer Azure.

use crate::config::ControllerConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
struct PollState {
    consecutive_failures: u32,
    last_enqueued: Option<Instant>,
}

#[derive(Debug)]
pub struct PollSchedule {
    normal: Duration,
    slow: Duration,
    max_failures_before_slowing_down: u32,
    states: Mutex<HashMap<String, PollState>>,
}

impl PollSchedule {
    pub fn new(normal: Duration, slow: Duration, max_failures_before_slowing_down: u32) -> Self {
        Self {
            normal,
            slow,
            max_failures_before_slowing_down,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.azure_poll_frequency,
            config.azure_poll_frequency_slow,
            config.max_failures_before_slowing_down,
        )
    }

    /// Interval between ticks
    pub fn normal_interval(&self) -> Duration {
        self.normal
    }

    fn is_slowed_down(&self, state: &PollState) -> bool {
        self.max_failures_before_slowing_down > 0
            && state.consecutive_failures >= self.max_failures_before_slowing_down
    }

    /// Keys among `keys` that should be polled at `now`. Keys not listed are
    /// forgotten.
    pub fn due_keys<I>(&self, keys: I, now: Instant) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut current = HashMap::with_capacity(states.len());
        let mut due = Vec::new();

        for key in keys {
            let mut state = states.remove(&key).unwrap_or_default();
            let is_due = match state.last_enqueued {
                Some(last) if self.is_slowed_down(&state) => now.duration_since(last) >= self.slow,
                _ => true,
            };
            if is_due {
                state.last_enqueued = Some(now);
                due.push(key.clone());
            }
            current.insert(key, state);
        }

        *states = current;
        due
    }

    /// Record the outcome of a vault poll for `key`
    pub fn record(&self, key: &str, success: bool) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = states.entry(key.to_string()).or_default();
        let was_slowed = self.is_slowed_down(state);
        if success {
            state.consecutive_failures = 0;
            if was_slowed {
                info!(
                    "Azure Key Vault poll for {} succeeded again, back to polling every {:?}",
                    key, self.normal
                );
            }
        } else {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            if !was_slowed && self.is_slowed_down(state) {
                info!(
                    "Azure Key Vault poll for {} failed {} times in a row, slowing down to every {:?}",
                    key, state.consecutive_failures, self.slow
                );
            }
        }
    }

    /// Consecutive failed polls recorded for `key`
    pub fn consecutive_failures(&self, key: &str) -> u32 {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .map_or(0, |state| state.consecutive_failures)
    }
}
