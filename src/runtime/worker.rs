//! # Workers
//!
//! Workers pull keys from one queue and call the matching reconcile entry
//! point. A key is marked done only after its handler returned.

use crate::controller::reconciler::Handler;
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_reconcile_result, Outcome};
use crate::runtime::poll::PollSchedule;
use crate::runtime::workqueue::WorkQueue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, Instrument};

/// Which reconcile entry point a queue feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Spec sync (`sync_handler`)
    SpecSync,
    /// Vault poll (`azure_sync_handler`)
    VaultPoll,
}

impl QueueKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::SpecSync => "spec_sync",
            QueueKind::VaultPoll => "vault_poll",
        }
    }
}

/// One worker draining one queue
#[derive(Debug, Clone)]
pub struct Worker {
    pub(crate) id: usize,
    pub(crate) kind: QueueKind,
    pub(crate) queue: Arc<WorkQueue<String>>,
    pub(crate) handler: Arc<Handler>,
    pub(crate) max_retries: u32,
    /// Fed with vault poll outcomes
    pub(crate) schedule: Option<Arc<PollSchedule>>,
}

impl Worker {
    /// Process keys until the queue shuts down
    pub async fn run(self) {
        debug!(queue = self.kind.as_str(), worker = self.id, "Worker started");
        while self.process_next_item().await.is_some() {}
        debug!(queue = self.kind.as_str(), worker = self.id, "Worker stopped");
    }

    /// Process one key. Returns `None` once the queue is shut down.
    pub async fn process_next_item(&self) -> Option<Outcome> {
        let key = self.queue.get().await?;
        let span = tracing::info_span!(
            "controller.reconcile",
            queue = self.kind.as_str(),
            resource.key = key.as_str(),
            worker = self.id
        );

        let outcome = async {
            let start = Instant::now();
            let result = match self.kind {
                QueueKind::SpecSync => self.handler.sync_handler(&key).await,
                QueueKind::VaultPoll => self.handler.azure_sync_handler(&key).await,
            };
            metrics::observe_reconciliation_duration(
                self.kind.as_str(),
                start.elapsed().as_secs_f64(),
            );
            let outcome = handle_reconcile_result(&self.queue, &key, &result, self.max_retries);
            // One outcome per poll tick; retries in between are not counted
            if let Some(schedule) = &self.schedule {
                match outcome {
                    Outcome::Synced => schedule.record(&key, true),
                    Outcome::Dropped => schedule.record(&key, false),
                    Outcome::Requeued { .. } => {}
                }
            }
            outcome
        }
        .instrument(span)
        .await;

        self.queue.done(&key);
        Some(outcome)
    }
}
