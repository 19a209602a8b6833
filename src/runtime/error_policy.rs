//! # Error Policy
//!
//! What happens to a work item after its reconcile call returns.

use crate::controller::reconciler::ReconcilerError;
use crate::observability::metrics;
use crate::runtime::workqueue::WorkQueue;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Fate of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reconciled; failure count reset
    Synced,
    /// Failed and scheduled again with backoff
    Requeued { attempt: u32 },
    /// Failed for good: retries exhausted or the error can never succeed
    Dropped,
}

/// Apply the retry policy for `key` after a reconcile call
///
/// Success forgets the key. A retryable error re-adds it with backoff until
/// `max_retries` is reached, after which it is dropped and reported.
pub fn handle_reconcile_result(
    queue: &Arc<WorkQueue<String>>,
    key: &str,
    result: &Result<(), ReconcilerError>,
    max_retries: u32,
) -> Outcome {
    let queue_name = queue.name();
    let key_owned = key.to_string();

    let Err(e) = result else {
        metrics::increment_reconciliations(queue_name, "success");
        queue.forget(&key_owned);
        debug!(queue = queue_name, key, "Successfully synced");
        return Outcome::Synced;
    };

    metrics::increment_reconciliations(queue_name, "error");
    metrics::increment_reconciliation_errors(queue_name, e.kind());

    if !e.is_retryable() {
        error!(queue = queue_name, key, error = %e, "Dropping work item, retrying cannot succeed");
        metrics::increment_workqueue_dropped(queue_name);
        queue.forget(&key_owned);
        return Outcome::Dropped;
    }

    let requeues = queue.num_requeues(&key_owned);
    if requeues < max_retries {
        warn!(
            queue = queue_name,
            key,
            error = %e,
            attempt = requeues + 1,
            max_retries,
            "Error syncing, requeuing with backoff"
        );
        queue.add_rate_limited(key_owned);
        return Outcome::Requeued {
            attempt: requeues + 1,
        };
    }

    error!(
        queue = queue_name,
        key,
        error = %e,
        max_retries,
        "Dropping work item out of the queue after exhausting retries"
    );
    metrics::increment_workqueue_dropped(queue_name);
    queue.forget(&key_owned);
    Outcome::Dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::backoff::ExponentialBackoff;
    use crate::store::StoreError;

    fn queue() -> Arc<WorkQueue<String>> {
        Arc::new(WorkQueue::new("test", ExponentialBackoff::default()))
    }

    fn transient() -> Result<(), ReconcilerError> {
        Err(ReconcilerError::Store(StoreError::Unavailable("down".to_string())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_ceiling_then_drops() {
        let q = queue();
        for attempt in 1..=3 {
            assert_eq!(
                handle_reconcile_result(&q, "default/a", &transient(), 3),
                Outcome::Requeued { attempt }
            );
        }
        assert_eq!(
            handle_reconcile_result(&q, "default/a", &transient(), 3),
            Outcome::Dropped
        );
        assert_eq!(q.num_requeues(&"default/a".to_string()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failures() {
        let q = queue();
        handle_reconcile_result(&q, "default/a", &transient(), 3);
        assert_eq!(
            handle_reconcile_result(&q, "default/a", &Ok(()), 3),
            Outcome::Synced
        );
        assert_eq!(q.num_requeues(&"default/a".to_string()), 0);
    }

    #[tokio::test]
    async fn test_invalid_key_is_dropped_immediately() {
        let q = queue();
        let result = Err(ReconcilerError::InvalidKey("a/b/c".to_string()));
        assert_eq!(
            handle_reconcile_result(&q, "a/b/c", &result, 3),
            Outcome::Dropped
        );
        assert!(q.is_empty());
    }
}
