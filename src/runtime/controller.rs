//! # Controller Runtime
//!
//! Owns the two work queues, their worker pools and the vault poll ticker.
//!
//! - Spec sync queue: fed by AzureKeyVaultSecret changes and by changes to
//!   Secrets they own
//! - Vault poll queue: fed by the poll ticker
//!
//! Both queues may work on the same resource at the same time. Spec sync only
//! ever creates a missing Secret and the vault poll only updates an existing
//! one, so the worst interleaving costs one retry.

use crate::config::ControllerConfig;
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::reconciler::{Handler, ObjectEvent};
use crate::crd::AzureKeyVaultSecret;
use crate::runtime::poll::PollSchedule;
use crate::runtime::worker::{QueueKind, Worker};
use crate::runtime::workqueue::WorkQueue;
use crate::store::SecretRefReader;
use kube::Resource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Queues, workers and poll ticker around one [`Handler`]
pub struct Controller {
    handler: Arc<Handler>,
    refs: Arc<dyn SecretRefReader>,
    spec_queue: Arc<WorkQueue<String>>,
    poll_queue: Arc<WorkQueue<String>>,
    schedule: Arc<PollSchedule>,
    workers: usize,
    max_retries: u32,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("spec_queue_len", &self.spec_queue.len())
            .field("poll_queue_len", &self.poll_queue.len())
            .field("workers", &self.workers)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(
        handler: Arc<Handler>,
        refs: Arc<dyn SecretRefReader>,
        config: &ControllerConfig,
    ) -> Self {
        let backoff = ExponentialBackoff::new(
            config.backoff_start_duration(),
            config.backoff_max_duration(),
        );
        Self {
            handler,
            refs,
            spec_queue: Arc::new(WorkQueue::new(QueueKind::SpecSync.as_str(), backoff)),
            poll_queue: Arc::new(WorkQueue::new(QueueKind::VaultPoll.as_str(), backoff)),
            schedule: Arc::new(PollSchedule::from_config(config)),
            workers: config.workers.max(1),
            max_retries: config.max_retries,
        }
    }

    pub fn spec_queue(&self) -> &Arc<WorkQueue<String>> {
        &self.spec_queue
    }

    pub fn poll_queue(&self) -> &Arc<WorkQueue<String>> {
        &self.poll_queue
    }

    pub fn schedule(&self) -> &Arc<PollSchedule> {
        &self.schedule
    }

    /// Queue an AzureKeyVaultSecret for spec sync
    pub fn enqueue(&self, akvs: &AzureKeyVaultSecret) {
        self.spec_queue.add(akvs.key());
    }

    /// Route a watched object through the ownership resolver and queue its
    /// owner for spec sync. Objects that cannot be decoded are dropped.
    pub async fn handle_object_event<K: Resource>(&self, event: ObjectEvent<K>) {
        match self.handler.handle_object(&event).await {
            Ok(Some(owner)) => {
                debug!("Queueing owner {} of changed object", owner.key());
                self.enqueue(&owner);
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "Dropping undecodable object event"),
        }
    }

    /// Queue every AzureKeyVaultSecret whose vault poll is due
    pub async fn enqueue_due_polls(&self) {
        let refs = match self.refs.list_refs().await {
            Ok(refs) => refs,
            Err(e) => {
                warn!(error = %e, "Failed to list AzureKeyVaultSecrets for Azure Key Vault poll");
                return;
            }
        };
        let due = self
            .schedule
            .due_keys(refs.iter().map(|akvs| akvs.key()), Instant::now());
        debug!("Queueing {} of {} AzureKeyVaultSecrets for Azure Key Vault poll", due.len(), refs.len());
        for key in due {
            self.poll_queue.add(key);
        }
    }

    fn spawn_workers(&self, tasks: &mut JoinSet<()>, kind: QueueKind) {
        let (queue, schedule) = match kind {
            QueueKind::SpecSync => (&self.spec_queue, None),
            QueueKind::VaultPoll => (&self.poll_queue, Some(Arc::clone(&self.schedule))),
        };
        for id in 0..self.workers {
            let worker = Worker {
                id,
                kind,
                queue: Arc::clone(queue),
                handler: Arc::clone(&self.handler),
                max_retries: self.max_retries,
                schedule: schedule.clone(),
            };
            tasks.spawn(worker.run());
        }
    }

    /// Run workers and the poll ticker until `shutdown` flips to `true`,
    /// then stop the queues and wait for in-flight items to finish
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting {} workers per queue, polling Azure Key Vault every {:?}",
            self.workers,
            self.schedule.normal_interval()
        );
        let mut workers = JoinSet::new();
        self.spawn_workers(&mut workers, QueueKind::SpecSync);
        self.spawn_workers(&mut workers, QueueKind::VaultPoll);

        let period = self.schedule.normal_interval().max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.enqueue_due_polls().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Shutting down work queues, waiting for in-flight items to complete...");
        self.spec_queue.shut_down();
        self.poll_queue.shut_down();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Worker task failed: {}", e);
            }
        }
        info!("All workers stopped");
    }
}
