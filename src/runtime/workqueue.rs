//! # Work Queue
//!
//! Rate-limited, deduplicating work queue.
//!
//! - A key waiting in the queue is stored once no matter how often it is added
//! - A key handed to a worker is not handed to another worker until `done`
//! - A key added while it is being processed is queued again on `done`, so the
//!   next pass sees the latest state
//! - `add_rate_limited` re-adds a key after an exponential backoff based on
//!   how often it failed; `forget` resets that count

use crate::controller::backoff::ExponentialBackoff;
use crate::observability::metrics;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, trace};

#[derive(Debug)]
struct Inner<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    failures: HashMap<K, u32>,
    shutting_down: bool,
}

impl<K> Default for Inner<K> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            failures: HashMap::new(),
            shutting_down: false,
        }
    }
}

/// Work queue shared by a pool of workers
#[derive(Debug)]
pub struct WorkQueue<K> {
    name: &'static str,
    inner: Mutex<Inner<K>>,
    notify: Notify,
    backoff: ExponentialBackoff,
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create a queue named `name` (used as the metrics label)
    pub fn new(name: &'static str, backoff: ExponentialBackoff) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            backoff,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K>> {
        // A panic while holding the lock leaves the sets consistent, so keep going
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn report_depth(&self, depth: usize) {
        metrics::set_workqueue_depth(self.name, depth);
    }

    /// Queue `key` unless it is already waiting
    pub fn add(&self, key: K) {
        let mut inner = self.lock();
        if inner.shutting_down || inner.dirty.contains(&key) {
            return;
        }
        inner.dirty.insert(key.clone());
        if inner.processing.contains(&key) {
            trace!(queue = self.name, key = ?key, "Key is being processed, queued for later");
            return;
        }
        inner.queue.push_back(key);
        let depth = inner.queue.len();
        drop(inner);
        self.report_depth(depth);
        self.notify.notify_one();
    }

    /// Queue `key` once `delay` has passed
    pub fn add_after(self: &Arc<Self>, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Queue `key` after a backoff that grows with each failure
    pub fn add_rate_limited(self: &Arc<Self>, key: K) {
        let delay = {
            let mut inner = self.lock();
            let failures = inner.failures.entry(key.clone()).or_insert(0);
            let delay = self.backoff.delay_for(*failures);
            *failures = failures.saturating_add(1);
            delay
        };
        self.add_after(key, delay);
    }

    /// Reset the failure count of `key`
    pub fn forget(&self, key: &K) {
        self.lock().failures.remove(key);
    }

    /// How many times `key` has been re-queued through `add_rate_limited`
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    ///
    /// The caller must call [`WorkQueue::done`] with the key when finished.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if inner.shutting_down {
                    return None;
                }
                if let Some(key) = inner.queue.pop_front() {
                    inner.dirty.remove(&key);
                    inner.processing.insert(key.clone());
                    let depth = inner.queue.len();
                    drop(inner);
                    self.report_depth(depth);
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Mark `key` as finished. Re-queues it if it was added meanwhile.
    pub fn done(&self, key: &K) {
        let mut inner = self.lock();
        if !inner.processing.remove(key) {
            error!(queue = self.name, key = ?key, "done called for a key that was not being processed");
        }
        if inner.dirty.contains(key) && !inner.shutting_down {
            inner.queue.push_back(key.clone());
            let depth = inner.queue.len();
            drop(inner);
            self.report_depth(depth);
            self.notify.notify_one();
        }
    }

    /// Keys waiting to be handed out
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop handing out keys and wake every waiting worker
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }
}
