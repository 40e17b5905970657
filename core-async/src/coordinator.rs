//! Bounded, key-deduplicating async job runner.
//!
//! [`TaskCoordinator`] runs at most `max_concurrent` jobs at once. A request
//! for a key that already has a job in flight attaches to that job instead of
//! starting a second one, and every attached caller observes the same result.
//! Submissions beyond the limit wait for a free slot.
//!
//! Interest is reference counted. Each caller waiting on a key holds one unit;
//! when the last caller goes away before the job finishes, the job's
//! [`CancellationToken`] fires. Jobs should check the token before expensive
//! work. An abandoned job keeps its key until its task ends, and a new request
//! for that key waits for it to wind down before starting a fresh job, so a
//! key never has two jobs running at once.
//!
//! The key is removed from the in-flight map and the slot is returned whatever
//! the outcome: success, cancellation or panic.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, warn};

use crate::sync::{lock_unpoisoned, oneshot, CancellationToken, Semaphore};
use crate::task::{self, panic_message};

/// Default number of jobs allowed to run at the same time.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Why a coordinated job produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job cancelled before completion")]
    Cancelled,

    #[error("job panicked: {0}")]
    Panicked(String),
}

type JobOutput<V> = Result<V, JobError>;
type SharedJob<V> = Shared<BoxFuture<'static, JobOutput<V>>>;

struct InFlight<V> {
    id: u64,
    job: SharedJob<V>,
    token: CancellationToken,
    waiters: usize,
}

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    coalesced: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    panicked: AtomicU64,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

struct Inner<K, V> {
    in_flight: Mutex<HashMap<K, InFlight<V>>>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    next_id: AtomicU64,
    counters: Counters,
}

/// Point-in-time view of coordinator activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Jobs actually spawned.
    pub started: u64,
    /// Requests that attached to an existing job.
    pub coalesced: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub panicked: u64,
    /// Keys currently registered (waiting for a slot or running).
    pub in_flight: usize,
    /// Jobs currently holding a slot.
    pub running: usize,
    /// Highest observed value of `running`.
    pub peak_running: usize,
}

/// Bounded-concurrency job runner that coalesces requests per key.
///
/// Cloning is cheap; clones share the same slots and in-flight map.
pub struct TaskCoordinator<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for TaskCoordinator<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for TaskCoordinator<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCoordinator")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("in_flight", &lock_unpoisoned(&self.inner.in_flight).len())
            .finish()
    }
}

impl<K, V> Default for TaskCoordinator<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_JOBS)
    }
}

impl<K, V> TaskCoordinator<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a coordinator running at most `max_concurrent` jobs (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                in_flight: Mutex::new(HashMap::new()),
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                max_concurrent,
                next_id: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        }
    }

    /// Runs `job` for `key`, or attaches to the job already in flight for it.
    ///
    /// The closure is only invoked when a new job is started. It receives the
    /// job's cancellation token, which fires once every waiter has dropped its
    /// request.
    ///
    /// Dropping the returned future releases this caller's interest.
    pub async fn run<F, Fut>(&self, key: K, job: F) -> Result<V, JobError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut job = job;
        loop {
            match self.attach(key.clone(), job) {
                Attach::Joined(shared, interest) => {
                    let outcome = shared.await;
                    drop(interest);
                    return outcome;
                }
                Attach::Draining(previous, returned) => {
                    // The abandoned job's value may reflect its cancellation.
                    let _ = previous.await;
                    job = returned;
                }
            }
        }
    }

    /// Returns true when a job for `key` is waiting or running.
    pub fn is_in_flight(&self, key: &K) -> bool {
        lock_unpoisoned(&self.inner.in_flight).contains_key(key)
    }

    /// Number of keys currently waiting or running.
    pub fn in_flight_count(&self) -> usize {
        lock_unpoisoned(&self.inner.in_flight).len()
    }

    /// Configured concurrency limit.
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Slots not currently held by a running job.
    pub fn available_slots(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    pub fn stats(&self) -> CoordinatorStats {
        let counters = &self.inner.counters;
        CoordinatorStats {
            started: counters.started.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            cancelled: counters.cancelled.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            in_flight: self.in_flight_count(),
            running: counters.running.load(Ordering::Relaxed),
            peak_running: counters.peak_running.load(Ordering::Relaxed),
        }
    }

    fn attach<F, Fut>(&self, key: K, job: F) -> Attach<K, V, F>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut in_flight = lock_unpoisoned(&self.inner.in_flight);

        if let Some(entry) = in_flight.get_mut(&key) {
            if entry.token.is_cancelled() {
                debug!(?key, id = entry.id, "Waiting for abandoned job to finish");
                return Attach::Draining(entry.job.clone(), job);
            }
            entry.waiters += 1;
            self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(?key, waiters = entry.waiters, "Attached to in-flight job");
            let interest = Interest {
                inner: Arc::clone(&self.inner),
                key,
                id: entry.id,
            };
            return Attach::Joined(entry.job.clone(), interest);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel::<JobOutput<V>>();
        // A dropped sender means the runtime tore the task down.
        let shared = rx
            .map(|received| received.unwrap_or(Err(JobError::Cancelled)))
            .boxed()
            .shared();

        in_flight.insert(
            key.clone(),
            InFlight {
                id,
                job: shared.clone(),
                token: token.clone(),
                waiters: 1,
            },
        );
        drop(in_flight);

        self.inner.counters.started.fetch_add(1, Ordering::Relaxed);
        debug!(?key, id, "Starting job");

        let future = job(token.clone());
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        task::spawn(async move {
            let release = Release {
                inner: Arc::clone(&inner),
                key: task_key,
                id,
            };
            let outcome = inner.execute(token, future).await;
            inner.counters.record(&outcome);
            drop(release);
            let _ = tx.send(outcome);
        });

        let interest = Interest {
            inner: Arc::clone(&self.inner),
            key,
            id,
        };
        Attach::Joined(shared, interest)
    }
}

enum Attach<K: Eq + Hash, V, F> {
    /// Started or joined a live job.
    Joined(SharedJob<V>, Interest<K, V>),
    /// The key's job was abandoned and is still winding down.
    Draining(SharedJob<V>, F),
}

impl<K, V> Inner<K, V> {
    async fn execute<Fut>(&self, token: CancellationToken, future: Fut) -> JobOutput<V>
    where
        Fut: Future<Output = V>,
    {
        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(JobError::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| JobError::Cancelled)?
            }
        };
        if token.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let _running = RunningSlot::enter(&self.counters);
        AssertUnwindSafe(future)
            .catch_unwind()
            .await
            .map_err(|payload| JobError::Panicked(panic_message(&*payload)))
    }
}

impl Counters {
    fn record<V>(&self, outcome: &JobOutput<V>) {
        match outcome {
            Ok(_) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(JobError::Cancelled) => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            Err(JobError::Panicked(message)) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
                warn!(%message, "Coordinated job panicked");
            }
        }
    }
}

struct RunningSlot<'a> {
    counters: &'a Counters,
}

impl<'a> RunningSlot<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.running.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_running.fetch_max(now, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for RunningSlot<'_> {
    fn drop(&mut self) {
        self.counters.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One caller's claim on an in-flight job.
struct Interest<K: Eq + Hash, V> {
    inner: Arc<Inner<K, V>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for Interest<K, V> {
    fn drop(&mut self) {
        let mut in_flight = lock_unpoisoned(&self.inner.in_flight);
        let Some(entry) = in_flight.get_mut(&self.key) else {
            return;
        };
        if entry.id != self.id {
            return;
        }
        entry.waiters = entry.waiters.saturating_sub(1);
        if entry.waiters == 0 {
            debug!(id = self.id, "Last waiter left, cancelling job");
            entry.token.cancel();
        }
    }
}

/// Removes the job's key when the spawned task ends, including on teardown.
/// Dropped before the result is published.
struct Release<K: Eq + Hash, V> {
    inner: Arc<Inner<K, V>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for Release<K, V> {
    fn drop(&mut self) {
        let mut in_flight = lock_unpoisoned(&self.inner.in_flight);
        if in_flight.get(&self.key).is_some_and(|entry| entry.id == self.id) {
            in_flight.remove(&self.key);
        }
    }
}
