//! In-process `ScanJob` queue and Worker (spec §4.8).
//!
//! Built over `tokio::sync::Mutex<VecDeque<_>>` plus a `Notify` for
//! wake-up rather than pulling in an external job-queue crate: no crate in
//! the corpus models `ScanJob`'s shape closely enough to be worth the
//! dependency.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::Cache;
use crate::orchestrator::{ScanJob, ScanOrchestrator, ScanResult};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_INITIAL_MS: u64 = 2_000;
const COMPLETED_RETENTION_COUNT: usize = 100;
const COMPLETED_RETENTION_AGE: Duration = Duration::from_secs(24 * 60 * 60);
const FAILED_RETENTION_COUNT: usize = 50;

/// Recurring-enrolment identity: at most one pending/recurring entry per
/// platform pair at a time (spec §4.8 `enqueueRecurring`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey(crate::platform::Platform, crate::platform::Platform);

#[derive(Debug, Clone)]
struct QueueEntry {
    id: Uuid,
    job: ScanJob,
    attempts: u32,
}

#[derive(Debug, Clone)]
pub struct CompletedEntry {
    pub id: Uuid,
    pub result: ScanResult,
    pub finished_at_epoch_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FailedEntry {
    pub id: Uuid,
    pub job: ScanJob,
    pub error: String,
    pub finished_at_epoch_ms: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueStats {
    pub pending: usize,
    pub active: usize,
    pub delayed: usize,
    pub completed: usize,
    pub failed: usize,
}

struct Inner {
    pending: VecDeque<QueueEntry>,
    recurring_keys: HashMap<PairKey, Uuid>,
    completed: VecDeque<CompletedEntry>,
    failed: VecDeque<FailedEntry>,
}

/// FIFO job queue shared between callers enqueuing work and the single
/// [`Worker`] draining it.
pub struct Queue {
    inner: Mutex<Inner>,
    notify: Notify,
    closed: AtomicU64,
    active: AtomicU64,
    delayed: AtomicU64,
}

impl Queue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                recurring_keys: HashMap::new(),
                completed: VecDeque::new(),
                failed: VecDeque::new(),
            }),
            notify: Notify::new(),
            closed: AtomicU64::new(0),
            active: AtomicU64::new(0),
            delayed: AtomicU64::new(0),
        }
    }

    /// Enqueue a one-off job.
    pub async fn enqueue(&self, job: ScanJob) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.pending.push_back(QueueEntry { id, job, attempts: 0 });
        drop(inner);
        self.notify.notify_one();
        id
    }

    /// Enqueue a job for recurring enrolment, replacing any prior pending
    /// entry for the same `(platform_a, platform_b)` pair.
    pub async fn enqueue_recurring(&self, job: ScanJob) -> Uuid {
        let key = PairKey(job.platform_a, job.platform_b);
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        if let Some(prior) = inner.recurring_keys.get(&key).copied() {
            inner.pending.retain(|e| e.id != prior);
        }
        inner.recurring_keys.insert(key, id);
        inner.pending.push_back(QueueEntry { id, job, attempts: 0 });
        drop(inner);
        self.notify.notify_one();
        id
    }

    async fn pop(&self) -> Option<QueueEntry> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(entry) = inner.pending.pop_front() {
                    return Some(entry);
                }
                if self.closed.load(Ordering::SeqCst) != 0 {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    fn record_completed(inner: &mut Inner, entry: CompletedEntry) {
        inner.completed.push_back(entry);
        let cutoff = now_epoch_ms().saturating_sub(COMPLETED_RETENTION_AGE.as_millis() as u64);
        while inner.completed.len() > COMPLETED_RETENTION_COUNT {
            inner.completed.pop_front();
        }
        while inner
            .completed
            .front()
            .is_some_and(|e| e.finished_at_epoch_ms < cutoff)
        {
            inner.completed.pop_front();
        }
    }

    fn record_failed(inner: &mut Inner, entry: FailedEntry) {
        inner.failed.push_back(entry);
        while inner.failed.len() > FAILED_RETENTION_COUNT {
            inner.failed.pop_front();
        }
    }

    #[must_use]
    pub async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().await;
        QueueStats {
            pending: inner.pending.len(),
            active: self.active.load(Ordering::SeqCst) as usize,
            delayed: self.delayed.load(Ordering::SeqCst) as usize,
            completed: inner.completed.len(),
            failed: inner.failed.len(),
        }
    }

    /// Drain and discard every pending job without running it.
    pub async fn drain(&self) {
        let mut inner = self.inner.lock().await;
        inner.pending.clear();
    }

    /// Stop accepting new pops; any in-flight `pop` returns `None` once
    /// drained.
    pub fn close(&self) {
        self.closed.store(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Single-concurrency worker draining a [`Queue`] and delegating each job
/// to a [`ScanOrchestrator`], with bounded retry and progress logging at
/// the 10/40/70/90/100 milestones.
pub struct Worker<C: Cache> {
    queue: Arc<Queue>,
    orchestrator: Arc<ScanOrchestrator<C>>,
}

impl<C: Cache> Worker<C> {
    #[must_use]
    pub fn new(queue: Arc<Queue>, orchestrator: Arc<ScanOrchestrator<C>>) -> Self {
        Self { queue, orchestrator }
    }

    /// Run until the queue is closed and drained, or `cancel` fires.
    pub async fn run(&self, cancel: &CancellationToken) {
        loop {
            let entry = tokio::select! {
                entry = self.queue.pop() => entry,
                () = cancel.cancelled() => None,
            };
            let Some(mut entry) = entry else { break };

            info!(job_id = %entry.id, progress = 10, "worker.progress");
            self.queue.active.fetch_add(1, Ordering::SeqCst);
            loop {
                entry.attempts += 1;
                let job_id = entry.id;
                let result = self
                    .orchestrator
                    .run_with_progress(&entry.job, |p| info!(job_id = %job_id, progress = p, "worker.progress"))
                    .await;
                match result {
                    Ok(result) => {
                        self.queue.active.fetch_sub(1, Ordering::SeqCst);
                        let mut inner = self.queue.inner.lock().await;
                        Queue::record_completed(
                            &mut inner,
                            CompletedEntry {
                                id: entry.id,
                                result,
                                finished_at_epoch_ms: now_epoch_ms(),
                            },
                        );
                        drop(inner);
                        info!(job_id = %entry.id, progress = 100, "worker.completed");
                        break;
                    }
                    Err(err) if entry.attempts < MAX_ATTEMPTS => {
                        let delay = Duration::from_millis(BACKOFF_INITIAL_MS * 2u64.pow(entry.attempts - 1));
                        warn!(job_id = %entry.id, attempt = entry.attempts, %err, "worker.retrying");
                        self.queue.active.fetch_sub(1, Ordering::SeqCst);
                        self.queue.delayed.fetch_add(1, Ordering::SeqCst);
                        let cancelled = tokio::select! {
                            () = tokio::time::sleep(delay) => false,
                            () = cancel.cancelled() => true,
                        };
                        self.queue.delayed.fetch_sub(1, Ordering::SeqCst);
                        if cancelled {
                            break;
                        }
                        self.queue.active.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(err) => {
                        self.queue.active.fetch_sub(1, Ordering::SeqCst);
                        warn!(job_id = %entry.id, %err, "worker.failed");
                        let mut inner = self.queue.inner.lock().await;
                        Queue::record_failed(
                            &mut inner,
                            FailedEntry {
                                id: entry.id,
                                job: entry.job.clone(),
                                error: err.to_string(),
                                finished_at_epoch_ms: now_epoch_ms(),
                            },
                        );
                        drop(inner);
                        break;
                    }
                }
            }
        }
    }
}
