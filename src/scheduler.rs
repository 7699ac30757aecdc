//! Scheduler (spec §4.9): recurring enrolment of the three platform pairs,
//! a periodic stats tick, and signal-driven graceful shutdown.
//!
//! Recurring enrolment and the stats tick run on `tokio_cron_scheduler`'s
//! `JobScheduler`, the corpus's real crate for this, rather than a
//! hand-rolled `tokio::time::interval` loop.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::error::Result;
use crate::orchestrator::{ScanJob, ScanOrchestrator};
use crate::platform::Platform;
use crate::queue::{Queue, Worker};

/// The three cross-platform pairs the scanner watches (spec §4.9).
const PAIRS: [(Platform, Platform); 3] = [
    (Platform::Pm, Platform::Man),
    (Platform::Kal, Platform::Pm),
    (Platform::Kal, Platform::Man),
];

/// Every-minute cron expression for recurring scan enrolment (60s cadence).
const SCAN_CRON: &str = "0 * * * * *";
/// Every-30-seconds cron expression for the stats tick.
const STATS_CRON: &str = "*/30 * * * * *";

pub struct Scheduler<C: Cache + 'static> {
    queue: Arc<Queue>,
    orchestrator: Arc<ScanOrchestrator<C>>,
    markets_per_fetch: usize,
}

impl<C: Cache + 'static> Scheduler<C> {
    #[must_use]
    pub fn new(queue: Arc<Queue>, orchestrator: Arc<ScanOrchestrator<C>>, markets_per_fetch: usize) -> Self {
        Self { queue, orchestrator, markets_per_fetch }
    }

    /// Start the recurring jobs, run the Worker loop, and block until
    /// `cancel` fires (e.g. from a SIGINT/SIGTERM handler installed by the
    /// caller), then stop new enrolment and drain cleanly.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut jobs = JobScheduler::new()
            .await
            .map_err(|e| crate::error::Error::Queue(e.to_string()))?;

        let queue = self.queue.clone();
        let limit = self.markets_per_fetch;
        let scan_job = Job::new_async(SCAN_CRON, move |_uuid, _lock| {
            let queue = queue.clone();
            Box::pin(async move {
                for (platform_a, platform_b) in PAIRS {
                    queue
                        .enqueue_recurring(ScanJob { platform_a, platform_b, limit })
                        .await;
                }
            })
        })
        .map_err(|e| crate::error::Error::Queue(e.to_string()))?;
        jobs.add(scan_job)
            .await
            .map_err(|e| crate::error::Error::Queue(e.to_string()))?;

        let stats_queue = self.queue.clone();
        let stats_job = Job::new_async(STATS_CRON, move |_uuid, _lock| {
            let queue = stats_queue.clone();
            Box::pin(async move {
                let stats = queue.stats().await;
                info!(
                    pending = stats.pending,
                    active = stats.active,
                    delayed = stats.delayed,
                    completed = stats.completed,
                    failed = stats.failed,
                    "scheduler.stats_tick"
                );
            })
        })
        .map_err(|e| crate::error::Error::Queue(e.to_string()))?;
        jobs.add(stats_job)
            .await
            .map_err(|e| crate::error::Error::Queue(e.to_string()))?;

        jobs.start()
            .await
            .map_err(|e| crate::error::Error::Queue(e.to_string()))?;

        let worker = Worker::new(self.queue.clone(), self.orchestrator.clone());
        worker.run(&cancel).await;

        info!("scheduler.shutting_down");
        self.queue.close();
        if let Err(err) = jobs.shutdown().await {
            warn!(%err, "scheduler.cron_shutdown_failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertConfig, AlertDispatcher};
    use crate::cache::memory::MemoryCache;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn shutting_down_immediately_closes_the_queue() {
        let queue = Arc::new(Queue::new());
        let cache = Arc::new(MemoryCache::new());
        let alerts = Arc::new(AlertDispatcher::new(
            reqwest::Client::new(),
            cache.clone(),
            AlertConfig { webhook_url: None, min_roi_percent: dec!(5), min_profit_amount: dec!(0), cooldown_seconds: 60 },
        ));
        let orchestrator = Arc::new(ScanOrchestrator::new(vec![], cache, alerts));
        let scheduler = Scheduler::new(queue.clone(), orchestrator, 50);

        let cancel = CancellationToken::new();
        cancel.cancel();
        scheduler.run(cancel).await.unwrap();
        assert_eq!(queue.stats().await.pending, 0);
    }
}
