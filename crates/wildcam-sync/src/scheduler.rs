//! Recurring sync scheduling
//!
//! The sweep is registered with a [`RecurringJobRunner`]; the runner owns the
//! timing, the scheduler owns what a tick does. Manual triggers bypass the
//! runner but share the orchestrator's per-source locks.

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use uuid::Uuid;
use wildcam_common::types::SyncResult;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::orchestrator::SyncOrchestrator;

/// Work performed on every tick
pub type RecurringJob = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs jobs on a fixed cadence until shut down
pub trait RecurringJobRunner: Send + Sync {
    /// Start `job` after `initial_delay`, then every `interval`
    ///
    /// A tick that comes due while the previous one is still running is
    /// delayed, never run concurrently.
    fn spawn(
        &self,
        name: &str,
        interval: Duration,
        initial_delay: Duration,
        job: RecurringJob,
    ) -> JoinHandle<()>;

    /// Stop starting new ticks; a tick already running completes
    fn shutdown(&self);
}

/// [`RecurringJobRunner`] backed by `tokio::time::interval`
pub struct IntervalJobRunner {
    shutdown: watch::Sender<bool>,
}

impl Default for IntervalJobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalJobRunner {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { shutdown }
    }
}

impl RecurringJobRunner for IntervalJobRunner {
    fn spawn(
        &self,
        name: &str,
        interval: Duration,
        initial_delay: Duration,
        job: RecurringJob,
    ) -> JoinHandle<()> {
        let mut shutdown = self.shutdown.subscribe();
        let name = name.to_string();

        tokio::spawn(async move {
            info!(job = %name, interval_secs = interval.as_secs(), "Recurring job registered");

            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(initial_delay) => {},
                _ = shutdown.changed() => {
                    info!(job = %name, "Recurring job stopped before first run");
                    return;
                },
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => job().await,
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
            }

            info!(job = %name, "Recurring job stopped");
        })
    }

    fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Periodic sweep over all active sources plus on-demand single-source runs
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    runner: Arc<dyn RecurringJobRunner>,
    interval: Duration,
    initial_delay: Duration,
    max_files_per_source: usize,
}

impl SyncScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        runner: Arc<dyn RecurringJobRunner>,
        interval: Duration,
        max_files_per_source: usize,
    ) -> Self {
        Self {
            orchestrator,
            runner,
            interval,
            initial_delay: Duration::ZERO,
            max_files_per_source,
        }
    }

    pub fn from_config(
        orchestrator: Arc<SyncOrchestrator>,
        runner: Arc<dyn RecurringJobRunner>,
        config: &SyncConfig,
    ) -> Self {
        Self::new(
            orchestrator,
            runner,
            config.sync_interval(),
            config.scheduler.max_files_per_source,
        )
        .with_initial_delay(config.initial_delay())
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    /// Register the recurring sweep
    pub fn start(&self) -> JoinHandle<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            max_files_per_source = self.max_files_per_source,
            "Starting sync scheduler"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let max_files = self.max_files_per_source;
        let job: RecurringJob = Arc::new(move || {
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                match orchestrator.pull_and_process_all_active_sources(max_files).await {
                    Ok(summary) if summary.is_empty() => {},
                    Ok(summary) => info!(
                        synced = summary.sources_synced,
                        failed = summary.sources_failed,
                        files_succeeded = summary.files_succeeded,
                        "Scheduled sweep completed"
                    ),
                    Err(e) => error!(error = %e, "Scheduled sweep aborted"),
                }
            }
            .boxed()
        });

        self.runner
            .spawn("pull-source-sweep", self.interval, self.initial_delay, job)
    }

    /// Sync one source now, outside the schedule
    pub async fn trigger_source(&self, source_id: Uuid, max_files: usize) -> Result<SyncResult> {
        self.orchestrator
            .pull_and_process_source(source_id, max_files)
            .await
    }

    /// Stop scheduling and let in-flight runs wind down after their current file
    pub fn shutdown(&self) {
        info!("Shutting down sync scheduler");
        self.orchestrator.stop();
        self.runner.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(counter: Arc<AtomicUsize>) -> RecurringJob {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_runner_ticks_on_cadence() {
        let runner = IntervalJobRunner::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = runner.spawn(
            "test",
            Duration::from_secs(60),
            Duration::ZERO,
            counting_job(Arc::clone(&counter)),
        );

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        runner.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_runner_honors_initial_delay() {
        let runner = IntervalJobRunner::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = runner.spawn(
            "test",
            Duration::from_secs(60),
            Duration::from_secs(30),
            counting_job(Arc::clone(&counter)),
        );

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        runner.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick() {
        let runner = IntervalJobRunner::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = runner.spawn(
            "test",
            Duration::from_secs(60),
            Duration::from_secs(3600),
            counting_job(Arc::clone(&counter)),
        );
        runner.shutdown();
        handle.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
