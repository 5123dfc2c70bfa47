//! In-process delivery of storage notifications to the decision worker.

use credit_protocol::defaults::{
    DEFAULT_MAX_DELIVERIES, DEFAULT_REDELIVERY_DELAY_MS, DEFAULT_WORKER_CONCURRENCY,
};
use credit_protocol::StorageNotification;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::worker::{DecisionWorker, WorkerOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Notifications for any other bucket are skipped.
    pub input_bucket: String,
    pub concurrency: usize,
    /// Total attempts per notification, including the first.
    pub max_deliveries: u32,
    pub redelivery_delay: Duration,
}

impl DispatcherConfig {
    pub fn new(input_bucket: impl Into<String>) -> Self {
        Self {
            input_bucket: input_bucket.into(),
            concurrency: DEFAULT_WORKER_CONCURRENCY,
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            redelivery_delay: Duration::from_millis(DEFAULT_REDELIVERY_DELAY_MS),
        }
    }
}

/// Counters updated as notifications are processed.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    received: AtomicU64,
    skipped: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
    persisted: AtomicU64,
    already_decided: AtomicU64,
    redelivered: AtomicU64,
    dead_lettered: AtomicU64,
    abandoned: AtomicU64,
}

/// Point-in-time copy of [`DispatcherStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub skipped: u64,
    pub ignored: u64,
    pub failed: u64,
    pub persisted: u64,
    pub already_decided: u64,
    pub redelivered: u64,
    pub dead_lettered: u64,
    /// Still queued when the dispatcher was told to stop.
    pub abandoned: u64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            already_decided: self.already_decided.load(Ordering::Relaxed),
            redelivered: self.redelivered.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &WorkerOutcome) {
        let counter = match outcome {
            WorkerOutcome::Ignored => &self.ignored,
            WorkerOutcome::Failed { .. } => &self.failed,
            WorkerOutcome::Persisted { .. } => &self.persisted,
            WorkerOutcome::AlreadyDecided { .. } => &self.already_decided,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumes notifications and runs the worker on each of them.
///
/// Up to `concurrency` invocations run at once. Transient failures are
/// retried after `redelivery_delay` until `max_deliveries` attempts have
/// been made; permanent failures and exhausted notifications are logged as
/// dead letters.
pub struct Dispatcher {
    worker: Arc<DecisionWorker>,
    config: DispatcherConfig,
    /// Delivered ahead of the channel.
    backlog: VecDeque<StorageNotification>,
    notifications: mpsc::Receiver<StorageNotification>,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<DispatcherStats>,
}

impl Dispatcher {
    /// Create a dispatcher and the sender that stops it.
    pub fn new(
        worker: DecisionWorker,
        config: DispatcherConfig,
        notifications: mpsc::Receiver<StorageNotification>,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let dispatcher = Self {
            worker: Arc::new(worker),
            config,
            backlog: VecDeque::new(),
            notifications,
            shutdown_rx,
            stats: Arc::new(DispatcherStats::default()),
        };
        (dispatcher, shutdown_tx)
    }

    /// Queue notifications to deliver before anything from the channel,
    /// typically [`DecisionWorker::undecided`] at startup.
    pub fn with_backlog(
        mut self,
        backlog: impl IntoIterator<Item = StorageNotification>,
    ) -> Self {
        self.backlog.extend(backlog);
        self
    }

    pub fn stats(&self) -> Arc<DispatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Run until a shutdown signal arrives or every notification sender is
    /// dropped, then wait for in-flight invocations.
    ///
    /// Notifications still queued at shutdown are not processed; they are
    /// logged and counted as abandoned.
    pub async fn run(mut self) {
        let concurrency = self.config.concurrency.max(1);
        let permits = Arc::new(Semaphore::new(concurrency));
        let mut in_flight: JoinSet<()> = JoinSet::new();
        info!(
            input_bucket = %self.config.input_bucket,
            concurrency,
            max_deliveries = self.config.max_deliveries,
            backlog = self.backlog.len(),
            "dispatcher started"
        );

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_join_error(joined);
            }

            let permit = tokio::select! {
                biased;

                Some(()) = self.shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }

                acquired = Arc::clone(&permits).acquire_owned() => match acquired {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("worker permits closed");
                        break;
                    }
                },
            };

            let notification = match self.backlog.pop_front() {
                Some(notification) => notification,
                None => tokio::select! {
                    biased;

                    Some(()) = self.shutdown_rx.recv() => {
                        info!("shutdown signal received");
                        break;
                    }

                    next = self.notifications.recv() => match next {
                        Some(notification) => notification,
                        None => {
                            info!("notification channel closed");
                            break;
                        }
                    },
                },
            };
            self.stats.received.fetch_add(1, Ordering::Relaxed);

            if notification.bucket != self.config.input_bucket {
                debug!(
                    bucket = %notification.bucket,
                    name = %notification.name,
                    "skipping notification for another bucket"
                );
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            in_flight.spawn(deliver(
                Arc::clone(&self.worker),
                notification,
                self.config.clone(),
                Arc::clone(&self.stats),
                permit,
            ));
        }

        self.abandon_queued();

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "waiting for in-flight decisions");
        }
        while let Some(joined) = in_flight.join_next().await {
            log_join_error(joined);
        }
        info!(stats = ?self.stats.snapshot(), "dispatcher stopped");
    }

    fn abandon_queued(&mut self) {
        self.notifications.close();
        let mut abandoned = 0u64;
        let queued = std::iter::from_fn(|| self.notifications.try_recv().ok());
        for notification in self.backlog.drain(..).chain(queued) {
            warn!(
                bucket = %notification.bucket,
                name = %notification.name,
                "notification abandoned at shutdown"
            );
            abandoned += 1;
        }
        if abandoned > 0 {
            self.stats.abandoned.fetch_add(abandoned, Ordering::Relaxed);
            warn!(
                abandoned,
                "undelivered notifications left; they are picked up again at the next start"
            );
        }
    }
}

async fn deliver(
    worker: Arc<DecisionWorker>,
    notification: StorageNotification,
    config: DispatcherConfig,
    stats: Arc<DispatcherStats>,
    _permit: OwnedSemaphorePermit,
) {
    let max_deliveries = config.max_deliveries.max(1);
    let mut attempt = 1;
    loop {
        match worker.handle(&notification).await {
            Ok(outcome) => {
                debug!(
                    name = %notification.name,
                    attempt,
                    outcome = outcome.as_str(),
                    "notification processed"
                );
                stats.record(&outcome);
                return;
            }
            Err(err) if err.is_transient() && attempt < max_deliveries => {
                warn!(
                    name = %notification.name,
                    attempt,
                    max_deliveries,
                    error = %err,
                    "decision failed (transient, redelivering)"
                );
                stats.redelivered.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(config.redelivery_delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!(
                    bucket = %notification.bucket,
                    name = %notification.name,
                    attempt,
                    permanent = err.is_permanent(),
                    error = %err,
                    "notification dead-lettered"
                );
                stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "decision task aborted");
    }
}
