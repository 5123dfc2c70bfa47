//! Wiring of the running service: HTTP ingestion, notification channel and
//! decision dispatcher over one object store.

use anyhow::{Context, Result};
use credit_api::ApiState;
use credit_decision::DecisionEngine;
use credit_store::{NotifyingStore, ObjectStore};
use credit_worker::{DecisionWorker, Dispatcher, StatsSnapshot};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServiceConfig;

/// Time the dispatcher gets to drain queued notifications after the HTTP
/// server has stopped.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the storage notification channel.
const NOTIFICATION_CAPACITY: usize = 1024;

/// Serve until `shutdown` resolves, then drain the dispatcher.
///
/// Proposals without a decision are queued for the dispatcher before the
/// server starts. Anything abandoned at shutdown is found again on the next
/// start. Returns the dispatcher counters at exit.
pub async fn run(
    config: ServiceConfig,
    store: Arc<dyn ObjectStore>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<StatsSnapshot> {
    if config.input_bucket == config.output_bucket {
        warn!(
            bucket = %config.input_bucket,
            "input and output buckets are the same"
        );
    }

    let (ingest, notifications) =
        NotifyingStore::channel(Arc::clone(&store), NOTIFICATION_CAPACITY);
    let worker = DecisionWorker::new(store, DecisionEngine::default(), config.worker_config());
    // Proposals stored while no dispatcher was running still need a decision.
    let backlog = worker
        .undecided(&config.input_bucket)
        .await
        .context("Failed to list undecided proposals")?;
    let (dispatcher, dispatcher_shutdown) =
        Dispatcher::new(worker, config.dispatcher_config(), notifications);
    let dispatcher = dispatcher.with_backlog(backlog);
    let stats = dispatcher.stats();
    let mut dispatcher_task = tokio::spawn(dispatcher.run());

    let state = ApiState {
        max_body_bytes: config.max_body_bytes,
        max_upload_bytes: config.max_upload_bytes,
        ..ApiState::new(Arc::new(ingest), config.input_bucket.clone())
    };

    let local_addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!(
        listen = %local_addr,
        input_bucket = %config.input_bucket,
        output_bucket = %config.output_bucket,
        "credit service ready"
    );

    // Dropping the router drops the last notification sender, which lets the
    // dispatcher finish the queue and return on its own.
    let served = credit_api::serve(listener, state, shutdown).await;
    info!("HTTP server stopped, draining decisions");

    match tokio::time::timeout(DRAIN_TIMEOUT, &mut dispatcher_task).await {
        Ok(joined) => joined.context("Dispatcher task failed")?,
        Err(_) => {
            warn!(
                timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "dispatcher did not drain in time, stopping it"
            );
            let _ = dispatcher_shutdown.send(()).await;
            dispatcher_task.await.context("Dispatcher task failed")?;
        }
    }

    served.context("HTTP server failed")?;
    Ok(stats.snapshot())
}
