//! Decision worker.
//!
//! [`DecisionWorker`] handles one storage notification: it downloads the
//! proposal, runs the decision engine and writes the decision object.
//! [`Dispatcher`] feeds it from a notification channel with bounded
//! concurrency and redelivery of transient failures.

mod dispatcher;
mod worker;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats, StatsSnapshot};
pub use worker::{
    DecisionNaming, DecisionWorker, Stage, WorkerConfig, WorkerError, WorkerOutcome,
};
