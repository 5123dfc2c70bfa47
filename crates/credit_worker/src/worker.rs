//! Per-notification decision processing.
//!
//! One call to [`DecisionWorker::handle`] walks a notification through
//!
//! ```text
//! RECEIVED -> VALIDATED -> DOWNLOADED -> PARSED -> DECIDED -> PERSISTED
//! ```
//!
//! leaving early as `IGNORED` (not a proposal object) or `FAILED` (the stored
//! bytes are not a usable proposal). At most one decision object is written.

use credit_decision::DecisionEngine;
use credit_ids::DecisionId;
use credit_protocol::defaults::JSON_CONTENT_TYPE;
use credit_protocol::keys::{APPLICATIONS_PREFIX, DECISIONS_PREFIX};
use credit_protocol::{
    base_name, decision_key, is_json_object_name, object_uri, parse, serialize_pretty,
    DecisionResult, ParseError, StorageNotification,
};
use credit_store::{ObjectStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Processing stage a notification had reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Downloaded,
    Parsed,
    Decided,
    Persisted,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Downloaded => "downloaded",
            Stage::Parsed => "parsed",
            Stage::Decided => "decided",
            Stage::Persisted => "persisted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error classification for the delivery layer.
///
/// `Transient` failures may succeed on redelivery. `Permanent` ones never
/// will and go straight to the dead-letter log.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("permanent failure after {stage}: {message}")]
    Permanent { stage: Stage, message: String },

    #[error("transient failure after {stage}: {message}")]
    Transient { stage: Stage, message: String },
}

impl WorkerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkerError::Transient { .. })
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, WorkerError::Permanent { .. })
    }

    pub fn stage(&self) -> Stage {
        match self {
            WorkerError::Permanent { stage, .. } | WorkerError::Transient { stage, .. } => *stage,
        }
    }

    fn from_store(stage: Stage, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } | StoreError::InvalidKey { .. } => WorkerError::Permanent {
                stage,
                message: err.to_string(),
            },
            StoreError::Io { .. } | StoreError::Unavailable(_) => WorkerError::Transient {
                stage,
                message: err.to_string(),
            },
        }
    }
}

/// How decision ids, and therefore decision keys, are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionNaming {
    /// Fresh id from the engine on every delivery.
    #[default]
    Random,
    /// Id hashed from the source bucket and object name. A redelivered
    /// notification finds its earlier decision and writes nothing.
    #[serde(rename = "source")]
    SourceDerived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub output_bucket: String,
    pub naming: DecisionNaming,
}

impl WorkerConfig {
    pub fn new(output_bucket: impl Into<String>) -> Self {
        Self {
            output_bucket: output_bucket.into(),
            naming: DecisionNaming::default(),
        }
    }

    pub fn with_naming(mut self, naming: DecisionNaming) -> Self {
        self.naming = naming;
        self
    }
}

/// What a successful invocation did.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// Not a proposal object. No store calls were made.
    Ignored,
    /// The object could not be decoded. Acknowledged without a write.
    Failed { error: ParseError },
    Persisted { key: String, decision: DecisionResult },
    /// A decision under the source-derived key already exists.
    AlreadyDecided { key: String },
}

impl WorkerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerOutcome::Ignored => "ignored",
            WorkerOutcome::Failed { .. } => "failed",
            WorkerOutcome::Persisted { .. } => "persisted",
            WorkerOutcome::AlreadyDecided { .. } => "already_decided",
        }
    }
}

/// Turns stored proposals into stored decisions.
#[derive(Clone)]
pub struct DecisionWorker {
    store: Arc<dyn ObjectStore>,
    engine: DecisionEngine,
    config: WorkerConfig,
}

impl DecisionWorker {
    pub fn new(store: Arc<dyn ObjectStore>, engine: DecisionEngine, config: WorkerConfig) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }

    /// Proposals in `input_bucket` that have no decision in the output
    /// bucket yet, as notifications ready for redelivery.
    ///
    /// A proposal counts as decided when any key under
    /// `decisions/{base-name}_` exists, whatever the naming mode.
    pub async fn undecided(
        &self,
        input_bucket: &str,
    ) -> Result<Vec<StorageNotification>, StoreError> {
        let decided: BTreeSet<String> = self
            .store
            .list(&self.config.output_bucket, DECISIONS_PREFIX)
            .await?
            .into_iter()
            .map(|meta| meta.key)
            .collect();

        let pending: Vec<StorageNotification> = self
            .store
            .list(input_bucket, APPLICATIONS_PREFIX)
            .await?
            .into_iter()
            .filter(|meta| is_json_object_name(&meta.key))
            .filter(|meta| {
                let prefix = format!("{DECISIONS_PREFIX}{}_", base_name(&meta.key));
                !decided
                    .range(prefix.clone()..)
                    .next()
                    .is_some_and(|key| key.starts_with(&prefix))
            })
            .map(|meta| {
                StorageNotification::new(input_bucket, meta.key, meta.size, meta.content_type)
            })
            .collect();

        info!(
            input_bucket,
            output_bucket = %self.config.output_bucket,
            undecided = pending.len(),
            "reconciled stored proposals against decisions"
        );
        Ok(pending)
    }

    /// Process one storage notification.
    pub async fn handle(
        &self,
        notification: &StorageNotification,
    ) -> Result<WorkerOutcome, WorkerError> {
        let bucket = notification.bucket.as_str();
        let name = notification.name.as_str();
        info!(
            bucket,
            name,
            size = notification.size,
            content_type = notification.content_type.as_deref().unwrap_or("-"),
            "processing {}",
            object_uri(self.store.scheme(), bucket, name)
        );

        if !is_json_object_name(name) {
            info!(bucket, name, "ignoring non-JSON object");
            return Ok(WorkerOutcome::Ignored);
        }

        let decision_id = match self.config.naming {
            DecisionNaming::Random => None,
            DecisionNaming::SourceDerived => {
                let id = DecisionId::derived_from(&[bucket, name]);
                let key = decision_key(name, &id);
                let exists = self
                    .store
                    .exists(&self.config.output_bucket, &key)
                    .await
                    .map_err(|e| WorkerError::from_store(Stage::Validated, e))?;
                if exists {
                    info!(bucket, name, key = %key, "decision already recorded, skipping");
                    return Ok(WorkerOutcome::AlreadyDecided { key });
                }
                Some(id)
            }
        };

        let bytes = self.store.get(bucket, name).await.map_err(|e| {
            let err = WorkerError::from_store(Stage::Validated, e);
            error!(bucket, name, error = %err, "failed to download proposal");
            err
        })?;
        debug!(bucket, name, bytes = bytes.len(), "proposal downloaded");

        let proposal = match parse(&bytes) {
            Ok(proposal) => proposal,
            Err(parse_error) => {
                error!(bucket, name, error = %parse_error, "proposal could not be decoded");
                return Ok(WorkerOutcome::Failed { error: parse_error });
            }
        };
        info!(
            bucket,
            name,
            age = ?proposal.age,
            monthly_income = ?proposal.monthly_income,
            "proposal received"
        );

        let decision = match decision_id {
            Some(id) => self.engine.decide_with_id(id, &proposal),
            None => self.engine.decide(&proposal),
        };
        info!(
            decision_id = %decision.id,
            status = decision.status.as_str(),
            approved_amount = %decision.approved_amount,
            policy = self.engine.policy_name(),
            "decision made"
        );

        let key = decision_key(name, &decision.id);
        let body = serialize_pretty(&decision).map_err(|e| WorkerError::Permanent {
            stage: Stage::Decided,
            message: format!("failed to encode decision: {e}"),
        })?;
        if let Err(e) = self
            .store
            .put(&self.config.output_bucket, &key, JSON_CONTENT_TYPE, body)
            .await
        {
            error!(
                bucket = %self.config.output_bucket,
                key = %key,
                error = %e,
                "failed to persist decision"
            );
            return Err(WorkerError::from_store(Stage::Decided, e));
        }

        info!(
            "decision saved to {}",
            object_uri(self.store.scheme(), &self.config.output_bucket, &key)
        );
        Ok(WorkerOutcome::Persisted { key, decision })
    }
}
