//! Side inputs of the engine: the current time and fresh decision ids.

use chrono::{DateTime, Utc};
use credit_ids::DecisionId;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> DecisionId;
}

/// Random UUID-backed ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> DecisionId {
        DecisionId::new()
    }
}

/// `{prefix}1`, `{prefix}2`, ...
#[derive(Debug)]
pub struct SequenceIds {
    prefix: String,
    next: AtomicU64,
}

impl SequenceIds {
    /// `prefix` must only contain `[A-Za-z0-9_-]`; anything else is dropped.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> DecisionId {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        DecisionId::parse(&format!("{}{}", self.prefix, n)).unwrap_or_default()
    }
}
