//! Persisted outcome of evaluating a proposal.

use chrono::{DateTime, Utc};
use credit_ids::DecisionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    Approved,
    Rejected,
    /// Placeholder of an uninitialised record. Never persisted.
    #[default]
    Pending,
}

impl DecisionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Pending => "PENDING",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision record as written to the output bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub id: DecisionId,
    pub status: DecisionStatus,
    #[serde(rename = "valorAprovado", with = "crate::amount::exact")]
    pub approved_amount: Decimal,
    #[serde(rename = "dataDecisao")]
    pub decided_at: DateTime<Utc>,
}

impl DecisionResult {
    pub fn is_approved(&self) -> bool {
        self.status == DecisionStatus::Approved
    }
}
