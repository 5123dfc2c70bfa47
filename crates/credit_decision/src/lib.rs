//! Decision engine.
//!
//! Maps a [`Proposal`] to a [`DecisionResult`] without any I/O. The only
//! non-deterministic inputs, the current time and the decision id, are
//! injected through [`Clock`] and [`IdGenerator`]. The underwriting rule sits
//! behind [`EligibilityPolicy`] so it can be replaced without touching
//! ingestion or storage code.

mod inputs;
mod policy;

pub use inputs::{Clock, FixedClock, IdGenerator, RandomIds, SequenceIds, SystemClock};
pub use policy::{Eligibility, EligibilityPolicy, PlaceholderPolicy, RejectionReason};

use credit_ids::DecisionId;
use credit_protocol::{DecisionResult, DecisionStatus, Proposal};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Clone)]
pub struct DecisionEngine {
    policy: Arc<dyn EligibilityPolicy>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(
            Arc::new(PlaceholderPolicy::default()),
            Arc::new(SystemClock),
            Arc::new(RandomIds),
        )
    }
}

impl DecisionEngine {
    pub fn new(
        policy: Arc<dyn EligibilityPolicy>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self { policy, clock, ids }
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn evaluate(&self, proposal: &Proposal) -> Eligibility {
        self.policy.evaluate(proposal)
    }

    /// Decide with a freshly generated id.
    pub fn decide(&self, proposal: &Proposal) -> DecisionResult {
        self.decide_with_id(self.ids.next_id(), proposal)
    }

    /// Decide under a caller-chosen id.
    ///
    /// The returned status is always `APPROVED` or `REJECTED`.
    pub fn decide_with_id(&self, id: DecisionId, proposal: &Proposal) -> DecisionResult {
        let (status, approved_amount) = match self.policy.evaluate(proposal) {
            Eligibility::Approved { amount } => (DecisionStatus::Approved, amount),
            Eligibility::Rejected { .. } => (DecisionStatus::Rejected, Decimal::ZERO),
        };
        DecisionResult {
            id,
            status,
            approved_amount,
            decided_at: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(
            Arc::new(PlaceholderPolicy::default()),
            Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            )),
            Arc::new(SequenceIds::new("d")),
        )
    }

    fn proposal(age: Option<i32>, income: Option<i64>) -> Proposal {
        Proposal {
            age,
            monthly_income: income.map(|i| Decimal::new(i, 0)),
            ..Proposal::default()
        }
    }

    #[test]
    fn approved_amount_is_a_tenth_of_a_year() {
        let result = engine().decide(&proposal(Some(30), Some(3000)));
        assert_eq!(result.status, DecisionStatus::Approved);
        assert_eq!(result.approved_amount, Decimal::new(3600, 0));
        assert_eq!(result.id.as_str(), "d1");
        assert_eq!(
            result.decided_at,
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
        );
    }

    #[test]
    fn rejection_table() {
        let engine = engine();
        for (age, income) in [
            (Some(17), Some(5000)),
            (Some(40), Some(1999)),
            (Some(60), Some(5000)),
            (None, Some(5000)),
            (Some(30), None),
            (None, None),
        ] {
            let result = engine.decide(&proposal(age, income));
            assert_eq!(result.status, DecisionStatus::Rejected, "{age:?}/{income:?}");
            assert_eq!(result.approved_amount, Decimal::ZERO);
        }
    }

    #[test]
    fn income_just_above_the_threshold_is_approved() {
        let parsed = credit_protocol::parse(br#"{"idade":30,"rendaMensal":2000.0000000000001}"#)
            .unwrap();
        let result = engine().decide(&parsed);
        assert_eq!(result.status, DecisionStatus::Approved);
        assert_eq!(
            result.approved_amount,
            "2400.00000000000012".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn ids_come_from_the_generator_unless_supplied() {
        let engine = engine();
        assert_eq!(engine.decide(&Proposal::default()).id.as_str(), "d1");
        let fixed = DecisionId::parse("chosen").unwrap();
        assert_eq!(
            engine.decide_with_id(fixed.clone(), &Proposal::default()).id,
            fixed
        );
        assert_eq!(engine.decide(&Proposal::default()).id.as_str(), "d2");
    }

    #[test]
    fn policies_are_swappable() {
        let engine = DecisionEngine::new(
            Arc::new(|_: &Proposal| Eligibility::Approved {
                amount: Decimal::new(42, 0),
            }),
            Arc::new(SystemClock),
            Arc::new(RandomIds),
        );
        let result = engine.decide(&Proposal::default());
        assert!(result.is_approved());
        assert_eq!(result.approved_amount, Decimal::new(42, 0));
        assert_eq!(engine.policy_name(), "custom");
    }

    proptest! {
        #[test]
        fn status_is_always_terminal(
            age in proptest::option::of(any::<i32>()),
            cents in proptest::option::of(any::<i64>()),
        ) {
            let p = Proposal {
                age,
                monthly_income: cents.map(|c| Decimal::new(c, 2)),
                ..Proposal::default()
            };
            let result = engine().decide(&p);
            prop_assert!(result.status.is_terminal());
            if result.status == DecisionStatus::Rejected {
                prop_assert_eq!(result.approved_amount, Decimal::ZERO);
            } else {
                prop_assert!(result.approved_amount > Decimal::ZERO);
            }
        }
    }
}
