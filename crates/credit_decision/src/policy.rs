//! Eligibility policies.

use credit_protocol::Proposal;
use rust_decimal::Decimal;
use std::fmt;

/// Result of evaluating a proposal against a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Approved { amount: Decimal },
    Rejected { reason: RejectionReason },
}

impl Eligibility {
    pub fn is_approved(&self) -> bool {
        matches!(self, Eligibility::Approved { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    MissingAge,
    MissingIncome,
    AgeOutOfRange,
    IncomeTooLow,
}

impl RejectionReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingAge => "missing_age",
            Self::MissingIncome => "missing_income",
            Self::AgeOutOfRange => "age_out_of_range",
            Self::IncomeTooLow => "income_too_low",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single entry point of an underwriting rule.
///
/// Implementations must be total: every proposal, including one with all
/// fields missing, maps to an [`Eligibility`].
pub trait EligibilityPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, proposal: &Proposal) -> Eligibility;
}

impl<F> EligibilityPolicy for F
where
    F: Fn(&Proposal) -> Eligibility + Send + Sync,
{
    fn name(&self) -> &str {
        "custom"
    }

    fn evaluate(&self, proposal: &Proposal) -> Eligibility {
        self(proposal)
    }
}

/// Stand-in rule until a real underwriting policy exists.
///
/// Approves when `min_age < age < max_age` and `income > min_income`, granting
/// `income * months / divisor` (one year of income scaled by 0.1 with the
/// defaults). All bounds are exclusive. An amount beyond the decimal range is
/// granted as [`Decimal::MAX`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderPolicy {
    pub min_age: i32,
    pub max_age: i32,
    pub min_income: Decimal,
    pub months: Decimal,
    pub divisor: Decimal,
}

impl Default for PlaceholderPolicy {
    fn default() -> Self {
        Self {
            min_age: 18,
            max_age: 60,
            min_income: Decimal::new(2000, 0),
            months: Decimal::new(12, 0),
            divisor: Decimal::new(10, 0),
        }
    }
}

impl PlaceholderPolicy {
    fn amount_for(&self, income: Decimal) -> Decimal {
        income
            .checked_mul(self.months)
            .and_then(|yearly| yearly.checked_div(self.divisor))
            // Large incomes: scale down first, at the cost of trailing digits.
            .or_else(|| {
                income
                    .checked_div(self.divisor)
                    .and_then(|scaled| scaled.checked_mul(self.months))
            })
            .unwrap_or(Decimal::MAX)
    }
}

impl EligibilityPolicy for PlaceholderPolicy {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn evaluate(&self, proposal: &Proposal) -> Eligibility {
        let reject = |reason| Eligibility::Rejected { reason };

        let Some(age) = proposal.age else {
            return reject(RejectionReason::MissingAge);
        };
        let Some(income) = proposal.monthly_income else {
            return reject(RejectionReason::MissingIncome);
        };
        if age <= self.min_age || age >= self.max_age {
            return reject(RejectionReason::AgeOutOfRange);
        }
        if income <= self.min_income {
            return reject(RejectionReason::IncomeTooLow);
        }

        Eligibility::Approved {
            amount: self.amount_for(income).normalize(),
        }
    }
}
