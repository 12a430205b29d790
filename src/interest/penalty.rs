use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::interest::days_between;
use crate::state::Installment;
use crate::types::PenaltyBasis;

/// penalty configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// penalty rate charged per day overdue
    pub daily_rate: Rate,
    /// days after the due date before penalties start
    pub grace_period_days: u32,
    /// what the daily rate is applied to
    pub basis: PenaltyBasis,
}

impl PenaltyConfig {
    pub fn new(daily_rate: Rate, grace_period_days: u32, basis: PenaltyBasis) -> Self {
        Self {
            daily_rate,
            grace_period_days,
            basis,
        }
    }
}

/// engine for late penalties on installments
///
/// penalties are realized lazily: `assess` reports what has accrued between
/// the installment's last assessment and a payment date, and only the
/// caller that actually applies money records the new assessment.
#[derive(Debug, Clone)]
pub struct PenaltyEngine {
    pub config: PenaltyConfig,
}

impl PenaltyEngine {
    pub fn new(config: PenaltyConfig) -> Self {
        Self { config }
    }

    /// first day that counts toward a penalty for this due date
    pub fn accrual_start(&self, due_date: NaiveDate) -> NaiveDate {
        due_date
            .checked_add_days(Days::new(u64::from(self.config.grace_period_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// amount the daily rate applies to
    pub fn penalty_base(&self, installment: &Installment) -> Money {
        match self.config.basis {
            PenaltyBasis::OutstandingPrincipal => installment.principal_outstanding(),
            PenaltyBasis::OutstandingTotal => installment.outstanding(),
        }
    }

    /// penalty accrued on `installment` since its last assessment, as of `as_of`
    pub fn assess(&self, installment: &Installment, as_of: NaiveDate) -> PenaltyAssessment {
        let base = self.penalty_base(installment);
        let start = self.accrual_start(installment.due_date);
        let from = installment
            .penalty_assessed_through
            .map_or(start, |through| through.max(start));

        let days_charged = days_between(from, as_of);
        if days_charged == 0 || base.is_zero() {
            return PenaltyAssessment {
                additional: Money::ZERO,
                days_charged: 0,
                base,
                assessed_through: installment.penalty_assessed_through,
            };
        }

        let penalty = base.as_decimal() * self.config.daily_rate.as_decimal() * Decimal::from(days_charged);

        PenaltyAssessment {
            additional: Money::from_decimal(penalty),
            days_charged,
            base,
            assessed_through: Some(as_of),
        }
    }

    /// whole days past the due date, ignoring grace
    pub fn days_overdue(due_date: NaiveDate, as_of: NaiveDate) -> u32 {
        days_between(due_date, as_of)
    }
}

/// penalty accrued over one assessment window
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyAssessment {
    pub additional: Money,
    pub days_charged: u32,
    pub base: Money,
    /// new high-water mark if this assessment is recorded
    pub assessed_through: Option<NaiveDate>,
}
