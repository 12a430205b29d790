//! Exact period arithmetic shared by schedules, penalties, and pawn terms.
//!
//! Conversions between term units and payment frequencies are done on
//! integers (or with a single final `Decimal` division) so that long terms
//! never drift the way repeated floating-point period lengths would.

pub mod penalty;

use chrono::{Days, Months, NaiveDate};
use rust_decimal::Decimal;

use crate::decimal::Rate;
use crate::types::{PaymentFrequency, TermUnit};

pub use penalty::{PenaltyAssessment, PenaltyConfig, PenaltyEngine};

/// how many of `unit` make up one year
pub fn units_per_year(unit: TermUnit) -> u32 {
    match unit {
        TermUnit::Days => 365,
        TermUnit::Weeks => 52,
        TermUnit::Months => 12,
        TermUnit::Years => 1,
    }
}

/// how many installments of `frequency` fall in one year
pub fn periods_per_year(frequency: PaymentFrequency) -> u32 {
    match frequency {
        PaymentFrequency::Daily => 365,
        PaymentFrequency::Weekly => 52,
        PaymentFrequency::BiWeekly => 26,
        PaymentFrequency::SemiMonthly => 24,
        PaymentFrequency::Monthly => 12,
        PaymentFrequency::Quarterly => 4,
        PaymentFrequency::SemiAnnually => 2,
        PaymentFrequency::Annually => 1,
    }
}

/// term length expressed in years
pub fn term_in_years(length: u32, unit: TermUnit) -> Decimal {
    Decimal::from(length) / Decimal::from(units_per_year(unit))
}

/// term length expressed in months
pub fn term_in_months(length: u32, unit: TermUnit) -> Decimal {
    Decimal::from(length) * Decimal::from(12) / Decimal::from(units_per_year(unit))
}

/// number of installments needed to cover the term
///
/// `ceil(length * periods_per_year / units_per_year)` on integers; a term
/// shorter than one payment period still produces a single installment.
pub fn installment_count(length: u32, unit: TermUnit, frequency: PaymentFrequency) -> u32 {
    let numerator = u64::from(length) * u64::from(periods_per_year(frequency));
    let denominator = u64::from(units_per_year(unit));
    let count = (numerator + denominator - 1) / denominator;
    u32::try_from(count).unwrap_or(u32::MAX).max(1)
}

/// simple interest over the whole term: `principal * rate * years`
///
/// multiplies before dividing so the only inexact step is the final
/// division by the unit count.
pub fn simple_interest(principal: Decimal, annual_rate: Rate, length: u32, unit: TermUnit) -> Decimal {
    principal * annual_rate.as_decimal() * Decimal::from(length) / Decimal::from(units_per_year(unit))
}

/// due date of installment `index` (1-based), counted from the anchor
///
/// each date is computed from the anchor rather than from the previous
/// due date, so month-end clamping never accumulates.
pub fn due_date(anchor: NaiveDate, frequency: PaymentFrequency, index: u32) -> Option<NaiveDate> {
    match frequency {
        PaymentFrequency::Daily => anchor.checked_add_days(Days::new(u64::from(index))),
        PaymentFrequency::Weekly => anchor.checked_add_days(Days::new(7 * u64::from(index))),
        PaymentFrequency::BiWeekly => anchor.checked_add_days(Days::new(14 * u64::from(index))),
        PaymentFrequency::SemiMonthly => {
            let base = anchor.checked_add_months(Months::new(index / 2))?;
            if index % 2 == 1 {
                base.checked_add_days(Days::new(15))
            } else {
                Some(base)
            }
        }
        PaymentFrequency::Monthly => anchor.checked_add_months(Months::new(index)),
        PaymentFrequency::Quarterly => anchor.checked_add_months(Months::new(index.checked_mul(3)?)),
        PaymentFrequency::SemiAnnually => anchor.checked_add_months(Months::new(index.checked_mul(6)?)),
        PaymentFrequency::Annually => anchor.checked_add_months(Months::new(index.checked_mul(12)?)),
    }
}

/// end of a term of `length` units starting at `start`
pub fn term_end(start: NaiveDate, length: u32, unit: TermUnit) -> Option<NaiveDate> {
    match unit {
        TermUnit::Days => start.checked_add_days(Days::new(u64::from(length))),
        TermUnit::Weeks => start.checked_add_days(Days::new(7 * u64::from(length))),
        TermUnit::Months => start.checked_add_months(Months::new(length)),
        TermUnit::Years => start.checked_add_months(Months::new(length.checked_mul(12)?)),
    }
}

/// whole calendar days from `from` to `to`, zero if `to` is not later
pub fn days_between(from: NaiveDate, to: NaiveDate) -> u32 {
    let days = (to - from).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}
