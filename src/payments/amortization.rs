use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::LoanTerms;
use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::interest;
use crate::state::Installment;
use crate::types::InterestMethod;

/// generated installment schedule with totals
#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationSchedule {
    pub method: InterestMethod,
    pub principal: Money,
    pub anchor: NaiveDate,
    pub installments: Vec<Installment>,
    pub total_interest: Money,
    pub total_payable: Money,
}

impl AmortizationSchedule {
    /// get installment by 1-based sequence
    pub fn get_installment(&self, sequence: u32) -> Option<&Installment> {
        if sequence == 0 {
            return None;
        }
        self.installments.get((sequence - 1) as usize)
    }

    pub fn first_due_date(&self) -> Option<NaiveDate> {
        self.installments.first().map(|i| i.due_date)
    }

    pub fn final_due_date(&self) -> Option<NaiveDate> {
        self.installments.last().map(|i| i.due_date)
    }
}

/// amortization calculator
///
/// deterministic: the same terms and anchor always yield the same schedule.
/// per-installment amounts are rounded to the minor unit and the last
/// installment absorbs whatever the rounding left over.
pub struct AmortizationCalculator {
    method: InterestMethod,
}

impl AmortizationCalculator {
    pub fn new(method: InterestMethod) -> Self {
        Self { method }
    }

    /// generate the schedule for `terms`, due dates counted from `anchor`
    pub fn generate(terms: &LoanTerms, anchor: NaiveDate) -> Result<AmortizationSchedule> {
        terms.validate()?;
        let calculator = AmortizationCalculator::new(terms.interest_method);
        let splits = calculator.calculate_splits(terms)?;

        let mut installments = Vec::with_capacity(splits.len());
        for (index, (principal, interest)) in splits.into_iter().enumerate() {
            let sequence = (index + 1) as u32;
            let due = interest::due_date(anchor, terms.frequency, sequence).ok_or_else(|| {
                LendingError::CalculationError {
                    message: format!("due date of installment {} is out of range", sequence),
                }
            })?;
            installments.push(Installment::new(sequence, due, principal, interest));
        }

        let total_interest: Money = installments.iter().map(|i| i.interest_due).sum();
        let total_payable: Money = installments.iter().map(|i| i.total_due).sum();

        debug!(
            method = ?terms.interest_method,
            principal = %terms.principal,
            installments = installments.len(),
            total_interest = %total_interest,
            "generated amortization schedule"
        );

        Ok(AmortizationSchedule {
            method: terms.interest_method,
            principal: terms.principal,
            anchor,
            installments,
            total_interest,
            total_payable,
        })
    }

    /// (principal, interest) per installment, in sequence order
    pub fn calculate_splits(&self, terms: &LoanTerms) -> Result<Vec<(Money, Money)>> {
        let count = terms.installment_count();
        match self.method {
            InterestMethod::Flat => Ok(self.calculate_flat(terms, count)),
            InterestMethod::Diminishing => self.calculate_diminishing(terms, count),
            InterestMethod::AddOn => Ok(self.calculate_add_on(terms, count)),
        }
    }

    /// interest on the original principal, spread evenly
    fn calculate_flat(&self, terms: &LoanTerms, count: u32) -> Vec<(Money, Money)> {
        let total_interest = interest::simple_interest(
            terms.principal.as_decimal(),
            terms.annual_rate,
            terms.term_length,
            terms.term_unit,
        );

        let principals = even_split(terms.principal.as_decimal(), count);
        let interests = even_split(total_interest, count);
        principals.into_iter().zip(interests).collect()
    }

    /// equal installments on a declining balance
    fn calculate_diminishing(&self, terms: &LoanTerms, count: u32) -> Result<Vec<(Money, Money)>> {
        let periodic_rate = periodic_rate(terms.annual_rate, terms);
        let installment = Money::from_decimal(calculate_installment_amount(
            terms.principal.as_decimal(),
            periodic_rate,
            count,
        )?);

        let mut splits = Vec::with_capacity(count as usize);
        let mut balance = terms.principal;

        for sequence in 1..=count {
            let interest = Money::from_decimal(balance.as_decimal() * periodic_rate);
            let principal = if sequence == count {
                // last installment clears the balance exactly
                balance
            } else {
                (installment - interest).max(Money::ZERO).min(balance)
            };

            splits.push((principal, interest));
            balance -= principal;
        }

        Ok(splits)
    }

    /// full-term interest added to principal, then divided
    ///
    /// the installment total is rounded first and interest is whatever is
    /// left after the principal share, so every installment but the last
    /// has the same total.
    fn calculate_add_on(&self, terms: &LoanTerms, count: u32) -> Vec<(Money, Money)> {
        let total_interest = Money::from_decimal(interest::simple_interest(
            terms.principal.as_decimal(),
            terms.annual_rate,
            terms.term_length,
            terms.term_unit,
        ));
        let total_payable = terms.principal + total_interest;

        let installment = total_payable / Decimal::from(count);
        let principal_share = terms.principal / Decimal::from(count);
        let leading = Decimal::from(count - 1);

        let last_total = total_payable - installment * leading;
        let last_principal = terms.principal - principal_share * leading;
        let interest_share = installment - principal_share;
        let last_interest = last_total - last_principal;

        if interest_share.is_negative() || last_interest.is_negative() {
            // add-on interest too small to survive rounding the totals first
            return self.calculate_flat(terms, count);
        }

        (1..=count)
            .map(|sequence| {
                if sequence == count {
                    (last_principal, last_interest)
                } else {
                    (principal_share, interest_share)
                }
            })
            .collect()
    }
}

/// rate per installment period
fn periodic_rate(annual_rate: Rate, terms: &LoanTerms) -> Decimal {
    annual_rate.periodic(Decimal::from(interest::periods_per_year(terms.frequency)))
}

/// `amount / count` rounded per share, the last share taking the remainder
fn even_split(amount: Decimal, count: u32) -> Vec<Money> {
    let total = Money::from_decimal(amount);
    let share = Money::from_decimal(amount / Decimal::from(count));
    let last = total - share * Decimal::from(count - 1);

    (1..=count)
        .map(|sequence| if sequence == count { last } else { share })
        .collect()
}

/// annuity installment `P * r * (1 + r)^n / ((1 + r)^n - 1)`
///
/// full precision, the caller rounds. a zero rate divides the principal
/// evenly.
pub fn calculate_installment_amount(principal: Decimal, periodic_rate: Decimal, count: u32) -> Result<Decimal> {
    if count == 0 {
        return Ok(principal);
    }
    if periodic_rate.is_zero() {
        return Ok(principal / Decimal::from(count));
    }

    let mut compound = Decimal::ONE;
    let base = Decimal::ONE + periodic_rate;
    for _ in 0..count {
        compound = compound.checked_mul(base).ok_or_else(|| LendingError::CalculationError {
            message: format!("compound factor overflows over {} periods", count),
        })?;
    }

    let numerator = principal
        .checked_mul(periodic_rate)
        .and_then(|n| n.checked_mul(compound))
        .ok_or_else(|| LendingError::CalculationError {
            message: "installment amount overflows".to_string(),
        })?;
    let denominator = compound - Decimal::ONE;

    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaymentFrequency, TermUnit};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_flat_schedule() {
        let terms = LoanTerms::monthly(Money::from_major(10_000), Rate::from_percentage(12), 12, InterestMethod::Flat);
        let schedule = AmortizationCalculator::generate(&terms, date(2024, 1, 15)).unwrap();

        assert_eq!(schedule.installments.len(), 12);
        for inst in &schedule.installments[..11] {
            assert_eq!(inst.principal_due, money("833.33"));
            assert_eq!(inst.interest_due, money("100.00"));
        }
        let last = &schedule.installments[11];
        assert_eq!(last.principal_due, money("833.37"));
        assert_eq!(last.interest_due, money("100.00"));

        assert_eq!(schedule.total_interest, money("1200.00"));
        assert_eq!(schedule.total_payable, money("11200.00"));
        assert_eq!(schedule.first_due_date(), Some(date(2024, 2, 15)));
        assert_eq!(schedule.final_due_date(), Some(date(2025, 1, 15)));
    }

    #[test]
    fn test_diminishing_schedule() {
        let terms = LoanTerms::monthly(
            Money::from_major(10_000),
            Rate::from_percentage(12),
            12,
            InterestMethod::Diminishing,
        );
        let schedule = AmortizationCalculator::generate(&terms, date(2024, 1, 1)).unwrap();

        let first = &schedule.installments[0];
        assert_eq!(first.total_due, money("888.49"));
        assert_eq!(first.interest_due, money("100.00"));
        assert_eq!(first.principal_due, money("788.49"));

        // constant installment except for the last
        for inst in &schedule.installments[..11] {
            assert_eq!(inst.total_due, money("888.49"));
        }

        let principal: Money = schedule.installments.iter().map(|i| i.principal_due).sum();
        assert_eq!(principal, terms.principal);

        // interest declines with the balance
        for pair in schedule.installments.windows(2) {
            assert!(pair[1].interest_due <= pair[0].interest_due);
        }
    }

    #[test]
    fn test_diminishing_zero_rate() {
        let terms = LoanTerms::monthly(Money::from_major(1_000), Rate::ZERO, 3, InterestMethod::Diminishing);
        let schedule = AmortizationCalculator::generate(&terms, date(2024, 1, 1)).unwrap();

        let principals: Vec<Money> = schedule.installments.iter().map(|i| i.principal_due).collect();
        assert_eq!(principals, vec![money("333.33"), money("333.33"), money("333.34")]);
        assert_eq!(schedule.total_interest, Money::ZERO);
    }

    #[test]
    fn test_add_on_schedule() {
        let terms = LoanTerms::monthly(Money::from_major(10_000), Rate::from_percentage(10), 12, InterestMethod::AddOn);
        let schedule = AmortizationCalculator::generate(&terms, date(2024, 1, 1)).unwrap();

        // 11,000 total payable, 916.67 per installment
        for inst in &schedule.installments[..11] {
            assert_eq!(inst.total_due, money("916.67"));
            assert_eq!(inst.principal_due, money("833.33"));
            assert_eq!(inst.interest_due, money("83.34"));
        }
        let last = &schedule.installments[11];
        assert_eq!(last.total_due, money("916.63"));
        assert_eq!(last.principal_due, money("833.37"));
        assert_eq!(last.interest_due, money("83.26"));

        assert_eq!(schedule.total_payable, money("11000.00"));
        assert_eq!(schedule.total_interest, money("1000.00"));
    }

    #[test]
    fn test_weekly_term_with_monthly_unit() {
        let terms = LoanTerms::new(
            Money::from_major(5_000),
            Rate::from_percentage(26),
            InterestMethod::Flat,
            3,
            TermUnit::Months,
            PaymentFrequency::Weekly,
        );
        let schedule = AmortizationCalculator::generate(&terms, date(2024, 1, 1)).unwrap();

        // 3 months of weekly payments: ceil(3 * 52 / 12) = 13
        assert_eq!(schedule.installments.len(), 13);
        assert_eq!(schedule.get_installment(1).map(|i| i.due_date), Some(date(2024, 1, 8)));
        assert_eq!(schedule.total_interest, money("325.00"));

        let principal: Money = schedule.installments.iter().map(|i| i.principal_due).sum();
        assert_eq!(principal, terms.principal);
    }

    #[test]
    fn test_invalid_terms_rejected() {
        let terms = LoanTerms::monthly(Money::ZERO, Rate::from_percentage(12), 12, InterestMethod::Flat);
        assert!(matches!(
            AmortizationCalculator::generate(&terms, date(2024, 1, 1)),
            Err(LendingError::InvalidTerms { .. })
        ));
    }

    #[test]
    fn test_installment_amount_formula() {
        let amount = calculate_installment_amount(dec!(10000), dec!(0.01), 12).unwrap();
        assert_eq!(Money::from_decimal(amount), money("888.49"));

        let amount = calculate_installment_amount(dec!(1200), Decimal::ZERO, 12).unwrap();
        assert_eq!(amount, dec!(100));
    }
}
