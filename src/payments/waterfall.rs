use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LoanTerms;
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::interest::PenaltyEngine;
use crate::state::Installment;
use crate::types::PenaltyBasis;

use super::PaymentBreakdown;

/// what one payment did to one installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentAllocation {
    pub sequence: u32,
    /// penalty newly assessed on this installment at the payment date
    pub penalty_assessed: Money,
    pub penalty_assessed_through: Option<NaiveDate>,
    pub penalty: Money,
    pub interest: Money,
    pub principal: Money,
    /// installment fully settled after this payment
    pub settled: bool,
}

impl InstallmentAllocation {
    pub fn total(&self) -> Money {
        self.penalty + self.interest + self.principal
    }
}

/// result of splitting a payment, oldest obligation first
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub amount: Money,
    pub date: NaiveDate,
    pub parts: Vec<InstallmentAllocation>,
}

impl Allocation {
    pub fn breakdown(&self) -> PaymentBreakdown {
        PaymentBreakdown {
            principal: self.parts.iter().map(|p| p.principal).sum(),
            interest: self.parts.iter().map(|p| p.interest).sum(),
            penalty: self.parts.iter().map(|p| p.penalty).sum(),
            service_charge: Money::ZERO,
        }
    }

    pub fn total(&self) -> Money {
        self.parts.iter().map(|p| p.total()).sum()
    }

    pub fn settled_sequences(&self) -> Vec<u32> {
        self.parts.iter().filter(|p| p.settled).map(|p| p.sequence).collect()
    }

    pub fn partial_sequences(&self) -> Vec<u32> {
        self.parts.iter().filter(|p| !p.settled).map(|p| p.sequence).collect()
    }
}

/// exact amount that redeems a pawn ticket on a given date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedemptionQuote {
    pub as_of: NaiveDate,
    pub principal: Money,
    pub interest: Money,
    pub service_charge: Money,
    pub discount: Money,
    pub total: Money,
}

/// payment allocator: penalty, then interest, then principal, per
/// installment in sequence order
///
/// pure: it reads the installments and returns an `Allocation`; recording
/// the allocation is the ledger projector's job.
#[derive(Debug, Clone)]
pub struct PaymentAllocator {
    penalty: Option<PenaltyEngine>,
}

impl PaymentAllocator {
    pub fn new(penalty: Option<PenaltyEngine>) -> Self {
        Self { penalty }
    }

    /// allocator charging the penalty configured on `terms`, if any
    pub fn for_terms(terms: &LoanTerms, basis: PenaltyBasis) -> Self {
        Self::new(terms.penalty_config(basis).map(PenaltyEngine::new))
    }

    fn penalty_due(&self, installment: &Installment, as_of: NaiveDate) -> (Money, Option<NaiveDate>) {
        match &self.penalty {
            Some(engine) => {
                let assessment = engine.assess(installment, as_of);
                (assessment.additional, assessment.assessed_through)
            }
            None => (Money::ZERO, installment.penalty_assessed_through),
        }
    }

    /// everything still owed as of `as_of`, penalties included
    pub fn outstanding(&self, installments: &[Installment], as_of: NaiveDate) -> PaymentBreakdown {
        let mut breakdown = PaymentBreakdown::default();
        for inst in installments.iter().filter(|i| !i.is_settled()) {
            let (additional, _) = self.penalty_due(inst, as_of);
            breakdown.penalty += inst.penalty_outstanding() + additional;
            breakdown.interest += inst.interest_outstanding();
            breakdown.principal += inst.principal_outstanding();
        }
        breakdown
    }

    pub fn remaining_due(&self, installments: &[Installment], as_of: NaiveDate) -> Money {
        self.outstanding(installments, as_of).total()
    }

    /// split `amount` paid on `date` across the installments
    ///
    /// fails with `Overpayment` when the amount exceeds everything owed;
    /// the parts of a successful allocation always sum to `amount`.
    pub fn allocate(&self, installments: &[Installment], amount: Money, date: NaiveDate) -> Result<Allocation> {
        if !amount.is_positive() {
            return Err(LendingError::InvalidPaymentAmount {
                amount,
                reason: "payment amount must be positive".to_string(),
            });
        }

        let remaining_due = self.remaining_due(installments, date);
        if amount > remaining_due {
            let excess = amount - remaining_due;
            warn!(amount = %amount, due = %remaining_due, excess = %excess, "payment exceeds amount due");
            return Err(LendingError::Overpayment { excess });
        }

        let mut remaining = amount;
        let mut parts = Vec::new();

        for inst in installments.iter().filter(|i| !i.is_settled()) {
            if remaining.is_zero() {
                break;
            }

            let (assessed, assessed_through) = self.penalty_due(inst, date);
            let penalty_owed = inst.penalty_outstanding() + assessed;
            let interest_owed = inst.interest_outstanding();
            let principal_owed = inst.principal_outstanding();

            let penalty = remaining.min(penalty_owed);
            remaining -= penalty;
            let interest = remaining.min(interest_owed);
            remaining -= interest;
            let principal = remaining.min(principal_owed);
            remaining -= principal;

            let settled = penalty == penalty_owed && interest == interest_owed && principal == principal_owed;

            parts.push(InstallmentAllocation {
                sequence: inst.sequence,
                penalty_assessed: assessed,
                penalty_assessed_through: assessed_through,
                penalty,
                interest,
                principal,
                settled,
            });
        }

        let allocation = Allocation { amount, date, parts };
        if allocation.total() != amount {
            return Err(LendingError::CalculationError {
                message: format!("allocated {} of a {} payment", allocation.total(), amount),
            });
        }

        debug!(
            amount = %amount,
            installments = allocation.parts.len(),
            settled = ?allocation.settled_sequences(),
            "allocated payment"
        );

        Ok(allocation)
    }

    /// full-settlement split of a pawn redemption payment
    ///
    /// the amount must match the quote exactly. the discount comes off
    /// interest first, then the service charge.
    pub fn allocate_redemption(quote: &RedemptionQuote, amount: Money) -> Result<PaymentBreakdown> {
        if amount < quote.total {
            return Err(LendingError::IncompleteRedemption {
                required: quote.total,
                provided: amount,
            });
        }
        if amount > quote.total {
            let excess = amount - quote.total;
            warn!(amount = %amount, due = %quote.total, excess = %excess, "redemption payment exceeds quote");
            return Err(LendingError::Overpayment { excess });
        }

        let interest = quote.interest.saturating_sub(quote.discount);
        let left_over = quote.discount - (quote.interest - interest);
        let breakdown = PaymentBreakdown {
            principal: quote.principal,
            interest,
            penalty: Money::ZERO,
            service_charge: quote.service_charge.saturating_sub(left_over),
        };

        if breakdown.total() != amount {
            return Err(LendingError::CalculationError {
                message: format!("redemption split {} of a {} payment", breakdown.total(), amount),
            });
        }
        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::interest::PenaltyConfig;
    use crate::payments::AmortizationCalculator;
    use crate::types::InterestMethod;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    fn flat_schedule() -> Vec<Installment> {
        let terms = LoanTerms::monthly(Money::from_major(10_000), Rate::from_percentage(12), 12, InterestMethod::Flat);
        AmortizationCalculator::generate(&terms, date(2024, 1, 1)).unwrap().installments
    }

    #[test]
    fn test_interest_before_principal() {
        let allocator = PaymentAllocator::new(None);
        let schedule = flat_schedule();

        let allocation = allocator.allocate(&schedule, Money::from_major(500), date(2024, 2, 1)).unwrap();
        assert_eq!(allocation.parts.len(), 1);

        let part = &allocation.parts[0];
        assert_eq!(part.sequence, 1);
        assert_eq!(part.interest, money("100.00"));
        assert_eq!(part.principal, money("400.00"));
        assert!(!part.settled);
        assert_eq!(allocation.partial_sequences(), vec![1]);
    }

    #[test]
    fn test_payment_cascades_to_next_installment() {
        let allocator = PaymentAllocator::new(None);
        let schedule = flat_schedule();

        // one full installment (933.33) plus 100
        let allocation = allocator.allocate(&schedule, money("1033.33"), date(2024, 2, 1)).unwrap();
        assert_eq!(allocation.settled_sequences(), vec![1]);
        assert_eq!(allocation.parts[1].interest, money("100.00"));
        assert_eq!(allocation.parts[1].principal, Money::ZERO);
        assert_eq!(allocation.total(), money("1033.33"));
    }

    #[test]
    fn test_overpayment_rejected_without_side_effects() {
        let allocator = PaymentAllocator::new(None);
        let mut schedule = flat_schedule();
        // leave 500.00 due on the last installment only
        for inst in schedule.iter_mut() {
            inst.principal_paid = inst.principal_due;
            inst.interest_paid = inst.interest_due;
            inst.amount_paid = inst.total_due;
        }
        let last = schedule.last_mut().unwrap();
        last.principal_paid = last.principal_due - Money::from_major(500);
        last.amount_paid = last.principal_paid + last.interest_paid;

        let before = schedule.clone();
        let result = allocator.allocate(&schedule, Money::from_major(600), date(2024, 6, 1));

        assert_eq!(result, Err(LendingError::Overpayment { excess: Money::from_major(100) }));
        assert_eq!(schedule, before);

        let exact = allocator.allocate(&schedule, Money::from_major(500), date(2024, 6, 1)).unwrap();
        assert_eq!(exact.settled_sequences(), vec![12]);
    }

    #[test]
    fn test_penalty_paid_first() {
        let allocator = PaymentAllocator::new(Some(PenaltyEngine::new(PenaltyConfig::new(
            Rate::from_decimal(dec!(0.001)),
            0,
            PenaltyBasis::OutstandingPrincipal,
        ))));
        let schedule = flat_schedule();

        // first installment due 2024-02-01, paid 10 days late
        let allocation = allocator.allocate(&schedule, Money::from_major(100), date(2024, 2, 11)).unwrap();
        let part = &allocation.parts[0];

        // 833.33 * 0.001 * 10
        assert_eq!(part.penalty_assessed, money("8.33"));
        assert_eq!(part.penalty, money("8.33"));
        assert_eq!(part.interest, money("91.67"));
        assert_eq!(part.principal, Money::ZERO);
        assert_eq!(part.penalty_assessed_through, Some(date(2024, 2, 11)));
    }

    #[test]
    fn test_remaining_due_includes_unassessed_penalty() {
        let allocator = PaymentAllocator::new(Some(PenaltyEngine::new(PenaltyConfig::new(
            Rate::from_decimal(dec!(0.001)),
            0,
            PenaltyBasis::OutstandingPrincipal,
        ))));
        let schedule = flat_schedule();

        let on_time = allocator.remaining_due(&schedule, date(2024, 1, 15));
        assert_eq!(on_time, money("11200.00"));

        let late = allocator.outstanding(&schedule, date(2024, 2, 11));
        assert_eq!(late.penalty, money("8.33"));
        assert_eq!(late.total(), money("11208.33"));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let allocator = PaymentAllocator::new(None);
        assert!(matches!(
            allocator.allocate(&flat_schedule(), Money::ZERO, date(2024, 2, 1)),
            Err(LendingError::InvalidPaymentAmount { .. })
        ));
    }

    fn redemption(discount: &str) -> RedemptionQuote {
        let discount = money(discount);
        RedemptionQuote {
            as_of: date(2024, 2, 10),
            principal: Money::from_major(10_000),
            interest: money("300.00"),
            service_charge: money("20.00"),
            discount,
            total: money("10320.00") - discount,
        }
    }

    #[test]
    fn test_redemption_must_settle_exactly() {
        let quote = redemption("0");

        let breakdown = PaymentAllocator::allocate_redemption(&quote, money("10320.00")).unwrap();
        assert_eq!(breakdown.principal, Money::from_major(10_000));
        assert_eq!(breakdown.interest, money("300.00"));
        assert_eq!(breakdown.service_charge, money("20.00"));

        assert_eq!(
            PaymentAllocator::allocate_redemption(&quote, money("10300.00")),
            Err(LendingError::IncompleteRedemption {
                required: money("10320.00"),
                provided: money("10300.00"),
            })
        );
        assert_eq!(
            PaymentAllocator::allocate_redemption(&quote, money("10321.00")),
            Err(LendingError::Overpayment { excess: money("1.00") })
        );
    }

    #[test]
    fn test_redemption_discount_spills_into_service_charge() {
        let quote = redemption("310.00");

        let breakdown = PaymentAllocator::allocate_redemption(&quote, money("10010.00")).unwrap();
        assert_eq!(breakdown.interest, Money::ZERO);
        assert_eq!(breakdown.service_charge, money("10.00"));
        assert_eq!(breakdown.total(), quote.total);
    }
}
