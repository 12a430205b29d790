//! Ledger projection: aggregate loan fields are always derived from the
//! installments and the append-only ledger, never edited in place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LoanTerms;
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::payments::{AdjustmentKind, AmortizationCalculator, Allocation, LedgerEntry, PaymentAllocator};
use crate::state::{Installment, Loan};
use crate::types::PaymentId;

/// aggregate figures of a loan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub amount_paid: Money,
    pub outstanding_balance: Money,
    pub credit_balance: Money,
    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_due_date: Option<NaiveDate>,
}

pub struct LedgerProjector;

impl LedgerProjector {
    /// record an allocation on the installments it touched
    pub fn apply_allocation(installments: &mut [Installment], allocation: &Allocation) -> Result<()> {
        for part in &allocation.parts {
            let inst = installments
                .iter_mut()
                .find(|i| i.sequence == part.sequence)
                .ok_or_else(|| LendingError::CalculationError {
                    message: format!("allocation names unknown installment {}", part.sequence),
                })?;

            inst.penalty_accrued += part.penalty_assessed;
            if part.penalty_assessed_through.is_some() {
                inst.penalty_assessed_through = part.penalty_assessed_through;
            }
            inst.penalty_paid += part.penalty;
            inst.interest_paid += part.interest;
            inst.principal_paid += part.principal;
            inst.amount_paid += part.interest + part.principal;
            inst.last_payment_date = Some(allocation.date);
            inst.status = inst.status_as_of(allocation.date);
        }
        Ok(())
    }

    /// re-derive every installment status as of `as_of`
    pub fn refresh_statuses(installments: &mut [Installment], as_of: NaiveDate) {
        for inst in installments.iter_mut() {
            inst.status = inst.status_as_of(as_of);
        }
    }

    /// summarize a loan from its installments and ledger
    pub fn summarize(installments: &[Installment], ledger: &[LedgerEntry]) -> LoanSummary {
        let reversed: Vec<PaymentId> = ledger
            .iter()
            .filter_map(|entry| match entry {
                LedgerEntry::Reversal(r) => Some(r.reverses),
                _ => None,
            })
            .collect();

        let mut amount_paid = Money::ZERO;
        let mut credit_balance = Money::ZERO;
        let mut last_payment_date: Option<NaiveDate> = None;

        for entry in ledger {
            match entry {
                LedgerEntry::Payment(p) if !reversed.contains(&p.id) => {
                    amount_paid += p.amount;
                    last_payment_date = last_payment_date.max(Some(p.date));
                }
                LedgerEntry::Adjustment(a) if a.kind == AdjustmentKind::AdvanceCredit => {
                    let voided = a.payment_id.map_or(false, |id| reversed.contains(&id));
                    if !voided {
                        credit_balance += a.amount;
                    }
                }
                _ => {}
            }
        }

        let owed: Money = installments.iter().map(|i| i.total_due + i.penalty_accrued).sum();
        let paid: Money = installments.iter().map(|i| i.amount_paid + i.penalty_paid).sum();

        LoanSummary {
            amount_paid,
            outstanding_balance: owed - paid,
            credit_balance,
            last_payment_date,
            next_payment_due_date: installments.iter().find(|i| !i.is_settled()).map(|i| i.due_date),
        }
    }

    /// write the summary into the loan's aggregate fields
    pub fn project(loan: &mut Loan) {
        let summary = Self::summarize(&loan.installments, &loan.ledger);
        loan.amount_paid = summary.amount_paid;
        loan.outstanding_balance = summary.outstanding_balance;
        loan.credit_balance = summary.credit_balance;
        loan.last_payment_date = summary.last_payment_date;
        loan.next_payment_due_date = summary.next_payment_due_date;
    }

    /// rebuild the installments from the terms and the surviving payments
    ///
    /// payments are re-allocated in ledger order at their own dates, so a
    /// reversal shifts later payments onto the installments it vacated.
    pub fn replay(
        terms: &LoanTerms,
        release_date: NaiveDate,
        ledger: &[LedgerEntry],
        allocator: &PaymentAllocator,
    ) -> Result<Vec<Installment>> {
        let mut installments = AmortizationCalculator::generate(terms, release_date)?.installments;

        let reversed: Vec<PaymentId> = ledger
            .iter()
            .filter_map(|entry| match entry {
                LedgerEntry::Reversal(r) => Some(r.reverses),
                _ => None,
            })
            .collect();

        let mut replayed = 0usize;
        for entry in ledger {
            if let LedgerEntry::Payment(payment) = entry {
                if reversed.contains(&payment.id) {
                    continue;
                }
                let allocation = allocator.allocate(&installments, payment.amount, payment.date)?;
                Self::apply_allocation(&mut installments, &allocation)?;
                replayed += 1;
            }
        }

        debug!(payments = replayed, reversed = reversed.len(), "replayed ledger");
        Ok(installments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::payments::{Payment, PaymentRequest, Reversal};
    use crate::types::{InstallmentStatus, InterestMethod};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    fn terms() -> LoanTerms {
        LoanTerms::monthly(Money::from_major(10_000), Rate::from_percentage(12), 12, InterestMethod::Flat)
    }

    fn pay(
        installments: &mut [Installment],
        ledger: &mut Vec<LedgerEntry>,
        amount: Money,
        on: NaiveDate,
    ) -> PaymentId {
        let allocator = PaymentAllocator::new(None);
        let request = PaymentRequest::cash(amount, on);
        let allocation = allocator.allocate(installments, amount, on).unwrap();
        LedgerProjector::apply_allocation(installments, &allocation).unwrap();
        let payment = Payment::from_allocation(&request, &allocation);
        let id = payment.id;
        ledger.push(LedgerEntry::Payment(payment));
        id
    }

    #[test]
    fn test_apply_and_summarize() {
        let mut installments = AmortizationCalculator::generate(&terms(), date(2024, 1, 1)).unwrap().installments;
        let mut ledger = Vec::new();

        pay(&mut installments, &mut ledger, money("933.33"), date(2024, 2, 1));
        pay(&mut installments, &mut ledger, Money::from_major(100), date(2024, 2, 20));

        assert_eq!(installments[0].status, InstallmentStatus::Paid);
        assert_eq!(installments[1].status, InstallmentStatus::Partial);
        assert_eq!(installments[1].interest_paid, money("100.00"));

        let summary = LedgerProjector::summarize(&installments, &ledger);
        assert_eq!(summary.amount_paid, money("1033.33"));
        assert_eq!(summary.outstanding_balance, money("10166.67"));
        assert_eq!(summary.last_payment_date, Some(date(2024, 2, 20)));
        assert_eq!(summary.next_payment_due_date, Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_replay_skips_reversed_payments() {
        let mut installments = AmortizationCalculator::generate(&terms(), date(2024, 1, 1)).unwrap().installments;
        let mut ledger = Vec::new();

        let first = pay(&mut installments, &mut ledger, money("933.33"), date(2024, 2, 1));
        pay(&mut installments, &mut ledger, money("500.00"), date(2024, 3, 1));

        ledger.push(LedgerEntry::Reversal(Reversal {
            id: Uuid::new_v4(),
            reverses: first,
            amount: money("933.33"),
            date: date(2024, 3, 5),
            reason: "bounced check".to_string(),
        }));

        let rebuilt = LedgerProjector::replay(&terms(), date(2024, 1, 1), &ledger, &PaymentAllocator::new(None)).unwrap();

        // the surviving 500 now lands on the first installment
        assert_eq!(rebuilt[0].interest_paid, money("100.00"));
        assert_eq!(rebuilt[0].principal_paid, money("400.00"));
        assert_eq!(rebuilt[1].amount_paid, Money::ZERO);

        let summary = LedgerProjector::summarize(&rebuilt, &ledger);
        assert_eq!(summary.amount_paid, money("500.00"));
        assert_eq!(summary.outstanding_balance, money("10700.00"));
    }

    #[test]
    fn test_refresh_marks_overdue() {
        let mut installments = AmortizationCalculator::generate(&terms(), date(2024, 1, 1)).unwrap().installments;
        LedgerProjector::refresh_statuses(&mut installments, date(2024, 3, 2));

        assert_eq!(installments[0].status, InstallmentStatus::Overdue);
        assert_eq!(installments[1].status, InstallmentStatus::Overdue);
        assert_eq!(installments[2].status, InstallmentStatus::Pending);
    }
}
