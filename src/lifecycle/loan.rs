use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, LoanTerms, TermsOverride};
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::LedgerProjector;
use crate::payments::{
    AmortizationCalculator, LedgerEntry, OverpaymentHandler, Payment, PaymentAllocator, PaymentBreakdown,
    PaymentRequest, Reversal,
};
use crate::state::{ApprovalRecord, Loan, StatusChange};
use crate::types::{LoanStatus, PaymentId};

use super::Outcome;

/// amount that settles a loan on a given date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffQuote {
    pub as_of: NaiveDate,
    pub breakdown: PaymentBreakdown,
    pub total: Money,
    /// advance credit already held on the loan
    pub credit_balance: Money,
}

/// loan state machine
///
/// every operation takes the current snapshot and returns a new one with
/// its version bumped; the input is never touched, so a failed operation
/// has no side effects.
#[derive(Debug, Clone, Default)]
pub struct LoanLifecycle {
    config: EngineConfig,
}

impl LoanLifecycle {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// record an application; the loan starts `pending`
    pub fn apply(
        &self,
        loan_number: impl Into<String>,
        borrower_id: impl Into<String>,
        terms: LoanTerms,
        application_date: NaiveDate,
    ) -> Result<Outcome<Loan>> {
        terms.validate()?;

        let loan = Loan {
            id: Uuid::new_v4(),
            version: 1,
            loan_number: loan_number.into(),
            borrower_id: borrower_id.into(),
            requested_terms: terms.clone(),
            terms,
            status: LoanStatus::Pending,
            application_date,
            approval: None,
            release_date: None,
            installments: Vec::new(),
            ledger: Vec::new(),
            amount_paid: Money::ZERO,
            outstanding_balance: Money::ZERO,
            credit_balance: Money::ZERO,
            last_payment_date: None,
            next_payment_due_date: None,
            status_history: Vec::new(),
        };

        info!(loan_id = %loan.id, loan_number = %loan.loan_number, principal = %loan.terms.principal, "loan application received");

        let mut events = EventStore::new();
        events.emit(Event::LoanApplied {
            loan_id: loan.id,
            borrower_id: loan.borrower_id.clone(),
            principal: loan.terms.principal,
            date: application_date,
        });

        Ok(Outcome::new(loan, events))
    }

    /// `pending` -> `under_review`
    pub fn start_review(&self, loan: &Loan, reviewer: &str, date: NaiveDate) -> Result<Outcome<Loan>> {
        require(loan, &[LoanStatus::Pending], "review")?;

        let mut next = loan.clone();
        let mut events = EventStore::new();
        transition(&mut next, LoanStatus::UnderReview, date, Some(reviewer), "review started", &mut events);
        Ok(finish(next, events))
    }

    /// `pending`/`under_review` -> `approved`, optionally overriding terms
    pub fn approve(
        &self,
        loan: &Loan,
        approver: &str,
        overrides: TermsOverride,
        date: NaiveDate,
    ) -> Result<Outcome<Loan>> {
        require(loan, &[LoanStatus::Pending, LoanStatus::UnderReview], "approve")?;

        let terms = overrides.apply(&loan.requested_terms);
        terms.validate()?;

        let mut next = loan.clone();
        let mut events = EventStore::new();
        next.terms = terms;
        next.approval = Some(ApprovalRecord {
            approver: approver.to_string(),
            date,
            overrides,
        });

        events.emit(Event::LoanApproved {
            loan_id: next.id,
            approver: approver.to_string(),
            principal: next.terms.principal,
            date,
        });
        transition(&mut next, LoanStatus::Approved, date, Some(approver), "approved", &mut events);
        Ok(finish(next, events))
    }

    /// `pending`/`under_review` -> `rejected`
    pub fn reject(&self, loan: &Loan, actor: &str, reason: &str, date: NaiveDate) -> Result<Outcome<Loan>> {
        require(loan, &[LoanStatus::Pending, LoanStatus::UnderReview], "reject")?;

        let mut next = loan.clone();
        let mut events = EventStore::new();
        events.emit(Event::LoanRejected {
            loan_id: next.id,
            actor: actor.to_string(),
            reason: reason.to_string(),
            date,
        });
        transition(&mut next, LoanStatus::Rejected, date, Some(actor), reason, &mut events);
        Ok(finish(next, events))
    }

    /// any pre-disbursement status -> `cancelled`
    pub fn cancel(&self, loan: &Loan, actor: &str, reason: &str, date: NaiveDate) -> Result<Outcome<Loan>> {
        if !loan.status.is_pre_disbursement() {
            return Err(invalid(loan, "cancel"));
        }

        let mut next = loan.clone();
        let mut events = EventStore::new();
        transition(&mut next, LoanStatus::Cancelled, date, Some(actor), reason, &mut events);
        Ok(finish(next, events))
    }

    /// `approved` -> `disbursed` -> `active`, generating the schedule from
    /// the release date
    pub fn disburse(&self, loan: &Loan, release_date: NaiveDate) -> Result<Outcome<Loan>> {
        require(loan, &[LoanStatus::Approved], "disburse")?;

        let schedule = AmortizationCalculator::generate(&loan.terms, release_date)?;

        let first_due_date = schedule.first_due_date();
        let mut next = loan.clone();
        let mut events = EventStore::new();
        next.release_date = Some(release_date);
        next.installments = schedule.installments;

        events.emit(Event::LoanDisbursed {
            loan_id: next.id,
            amount: next.terms.principal,
            release_date,
            installment_count: next.installments.len() as u32,
            first_due_date,
        });
        transition(&mut next, LoanStatus::Disbursed, release_date, None, "funds released", &mut events);
        transition(&mut next, LoanStatus::Active, release_date, None, "schedule generated", &mut events);

        LedgerProjector::project(&mut next);
        Ok(finish(next, events))
    }

    /// allocate a payment and re-evaluate the status
    ///
    /// fails with `Overpayment` when the amount exceeds everything owed;
    /// see `apply_payment_resolving_overpayment` for the configured policy.
    pub fn apply_payment(&self, loan: &Loan, request: &PaymentRequest) -> Result<Outcome<Loan>> {
        let (next, events, _) = self.post_payment(loan, request, request.amount)?;
        Ok(finish(next, events))
    }

    /// like `apply_payment`, but any excess is booked per the configured
    /// `OverpaymentStrategy`
    pub fn apply_payment_resolving_overpayment(
        &self,
        loan: &Loan,
        request: &PaymentRequest,
    ) -> Result<Outcome<Loan>> {
        require_servicing(loan, "apply a payment to")?;
        request.validate()?;

        let due = self.allocator(loan).remaining_due(&loan.installments, request.date);
        if request.amount <= due {
            return self.apply_payment(loan, request);
        }

        let excess = request.amount - due;
        let handler = OverpaymentHandler::new(self.config.overpayment_strategy);
        let (mut next, mut events, payment_id) = self.post_payment(loan, request, due)?;
        let adjustment = handler.resolve(excess, payment_id, request.date)?;

        next.ledger.push(LedgerEntry::Adjustment(adjustment));
        LedgerProjector::project(&mut next);

        events.emit(Event::OverpaymentReceived {
            loan_id: next.id,
            payment_id,
            excess,
            strategy: handler.strategy(),
            date: request.date,
        });
        Ok(finish(next, events))
    }

    fn post_payment(
        &self,
        loan: &Loan,
        request: &PaymentRequest,
        amount: Money,
    ) -> Result<(Loan, EventStore, PaymentId)> {
        require_servicing(loan, "apply a payment to")?;
        request.validate()?;

        let allocation = self.allocator(loan).allocate(&loan.installments, amount, request.date)?;

        let mut next = loan.clone();
        let mut events = EventStore::new();
        LedgerProjector::apply_allocation(&mut next.installments, &allocation)?;

        for part in allocation.parts.iter().filter(|p| p.penalty_assessed.is_positive()) {
            events.emit(Event::PenaltyAssessed {
                loan_id: next.id,
                sequence: part.sequence,
                amount: part.penalty_assessed,
                date: request.date,
            });
        }

        let payment = Payment::from_allocation(request, &allocation);
        let payment_id = payment.id;
        events.emit(Event::PaymentReceived {
            loan_id: next.id,
            payment_id,
            amount: payment.amount,
            applied_to_penalty: payment.breakdown.penalty,
            applied_to_interest: payment.breakdown.interest,
            applied_to_principal: payment.breakdown.principal,
            date: request.date,
        });
        info!(
            loan_id = %next.id,
            payment_id = %payment_id,
            amount = %payment.amount,
            settled = ?allocation.settled_sequences(),
            "payment applied"
        );

        next.ledger.push(LedgerEntry::Payment(payment));
        LedgerProjector::project(&mut next);
        settle_status(&mut next, request.date, &mut events);

        Ok((next, events, payment_id))
    }

    /// toggle `active`/`overdue` against the earliest unpaid installment
    ///
    /// loans outside servicing come back unchanged.
    pub fn refresh_status(&self, loan: &Loan, as_of: NaiveDate) -> Result<Outcome<Loan>> {
        if !loan.status.is_servicing() {
            return Ok(Outcome::unchanged(loan.clone()));
        }

        let mut next = loan.clone();
        let mut events = EventStore::new();
        settle_status(&mut next, as_of, &mut events);

        if next == *loan {
            return Ok(Outcome::unchanged(next));
        }
        Ok(finish(next, events))
    }

    /// `refresh_status` at the provider's current date
    pub fn refresh_status_now(&self, loan: &Loan, time: &SafeTimeProvider) -> Result<Outcome<Loan>> {
        self.refresh_status(loan, time.now().date_naive())
    }

    /// administrative `active`/`overdue` -> `defaulted`
    pub fn mark_defaulted(&self, loan: &Loan, actor: &str, reason: &str, date: NaiveDate) -> Result<Outcome<Loan>> {
        require(loan, &[LoanStatus::Active, LoanStatus::Overdue], "default")?;

        let mut next = loan.clone();
        let mut events = EventStore::new();
        events.emit(Event::LoanDefaulted {
            loan_id: next.id,
            outstanding_balance: next.outstanding_balance,
            actor: actor.to_string(),
            date,
        });
        transition(&mut next, LoanStatus::Defaulted, date, Some(actor), reason, &mut events);
        Ok(finish(next, events))
    }

    /// append a reversal and rebuild the installments from the ledger
    pub fn reverse_payment(
        &self,
        loan: &Loan,
        payment_id: PaymentId,
        reason: &str,
        date: NaiveDate,
    ) -> Result<Outcome<Loan>> {
        require_servicing(loan, "reverse a payment on")?;

        let payment = loan
            .find_payment(payment_id)
            .ok_or(LendingError::PaymentNotFound { id: payment_id })?;
        if loan.is_reversed(payment_id) {
            return Err(LendingError::InvalidPaymentAmount {
                amount: payment.amount,
                reason: format!("payment {} is already reversed", payment_id),
            });
        }
        let release_date = loan.release_date.ok_or_else(|| LendingError::CalculationError {
            message: "servicing loan has no release date".to_string(),
        })?;

        let mut next = loan.clone();
        let mut events = EventStore::new();
        next.ledger.push(LedgerEntry::Reversal(Reversal {
            id: Uuid::new_v4(),
            reverses: payment_id,
            amount: payment.amount,
            date,
            reason: reason.to_string(),
        }));

        next.installments = LedgerProjector::replay(&next.terms, release_date, &next.ledger, &self.allocator(loan))?;
        LedgerProjector::project(&mut next);

        events.emit(Event::PaymentReversed {
            loan_id: next.id,
            payment_id,
            amount: payment.amount,
            reason: reason.to_string(),
            date,
        });
        warn!(loan_id = %next.id, payment_id = %payment_id, amount = %payment.amount, reason, "payment reversed");

        settle_status(&mut next, date, &mut events);
        Ok(finish(next, events))
    }

    /// exact amount that settles every installment on `as_of`
    pub fn payoff_quote(&self, loan: &Loan, as_of: NaiveDate) -> Result<PayoffQuote> {
        require_servicing(loan, "quote a payoff for")?;

        let breakdown = self.allocator(loan).outstanding(&loan.installments, as_of);
        Ok(PayoffQuote {
            as_of,
            total: breakdown.total(),
            breakdown,
            credit_balance: loan.credit_balance,
        })
    }

    fn allocator(&self, loan: &Loan) -> PaymentAllocator {
        PaymentAllocator::for_terms(&loan.terms, self.config.penalty_basis)
    }
}

fn invalid(loan: &Loan, operation: &str) -> LendingError {
    LendingError::InvalidLoanTransition {
        status: loan.status,
        operation: operation.to_string(),
    }
}

fn require(loan: &Loan, allowed: &[LoanStatus], operation: &str) -> Result<()> {
    if allowed.contains(&loan.status) {
        Ok(())
    } else {
        Err(invalid(loan, operation))
    }
}

fn require_servicing(loan: &Loan, operation: &str) -> Result<()> {
    if loan.status.is_servicing() {
        Ok(())
    } else {
        Err(invalid(loan, operation))
    }
}

fn finish(mut loan: Loan, events: EventStore) -> Outcome<Loan> {
    loan.version += 1;
    Outcome::new(loan, events)
}

fn transition(
    loan: &mut Loan,
    to: LoanStatus,
    date: NaiveDate,
    actor: Option<&str>,
    reason: &str,
    events: &mut EventStore,
) {
    let from = loan.status;
    if from == to {
        return;
    }

    info!(loan_id = %loan.id, from = %from, to = %to, reason, "loan status changed");

    loan.status = to;
    loan.status_history.push(StatusChange {
        from,
        to,
        date,
        actor: actor.map(str::to_string),
        reason: Some(reason.to_string()),
    });
    events.emit(Event::LoanStatusChanged {
        loan_id: loan.id,
        old_status: from,
        new_status: to,
        reason: reason.to_string(),
        date,
    });
}

/// paid once every installment is settled, otherwise overdue while the
/// earliest unpaid installment is past due
fn settle_status(loan: &mut Loan, as_of: NaiveDate, events: &mut EventStore) {
    LedgerProjector::refresh_statuses(&mut loan.installments, as_of);

    match loan.earliest_unpaid().map(|i| i.due_date) {
        None => {
            if !loan.installments.is_empty() {
                events.emit(Event::LoanPaidOff {
                    loan_id: loan.id,
                    total_paid: loan.amount_paid,
                    date: as_of,
                });
                transition(loan, LoanStatus::Paid, as_of, None, "final installment settled", events);
            }
        }
        Some(due) if due < as_of => {
            transition(loan, LoanStatus::Overdue, as_of, None, "installment past due", events);
        }
        Some(_) => {
            transition(loan, LoanStatus::Active, as_of, None, "installments current", events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::decimal::Rate;
    use crate::payments::AdjustmentKind;
    use crate::types::{InstallmentStatus, InterestMethod, OverpaymentStrategy};
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    fn flat_terms() -> LoanTerms {
        LoanTerms::monthly(Money::from_major(10_000), Rate::from_percentage(12), 12, InterestMethod::Flat)
    }

    fn active_loan(lifecycle: &LoanLifecycle, terms: LoanTerms) -> Loan {
        let loan = lifecycle.apply("LN-0001", "borrower-1", terms, date(2023, 12, 20)).unwrap().snapshot;
        let loan = lifecycle
            .approve(&loan, "officer", TermsOverride::default(), date(2023, 12, 28))
            .unwrap()
            .snapshot;
        lifecycle.disburse(&loan, date(2024, 1, 1)).unwrap().snapshot
    }

    fn pay(lifecycle: &LoanLifecycle, loan: &Loan, amount: &str, on: NaiveDate) -> Loan {
        lifecycle
            .apply_payment(loan, &PaymentRequest::cash(money(amount), on))
            .unwrap()
            .snapshot
    }

    #[test]
    fn test_application_to_active() {
        let lifecycle = LoanLifecycle::default();
        let applied = lifecycle.apply("LN-0001", "borrower-1", flat_terms(), date(2023, 12, 20)).unwrap();
        assert_eq!(applied.snapshot.status, LoanStatus::Pending);
        assert_eq!(applied.snapshot.version, 1);
        assert!(matches!(applied.events[0], Event::LoanApplied { .. }));

        let reviewed = lifecycle.start_review(&applied.snapshot, "analyst", date(2023, 12, 21)).unwrap();
        assert_eq!(reviewed.snapshot.status, LoanStatus::UnderReview);

        let overrides = TermsOverride {
            principal: Some(Money::from_major(8_000)),
            annual_rate: None,
            term_length: Some(6),
        };
        let approved = lifecycle
            .approve(&reviewed.snapshot, "manager", overrides, date(2023, 12, 28))
            .unwrap()
            .snapshot;
        assert_eq!(approved.status, LoanStatus::Approved);
        assert_eq!(approved.terms.principal, Money::from_major(8_000));
        assert_eq!(approved.requested_terms.principal, Money::from_major(10_000));
        assert_eq!(approved.approval.as_ref().map(|a| a.approver.as_str()), Some("manager"));
        assert!(approved.installments.is_empty());

        let disbursed = lifecycle.disburse(&approved, date(2024, 1, 1)).unwrap();
        let loan = &disbursed.snapshot;
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.installments.len(), 6);
        assert_eq!(loan.next_payment_due_date, Some(date(2024, 2, 1)));
        assert_eq!(loan.outstanding_balance, money("8480.00"));
        assert_eq!(loan.version, 4);

        let path: Vec<LoanStatus> = loan.status_history.iter().map(|c| c.to).collect();
        assert_eq!(
            path,
            vec![LoanStatus::UnderReview, LoanStatus::Approved, LoanStatus::Disbursed, LoanStatus::Active]
        );
    }

    #[test]
    fn test_override_is_revalidated() {
        let lifecycle = LoanLifecycle::default();
        let loan = lifecycle.apply("LN-0001", "borrower-1", flat_terms(), date(2023, 12, 20)).unwrap().snapshot;

        let overrides = TermsOverride {
            principal: Some(Money::ZERO),
            ..TermsOverride::default()
        };
        assert!(matches!(
            lifecycle.approve(&loan, "manager", overrides, date(2023, 12, 28)),
            Err(LendingError::InvalidTerms { .. })
        ));
    }

    #[test]
    fn test_full_repayment_marks_paid() {
        let lifecycle = LoanLifecycle::default();
        let mut loan = active_loan(&lifecycle, flat_terms());

        for inst in loan.installments.clone().iter().take(11) {
            loan = pay(&lifecycle, &loan, "933.33", inst.due_date);
            assert_eq!(loan.status, LoanStatus::Active);
        }
        loan = pay(&lifecycle, &loan, "933.37", date(2025, 1, 1));

        assert_eq!(loan.status, LoanStatus::Paid);
        assert_eq!(loan.amount_paid, money("11200.00"));
        assert_eq!(loan.outstanding_balance, Money::ZERO);
        assert_eq!(loan.next_payment_due_date, None);
        assert!(loan.installments.iter().all(|i| i.status == InstallmentStatus::Paid));

        // terminal: nothing moves it again
        let err = lifecycle
            .apply_payment(&loan, &PaymentRequest::cash(Money::from_major(1), date(2025, 1, 2)))
            .unwrap_err();
        assert_eq!(
            err,
            LendingError::InvalidLoanTransition {
                status: LoanStatus::Paid,
                operation: "apply a payment to".to_string(),
            }
        );
        assert!(lifecycle.mark_defaulted(&loan, "admin", "test", date(2025, 2, 1)).is_err());
        assert!(lifecycle.cancel(&loan, "admin", "test", date(2025, 2, 1)).is_err());
        assert_eq!(lifecycle.refresh_status(&loan, date(2026, 1, 1)).unwrap().snapshot, loan);
    }

    #[test]
    fn test_overdue_toggles_back_to_active() {
        let lifecycle = LoanLifecycle::default();
        let loan = active_loan(&lifecycle, flat_terms());

        let overdue = lifecycle.refresh_status(&loan, date(2024, 2, 5)).unwrap();
        assert_eq!(overdue.snapshot.status, LoanStatus::Overdue);
        assert_eq!(overdue.snapshot.version, loan.version + 1);
        assert!(overdue
            .events
            .iter()
            .any(|e| matches!(e, Event::LoanStatusChanged { new_status: LoanStatus::Overdue, .. })));

        // refreshing again changes nothing
        let again = lifecycle.refresh_status(&overdue.snapshot, date(2024, 2, 6)).unwrap();
        assert_eq!(again.snapshot.version, overdue.snapshot.version);
        assert!(again.events.is_empty());

        let current = pay(&lifecycle, &overdue.snapshot, "933.33", date(2024, 2, 10));
        assert_eq!(current.status, LoanStatus::Active);
    }

    #[test]
    fn test_partial_payment_leaves_loan_overdue() {
        let lifecycle = LoanLifecycle::default();
        let loan = active_loan(&lifecycle, flat_terms());

        let loan = pay(&lifecycle, &loan, "500.00", date(2024, 2, 10));
        assert_eq!(loan.status, LoanStatus::Overdue);
        assert_eq!(loan.installments[0].status, InstallmentStatus::Overdue);
        assert_eq!(loan.installments[0].interest_paid, money("100.00"));
        assert_eq!(loan.installments[0].principal_paid, money("400.00"));
    }

    #[test]
    fn test_penalty_recorded_when_payment_reaches_installment() {
        let lifecycle = LoanLifecycle::default();
        let terms = flat_terms().with_penalty(Rate::from_decimal(dec!(0.001)), 3);
        let loan = active_loan(&lifecycle, terms);

        // due 2024-02-01, grace to 2024-02-04, paid 2024-02-14: 10 days on 833.33
        let outcome = lifecycle
            .apply_payment(&loan, &PaymentRequest::cash(money("941.66"), date(2024, 2, 14)))
            .unwrap();
        let loan = outcome.snapshot;

        assert_eq!(loan.installments[0].penalty_accrued, money("8.33"));
        assert_eq!(loan.installments[0].penalty_paid, money("8.33"));
        assert_eq!(loan.installments[0].status, InstallmentStatus::Paid);
        assert_eq!(loan.status, LoanStatus::Active);
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, Event::PenaltyAssessed { sequence: 1, .. })));

        // the second installment was not reached and carries no penalty
        assert_eq!(loan.installments[1].penalty_accrued, Money::ZERO);
    }

    #[test]
    fn test_overpayment_policies() {
        let loan = active_loan(&LoanLifecycle::default(), flat_terms());
        let too_much = PaymentRequest::cash(money("11300.00"), date(2024, 1, 15));

        let rejecting = LoanLifecycle::default();
        assert_eq!(
            rejecting.apply_payment(&loan, &too_much).unwrap_err(),
            LendingError::Overpayment { excess: Money::from_major(100) }
        );
        assert_eq!(
            rejecting.apply_payment_resolving_overpayment(&loan, &too_much).unwrap_err(),
            LendingError::Overpayment { excess: Money::from_major(100) }
        );

        let holding = LoanLifecycle::new(EngineConfig {
            overpayment_strategy: OverpaymentStrategy::HoldAsCredit,
            ..EngineConfig::default()
        });
        let outcome = holding.apply_payment_resolving_overpayment(&loan, &too_much).unwrap();
        assert_eq!(outcome.snapshot.status, LoanStatus::Paid);
        assert_eq!(outcome.snapshot.amount_paid, money("11200.00"));
        assert_eq!(outcome.snapshot.credit_balance, Money::from_major(100));
        assert_eq!(outcome.snapshot.version, loan.version + 1);

        let refunding = LoanLifecycle::new(EngineConfig {
            overpayment_strategy: OverpaymentStrategy::Refund,
            ..EngineConfig::default()
        });
        let refunded = refunding.apply_payment_resolving_overpayment(&loan, &too_much).unwrap().snapshot;
        assert_eq!(refunded.credit_balance, Money::ZERO);
        assert!(refunded
            .ledger
            .iter()
            .any(|e| matches!(e, LedgerEntry::Adjustment(a) if a.kind == AdjustmentKind::Refund)));
    }

    #[test]
    fn test_reversal_rebuilds_schedule() {
        let lifecycle = LoanLifecycle::default();
        let loan = active_loan(&lifecycle, flat_terms());
        let loan = pay(&lifecycle, &loan, "933.33", date(2024, 2, 1));
        let bounced = match &loan.ledger[0] {
            LedgerEntry::Payment(p) => p.id,
            other => panic!("unexpected entry {:?}", other),
        };
        let loan = pay(&lifecycle, &loan, "933.33", date(2024, 3, 1));

        let reversed = lifecycle.reverse_payment(&loan, bounced, "check bounced", date(2024, 3, 5)).unwrap().snapshot;

        assert_eq!(reversed.amount_paid, money("933.33"));
        assert_eq!(reversed.installments[0].status, InstallmentStatus::Paid);
        assert_eq!(reversed.installments[1].amount_paid, Money::ZERO);
        assert_eq!(reversed.status, LoanStatus::Overdue);
        assert_eq!(reversed.ledger.len(), 3);

        assert!(matches!(
            lifecycle.reverse_payment(&reversed, bounced, "again", date(2024, 3, 6)),
            Err(LendingError::InvalidPaymentAmount { .. })
        ));
        assert!(matches!(
            lifecycle.reverse_payment(&reversed, Uuid::new_v4(), "unknown", date(2024, 3, 6)),
            Err(LendingError::PaymentNotFound { .. })
        ));
    }

    #[test]
    fn test_terminal_pre_disbursement_states() {
        let lifecycle = LoanLifecycle::default();
        let loan = lifecycle.apply("LN-0001", "borrower-1", flat_terms(), date(2023, 12, 20)).unwrap().snapshot;

        let rejected = lifecycle.reject(&loan, "manager", "insufficient income", date(2023, 12, 22)).unwrap().snapshot;
        assert_eq!(rejected.status, LoanStatus::Rejected);
        assert!(lifecycle.approve(&rejected, "manager", TermsOverride::default(), date(2023, 12, 23)).is_err());
        assert!(lifecycle.cancel(&rejected, "borrower", "changed mind", date(2023, 12, 23)).is_err());

        let approved = lifecycle
            .approve(&loan, "manager", TermsOverride::default(), date(2023, 12, 22))
            .unwrap()
            .snapshot;
        let cancelled = lifecycle.cancel(&approved, "borrower", "changed mind", date(2023, 12, 23)).unwrap().snapshot;
        assert_eq!(cancelled.status, LoanStatus::Cancelled);
        assert!(lifecycle.disburse(&cancelled, date(2024, 1, 1)).is_err());

        // disbursed loans can no longer be cancelled
        let active = lifecycle.disburse(&approved, date(2024, 1, 1)).unwrap().snapshot;
        assert!(matches!(
            lifecycle.cancel(&active, "borrower", "too late", date(2024, 1, 2)),
            Err(LendingError::InvalidLoanTransition { .. })
        ));
    }

    #[test]
    fn test_default_is_administrative() {
        let lifecycle = LoanLifecycle::default();
        let loan = active_loan(&lifecycle, flat_terms());
        let overdue = lifecycle.refresh_status(&loan, date(2024, 5, 1)).unwrap().snapshot;

        let defaulted = lifecycle.mark_defaulted(&overdue, "collections", "90 days past due", date(2024, 5, 1)).unwrap();
        assert_eq!(defaulted.snapshot.status, LoanStatus::Defaulted);
        assert!(matches!(defaulted.events[0], Event::LoanDefaulted { .. }));

        let last = defaulted.snapshot.status_history.last().unwrap();
        assert_eq!(last.actor.as_deref(), Some("collections"));
        assert!(lifecycle
            .apply_payment(&defaulted.snapshot, &PaymentRequest::cash(Money::from_major(100), date(2024, 5, 2)))
            .is_err());
    }

    #[test]
    fn test_payoff_quote() {
        let lifecycle = LoanLifecycle::default();
        let terms = flat_terms().with_penalty(Rate::from_decimal(dec!(0.001)), 0);
        let loan = active_loan(&lifecycle, terms);
        let loan = pay(&lifecycle, &loan, "933.33", date(2024, 2, 1));

        let quote = lifecycle.payoff_quote(&loan, date(2024, 3, 11)).unwrap();
        // second installment 10 days late on 833.33
        assert_eq!(quote.breakdown.penalty, money("8.33"));
        assert_eq!(quote.total, money("10275.00"));

        let settled = lifecycle
            .apply_payment(&loan, &PaymentRequest::cash(quote.total, date(2024, 3, 11)))
            .unwrap()
            .snapshot;
        assert_eq!(settled.status, LoanStatus::Paid);
    }

    #[test]
    fn test_refresh_with_time_provider() {
        let lifecycle = LoanLifecycle::default();
        let loan = active_loan(&lifecycle, flat_terms());
        let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap()));

        let current = lifecycle.refresh_status_now(&loan, &time).unwrap();
        assert_eq!(current.snapshot.status, LoanStatus::Active);

        let control = time.test_control().unwrap();
        control.advance(chrono::Duration::days(14));
        let late = lifecycle.refresh_status_now(&loan, &time).unwrap();
        assert_eq!(late.snapshot.status, LoanStatus::Overdue);
    }
}
