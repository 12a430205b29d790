use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::collateral::{AuctionSale, Collateral};
use crate::config::{LoanTerms, PawnTerms, TermsOverride};
use crate::decimal::Money;
use crate::payments::{LedgerEntry, Payment};
use crate::types::{InstallmentStatus, LoanId, LoanStatus, PaymentId, TicketId, TicketStatus};

/// one scheduled payment of a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based, unique and ordered within a loan
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub principal_due: Money,
    pub interest_due: Money,
    /// principal + interest; penalties are tracked separately
    pub total_due: Money,
    pub principal_paid: Money,
    pub interest_paid: Money,
    /// principal + interest paid, never above `total_due`
    pub amount_paid: Money,
    pub penalty_accrued: Money,
    pub penalty_paid: Money,
    /// date through which `penalty_accrued` has been assessed
    pub penalty_assessed_through: Option<NaiveDate>,
    pub status: InstallmentStatus,
    pub last_payment_date: Option<NaiveDate>,
}

impl Installment {
    pub fn new(sequence: u32, due_date: NaiveDate, principal_due: Money, interest_due: Money) -> Self {
        Self {
            sequence,
            due_date,
            principal_due,
            interest_due,
            total_due: principal_due + interest_due,
            principal_paid: Money::ZERO,
            interest_paid: Money::ZERO,
            amount_paid: Money::ZERO,
            penalty_accrued: Money::ZERO,
            penalty_paid: Money::ZERO,
            penalty_assessed_through: None,
            status: InstallmentStatus::Pending,
            last_payment_date: None,
        }
    }

    pub fn principal_outstanding(&self) -> Money {
        self.principal_due.saturating_sub(self.principal_paid)
    }

    pub fn interest_outstanding(&self) -> Money {
        self.interest_due.saturating_sub(self.interest_paid)
    }

    /// unpaid principal + interest
    pub fn outstanding(&self) -> Money {
        self.total_due.saturating_sub(self.amount_paid)
    }

    /// recorded penalty not yet paid
    pub fn penalty_outstanding(&self) -> Money {
        self.penalty_accrued.saturating_sub(self.penalty_paid)
    }

    pub fn is_settled(&self) -> bool {
        self.outstanding().is_zero() && self.penalty_outstanding().is_zero()
    }

    /// status implied by the paid amounts and the given date
    pub fn status_as_of(&self, as_of: NaiveDate) -> InstallmentStatus {
        if self.is_settled() {
            InstallmentStatus::Paid
        } else if self.due_date < as_of {
            InstallmentStatus::Overdue
        } else if self.amount_paid.is_positive() || self.penalty_paid.is_positive() {
            InstallmentStatus::Partial
        } else {
            InstallmentStatus::Pending
        }
    }
}

/// a recorded status transition, kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    pub from: S,
    pub to: S,
    pub date: NaiveDate,
    pub actor: Option<String>,
    pub reason: Option<String>,
}

/// approval decision recorded on a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approver: String,
    pub date: NaiveDate,
    pub overrides: TermsOverride,
}

/// loan aggregate: owns its installments and its ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    /// optimistic concurrency version, bumped on every successful operation
    pub version: u64,
    pub loan_number: String,
    pub borrower_id: String,
    pub requested_terms: LoanTerms,
    /// terms in force after approval overrides
    pub terms: LoanTerms,
    pub status: LoanStatus,
    pub application_date: NaiveDate,
    pub approval: Option<ApprovalRecord>,
    pub release_date: Option<NaiveDate>,
    pub installments: Vec<Installment>,
    /// append-only transaction log
    pub ledger: Vec<LedgerEntry>,

    // projected aggregates
    pub amount_paid: Money,
    pub outstanding_balance: Money,
    pub credit_balance: Money,
    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_due_date: Option<NaiveDate>,

    pub status_history: Vec<StatusChange<LoanStatus>>,
}

impl Loan {
    /// payments that have not been reversed, in ledger order
    pub fn effective_payments(&self) -> impl Iterator<Item = &Payment> {
        let reversed: Vec<PaymentId> = self
            .ledger
            .iter()
            .filter_map(|entry| match entry {
                LedgerEntry::Reversal(reversal) => Some(reversal.reverses),
                _ => None,
            })
            .collect();

        self.ledger.iter().filter_map(move |entry| match entry {
            LedgerEntry::Payment(payment) if !reversed.contains(&payment.id) => Some(payment),
            _ => None,
        })
    }

    pub fn find_payment(&self, payment_id: PaymentId) -> Option<&Payment> {
        self.ledger.iter().find_map(|entry| match entry {
            LedgerEntry::Payment(payment) if payment.id == payment_id => Some(payment),
            _ => None,
        })
    }

    pub fn is_reversed(&self, payment_id: PaymentId) -> bool {
        self.ledger
            .iter()
            .any(|entry| matches!(entry, LedgerEntry::Reversal(r) if r.reverses == payment_id))
    }

    /// earliest installment that is not fully settled
    pub fn earliest_unpaid(&self) -> Option<&Installment> {
        self.installments.iter().find(|i| !i.is_settled())
    }
}

/// renewal of a pawn ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PawnRenewal {
    /// 1-based renewal number
    pub sequence: u32,
    pub date: NaiveDate,
    pub payment_id: PaymentId,
    pub previous_principal: Money,
    pub new_principal: Money,
    pub previous_maturity_date: NaiveDate,
    pub previous_final_due_date: NaiveDate,
    pub new_maturity_date: NaiveDate,
    pub new_final_due_date: NaiveDate,
    pub interest_paid: Money,
    pub service_charge_paid: Money,
    pub principal_paydown: Money,
}

/// settlement of a pawn ticket by the pledgor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PawnRedemption {
    pub date: NaiveDate,
    pub payment_id: PaymentId,
    pub principal_paid: Money,
    pub interest_paid: Money,
    pub service_charge_paid: Money,
    pub discount: Money,
    pub total_paid: Money,
}

/// loss of the pledged collateral after the final due date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PawnForfeiture {
    pub date: NaiveDate,
    pub actor: String,
    pub principal_loss: Money,
    pub unpaid_interest: Money,
    pub total_loss: Money,
    /// later disposal of the collateral, does not reopen the ticket
    pub auction: Option<AuctionSale>,
}

/// the single terminal event of a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketOutcome {
    Redeemed(PawnRedemption),
    Forfeited(PawnForfeiture),
}

/// pawn ticket aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PawnTicket {
    pub id: TicketId,
    pub version: u64,
    pub ticket_number: String,
    pub customer_id: String,
    pub collateral: Collateral,
    /// terms of the current term; principal reflects any paydown
    pub terms: PawnTerms,
    pub principal: Money,
    /// interest for the current term
    pub interest_amount: Money,
    pub issue_date: NaiveDate,
    /// start of the current term
    pub term_start_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub grace_period_days: u32,
    /// maturity + grace
    pub final_due_date: NaiveDate,
    pub renewal_count: u32,
    pub status: TicketStatus,
    pub renewals: Vec<PawnRenewal>,
    pub payments: Vec<Payment>,
    pub outcome: Option<TicketOutcome>,
    pub status_history: Vec<StatusChange<TicketStatus>>,
}

impl PawnTicket {
    pub fn redemption(&self) -> Option<&PawnRedemption> {
        match &self.outcome {
            Some(TicketOutcome::Redeemed(r)) => Some(r),
            _ => None,
        }
    }

    pub fn forfeiture(&self) -> Option<&PawnForfeiture> {
        match &self.outcome {
            Some(TicketOutcome::Forfeited(f)) => Some(f),
            _ => None,
        }
    }

    pub fn is_past_final_due(&self, as_of: NaiveDate) -> bool {
        as_of > self.final_due_date
    }
}
