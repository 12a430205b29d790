pub mod amortization;
pub mod overpayment;
pub mod waterfall;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::types::{PaymentId, PaymentMethod};

pub use amortization::{AmortizationCalculator, AmortizationSchedule};
pub use overpayment::OverpaymentHandler;
pub use waterfall::{Allocation, InstallmentAllocation, PaymentAllocator, RedemptionQuote};

/// payment as submitted by the cashier, already deduplicated upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub reference: String,
}

impl PaymentRequest {
    pub fn new(amount: Money, date: NaiveDate, method: PaymentMethod, reference: impl Into<String>) -> Self {
        Self {
            amount,
            date,
            method,
            reference: reference.into(),
        }
    }

    /// cash payment without a receipt reference
    pub fn cash(amount: Money, date: NaiveDate) -> Self {
        Self::new(amount, date, PaymentMethod::Cash, String::new())
    }

    /// zero and negative amounts never reach the allocator
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(LendingError::InvalidPaymentAmount {
                amount: self.amount,
                reason: "payment amount must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// split of a payment across what it settled
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentBreakdown {
    pub principal: Money,
    pub interest: Money,
    pub penalty: Money,
    /// pawn tickets only
    pub service_charge: Money,
}

impl PaymentBreakdown {
    pub fn total(&self) -> Money {
        self.principal + self.interest + self.penalty + self.service_charge
    }
}

/// immutable record of money received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub amount: Money,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub reference: String,
    /// split as booked at the time of payment
    pub breakdown: PaymentBreakdown,
    /// per-installment split, empty for pawn tickets
    pub allocations: Vec<InstallmentAllocation>,
}

impl Payment {
    /// book an allocation against a loan
    pub fn from_allocation(request: &PaymentRequest, allocation: &Allocation) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount: allocation.amount,
            date: request.date,
            method: request.method.clone(),
            reference: request.reference.clone(),
            breakdown: allocation.breakdown(),
            allocations: allocation.parts.clone(),
        }
    }

    /// book a pawn ticket payment with an explicit breakdown
    pub fn with_breakdown(request: &PaymentRequest, breakdown: PaymentBreakdown) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount: request.amount,
            date: request.date,
            method: request.method.clone(),
            reference: request.reference.clone(),
            breakdown,
            allocations: Vec::new(),
        }
    }
}

/// offsetting record for a payment booked in error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reversal {
    pub id: Uuid,
    pub reverses: PaymentId,
    pub amount: Money,
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// excess kept on the loan
    AdvanceCredit,
    /// excess handed back to the payer
    Refund,
}

/// non-payment movement on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: Uuid,
    pub kind: AdjustmentKind,
    pub amount: Money,
    pub date: NaiveDate,
    /// payment whose excess produced this adjustment
    pub payment_id: Option<PaymentId>,
}

/// append-only ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LedgerEntry {
    Payment(Payment),
    Reversal(Reversal),
    Adjustment(Adjustment),
}

impl LedgerEntry {
    pub fn date(&self) -> NaiveDate {
        match self {
            LedgerEntry::Payment(p) => p.date,
            LedgerEntry::Reversal(r) => r.date,
            LedgerEntry::Adjustment(a) => a.date,
        }
    }
}
