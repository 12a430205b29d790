use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{LoanStatus, TicketStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LendingError {
    /// loan or ticket configuration rejected at application time
    #[error("invalid terms: {reason}")]
    InvalidTerms {
        reason: String,
    },

    #[error("invalid payment amount {amount}: {reason}")]
    InvalidPaymentAmount {
        amount: Money,
        reason: String,
    },

    /// payment exceeds everything still owed; nothing was applied
    #[error("overpayment: excess of {excess} over the amount due")]
    Overpayment {
        excess: Money,
    },

    #[error("incomplete redemption: required {required}, provided {provided}")]
    IncompleteRedemption {
        required: Money,
        provided: Money,
    },

    #[error("insufficient renewal payment: required {required}, provided {provided}")]
    InsufficientRenewalPayment {
        required: Money,
        provided: Money,
    },

    #[error("invalid loan transition: cannot {operation} a loan that is {status}")]
    InvalidLoanTransition {
        status: LoanStatus,
        operation: String,
    },

    #[error("invalid ticket state: cannot {operation} a ticket that is {status}")]
    InvalidTicketState {
        status: TicketStatus,
        operation: String,
    },

    /// the stored snapshot moved on since it was read; re-fetch and retry
    #[error("concurrency conflict on {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: Uuid,
    },

    #[error("snapshot not found: {id}")]
    SnapshotNotFound {
        id: Uuid,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },
}

impl LendingError {
    /// only optimistic-lock failures are safe to retry automatically
    pub fn is_retryable(&self) -> bool {
        matches!(self, LendingError::ConcurrencyConflict { .. })
    }

    pub(crate) fn invalid_terms(reason: impl Into<String>) -> Self {
        LendingError::InvalidTerms { reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, LendingError>;
