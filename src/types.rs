use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a pawn ticket
pub type TicketId = Uuid;

/// unique identifier for a recorded payment
pub type PaymentId = Uuid;

/// how interest is spread across the installments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestMethod {
    /// interest on the original principal, split evenly per period
    Flat,
    /// annuity: constant installment, interest on the declining balance
    Diminishing,
    /// full-term interest added to principal before dividing
    AddOn,
}

/// unit of a loan or ticket term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermUnit {
    Days,
    Weeks,
    Months,
    Years,
}

/// how often installments fall due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    Daily,
    Weekly,
    BiWeekly,
    SemiMonthly,
    Monthly,
    Quarterly,
    SemiAnnually,
    Annually,
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// application received
    Pending,
    UnderReview,
    Approved,
    /// funds released, schedule generated
    Disbursed,
    /// performing
    Active,
    /// earliest unpaid installment is past due
    Overdue,
    /// final installment settled
    Paid,
    Defaulted,
    Rejected,
    Cancelled,
}

impl LoanStatus {
    /// no transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Paid | LoanStatus::Defaulted | LoanStatus::Rejected | LoanStatus::Cancelled
        )
    }

    /// statuses in which payments are accepted
    pub fn is_servicing(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }

    pub fn is_pre_disbursement(&self) -> bool {
        matches!(self, LoanStatus::Pending | LoanStatus::UnderReview | LoanStatus::Approved)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Pending => "pending",
            LoanStatus::UnderReview => "under_review",
            LoanStatus::Approved => "approved",
            LoanStatus::Disbursed => "disbursed",
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Paid => "paid",
            LoanStatus::Defaulted => "defaulted",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// pawn ticket status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    /// alive after at least one renewal
    Renewed,
    Redeemed,
    Forfeited,
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Redeemed | TicketStatus::Forfeited)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TicketStatus::Active => "active",
            TicketStatus::Renewed => "renewed",
            TicketStatus::Redeemed => "redeemed",
            TicketStatus::Forfeited => "forfeited",
        };
        f.write_str(s)
    }
}

/// payment channel as recorded by the cashier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    EWallet,
    Check,
    Other(String),
}

/// what a late penalty is charged on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyBasis {
    /// unpaid principal of the late installment
    #[default]
    OutstandingPrincipal,
    /// unpaid principal plus interest of the late installment
    OutstandingTotal,
}

/// what to do with money beyond the final installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentStrategy {
    /// refuse the whole payment
    #[default]
    Reject,
    /// keep the excess on the loan as an advance credit
    HoldAsCredit,
    /// hand the excess back to the payer
    Refund,
}
