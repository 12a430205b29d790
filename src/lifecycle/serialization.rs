/// flattened views of loans and tickets for reporting
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::collateral::LtvCalculator;
use crate::decimal::{Money, Rate};
use crate::payments::LedgerEntry;
use crate::state::{Loan, PawnTicket};
use crate::types::{InstallmentStatus, InterestMethod, LoanId, LoanStatus, TicketId, TicketStatus};

/// serializable view of a loan's state
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub version: u64,
    pub loan_number: String,
    pub borrower_id: String,
    pub status: LoanStatus,
    pub application_date: NaiveDate,
    pub release_date: Option<NaiveDate>,
    pub financial: LoanFinancialView,
    pub schedule: ScheduleView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoanFinancialView {
    pub principal: Money,
    pub annual_rate: Rate,
    pub interest_method: InterestMethod,
    pub total_interest: Money,
    pub total_payable: Money,
    pub amount_paid: Money,
    pub outstanding_balance: Money,
    pub penalty_accrued: Money,
    pub penalty_paid: Money,
    pub credit_balance: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleView {
    pub installment_count: u32,
    pub paid_count: u32,
    pub overdue_count: u32,
    pub payment_count: u32,
    pub reversal_count: u32,
    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_due_date: Option<NaiveDate>,
    pub next_payment_amount: Option<Money>,
}

impl LoanView {
    pub fn from_loan(loan: &Loan) -> Self {
        let installments = &loan.installments;
        let count_status = |status: InstallmentStatus| -> u32 {
            installments.iter().filter(|i| i.status == status).count() as u32
        };

        LoanView {
            id: loan.id,
            version: loan.version,
            loan_number: loan.loan_number.clone(),
            borrower_id: loan.borrower_id.clone(),
            status: loan.status,
            application_date: loan.application_date,
            release_date: loan.release_date,
            financial: LoanFinancialView {
                principal: loan.terms.principal,
                annual_rate: loan.terms.annual_rate,
                interest_method: loan.terms.interest_method,
                total_interest: installments.iter().map(|i| i.interest_due).sum(),
                total_payable: installments.iter().map(|i| i.total_due).sum(),
                amount_paid: loan.amount_paid,
                outstanding_balance: loan.outstanding_balance,
                penalty_accrued: installments.iter().map(|i| i.penalty_accrued).sum(),
                penalty_paid: installments.iter().map(|i| i.penalty_paid).sum(),
                credit_balance: loan.credit_balance,
            },
            schedule: ScheduleView {
                installment_count: installments.len() as u32,
                paid_count: count_status(InstallmentStatus::Paid),
                overdue_count: count_status(InstallmentStatus::Overdue),
                payment_count: loan.effective_payments().count() as u32,
                reversal_count: loan
                    .ledger
                    .iter()
                    .filter(|e| matches!(e, LedgerEntry::Reversal(_)))
                    .count() as u32,
                last_payment_date: loan.last_payment_date,
                next_payment_due_date: loan.next_payment_due_date,
                next_payment_amount: loan.earliest_unpaid().map(|i| i.outstanding() + i.penalty_outstanding()),
            },
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// serializable view of a pawn ticket
#[derive(Debug, Serialize, Deserialize)]
pub struct TicketView {
    pub id: TicketId,
    pub version: u64,
    pub ticket_number: String,
    pub customer_id: String,
    pub status: TicketStatus,
    pub collateral: String,
    pub appraised_value: Money,
    pub principal: Money,
    pub loan_to_value: Option<Rate>,
    pub interest_amount: Money,
    pub service_charge: Money,
    pub issue_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub final_due_date: NaiveDate,
    pub renewal_count: u32,
    pub total_paid: Money,
    pub collateral_released_on: Option<NaiveDate>,
}

impl TicketView {
    pub fn from_ticket(ticket: &PawnTicket) -> Self {
        TicketView {
            id: ticket.id,
            version: ticket.version,
            ticket_number: ticket.ticket_number.clone(),
            customer_id: ticket.customer_id.clone(),
            status: ticket.status,
            collateral: ticket.collateral.description.clone(),
            appraised_value: ticket.collateral.appraised_value,
            principal: ticket.principal,
            loan_to_value: LtvCalculator::calculate_ltv(ticket.principal, ticket.collateral.appraised_value).ok(),
            interest_amount: ticket.interest_amount,
            service_charge: ticket.terms.service_charge,
            issue_date: ticket.issue_date,
            maturity_date: ticket.maturity_date,
            final_due_date: ticket.final_due_date,
            renewal_count: ticket.renewal_count,
            total_paid: ticket.payments.iter().map(|p| p.amount).sum(),
            collateral_released_on: ticket.collateral.released_on,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
