use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{LoanId, LoanStatus, OverpaymentStrategy, PaymentId, TicketId, TicketStatus};

/// events handed to the notification collaborator after each operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // loan lifecycle events
    LoanApplied {
        loan_id: LoanId,
        borrower_id: String,
        principal: Money,
        date: NaiveDate,
    },
    LoanApproved {
        loan_id: LoanId,
        approver: String,
        principal: Money,
        date: NaiveDate,
    },
    LoanRejected {
        loan_id: LoanId,
        actor: String,
        reason: String,
        date: NaiveDate,
    },
    LoanDisbursed {
        loan_id: LoanId,
        amount: Money,
        release_date: NaiveDate,
        installment_count: u32,
        first_due_date: Option<NaiveDate>,
    },
    LoanPaidOff {
        loan_id: LoanId,
        total_paid: Money,
        date: NaiveDate,
    },
    LoanDefaulted {
        loan_id: LoanId,
        outstanding_balance: Money,
        actor: String,
        date: NaiveDate,
    },

    // payment events
    PaymentReceived {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        applied_to_penalty: Money,
        applied_to_interest: Money,
        applied_to_principal: Money,
        date: NaiveDate,
    },
    PenaltyAssessed {
        loan_id: LoanId,
        sequence: u32,
        amount: Money,
        date: NaiveDate,
    },
    OverpaymentReceived {
        loan_id: LoanId,
        payment_id: PaymentId,
        excess: Money,
        strategy: OverpaymentStrategy,
        date: NaiveDate,
    },
    PaymentReversed {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        reason: String,
        date: NaiveDate,
    },

    // pawn ticket events
    TicketIssued {
        ticket_id: TicketId,
        principal: Money,
        appraised_value: Money,
        maturity_date: NaiveDate,
        final_due_date: NaiveDate,
    },
    TicketRenewed {
        ticket_id: TicketId,
        renewal_count: u32,
        amount_paid: Money,
        new_principal: Money,
        new_maturity_date: NaiveDate,
        new_final_due_date: NaiveDate,
    },
    TicketRedeemed {
        ticket_id: TicketId,
        amount_paid: Money,
        date: NaiveDate,
    },
    TicketForfeited {
        ticket_id: TicketId,
        principal_loss: Money,
        unpaid_interest: Money,
        date: NaiveDate,
    },
    AuctionRecorded {
        ticket_id: TicketId,
        net_proceeds: Money,
        surplus: Option<Money>,
        deficiency: Option<Money>,
        date: NaiveDate,
    },

    // status change events
    LoanStatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        reason: String,
        date: NaiveDate,
    },
    TicketStatusChanged {
        ticket_id: TicketId,
        old_status: TicketStatus,
        new_status: TicketStatus,
        reason: String,
        date: NaiveDate,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
