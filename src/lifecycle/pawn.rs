use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::collateral::{AuctionMethod, AuctionSale, Collateral, LtvCalculator};
use crate::config::{EngineConfig, PawnTerms};
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::events::{Event, EventStore};
use crate::interest;
use crate::payments::{Payment, PaymentAllocator, PaymentBreakdown, PaymentRequest, RedemptionQuote};
use crate::state::{PawnForfeiture, PawnRedemption, PawnRenewal, PawnTicket, StatusChange, TicketOutcome};
use crate::types::TicketStatus;

use super::Outcome;

/// days in one block of late interest past maturity
const LATE_INTEREST_BLOCK_DAYS: u32 = 30;

/// what a renewal costs on a given date, before any principal paydown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenewalQuote {
    pub as_of: NaiveDate,
    pub interest: Money,
    pub service_charge: Money,
    pub total: Money,
}

/// pawn ticket state machine
#[derive(Debug, Clone, Default)]
pub struct PawnLifecycle {
    config: EngineConfig,
}

impl PawnLifecycle {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// issue a ticket against appraised collateral
    pub fn issue(
        &self,
        ticket_number: impl Into<String>,
        customer_id: impl Into<String>,
        collateral: Collateral,
        terms: PawnTerms,
        issue_date: NaiveDate,
    ) -> Result<Outcome<PawnTicket>> {
        terms.validate()?;
        if terms.appraised_value != collateral.appraised_value {
            return Err(LendingError::invalid_terms(format!(
                "terms appraised value {} does not match the collateral appraisal {}",
                terms.appraised_value, collateral.appraised_value
            )));
        }
        LtvCalculator::new(self.config.pawn.max_loan_to_value).check(terms.principal, terms.appraised_value)?;

        let (maturity_date, final_due_date) = term_dates(&terms, issue_date)?;

        let ticket = PawnTicket {
            id: Uuid::new_v4(),
            version: 1,
            ticket_number: ticket_number.into(),
            customer_id: customer_id.into(),
            collateral,
            principal: terms.principal,
            interest_amount: terms.term_interest(terms.principal),
            issue_date,
            term_start_date: issue_date,
            maturity_date,
            grace_period_days: terms.grace_period_days,
            final_due_date,
            renewal_count: 0,
            status: TicketStatus::Active,
            renewals: Vec::new(),
            payments: Vec::new(),
            outcome: None,
            status_history: Vec::new(),
            terms,
        };

        info!(
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            principal = %ticket.principal,
            maturity = %ticket.maturity_date,
            "pawn ticket issued"
        );

        let mut events = EventStore::new();
        events.emit(Event::TicketIssued {
            ticket_id: ticket.id,
            principal: ticket.principal,
            appraised_value: ticket.collateral.appraised_value,
            maturity_date: ticket.maturity_date,
            final_due_date: ticket.final_due_date,
        });
        Ok(Outcome::new(ticket, events))
    }

    /// current-term interest plus any late interest past maturity
    pub fn accrued_interest(&self, ticket: &PawnTicket, as_of: NaiveDate) -> Money {
        ticket.interest_amount + self.late_interest(ticket, as_of)
    }

    /// one month of interest per started 30 days past maturity
    pub fn late_interest(&self, ticket: &PawnTicket, as_of: NaiveDate) -> Money {
        if !self.config.pawn.charge_late_interest {
            return Money::ZERO;
        }
        let days_late = interest::days_between(ticket.maturity_date, as_of);
        if days_late == 0 {
            return Money::ZERO;
        }
        let blocks = days_late.div_ceil(LATE_INTEREST_BLOCK_DAYS);
        Money::from_decimal(
            ticket.principal.as_decimal() * ticket.terms.monthly_rate.as_decimal() * Decimal::from(blocks),
        )
    }

    pub fn renewal_quote(&self, ticket: &PawnTicket, as_of: NaiveDate) -> Result<RenewalQuote> {
        require_open(ticket, "renew")?;
        if ticket.is_past_final_due(as_of) {
            return Err(invalid(ticket, "renew past its final due date"));
        }

        // the new term starts at the old maturity and covers any days past
        // it, so no late interest here
        let interest = ticket.interest_amount;
        let service_charge = ticket.terms.service_charge;
        Ok(RenewalQuote {
            as_of,
            interest,
            service_charge,
            total: interest + service_charge,
        })
    }

    /// extend the ticket by one term from its current maturity
    ///
    /// the payment must equal the current term's interest + service charge +
    /// `principal_paydown` exactly; the new term's interest is charged on the
    /// reduced principal. a late renewal pays no late interest since the new
    /// term already runs from the old maturity.
    pub fn renew(
        &self,
        ticket: &PawnTicket,
        request: &PaymentRequest,
        principal_paydown: Money,
    ) -> Result<Outcome<PawnTicket>> {
        let quote = self.renewal_quote(ticket, request.date)?;

        if principal_paydown.is_negative() {
            return Err(LendingError::InvalidPaymentAmount {
                amount: principal_paydown,
                reason: "principal paydown must not be negative".to_string(),
            });
        }
        if principal_paydown.is_positive() && !self.config.pawn.allow_renewal_principal_paydown {
            return Err(LendingError::InvalidPaymentAmount {
                amount: principal_paydown,
                reason: "principal paydown on renewal is disabled".to_string(),
            });
        }
        if principal_paydown >= ticket.principal {
            return Err(LendingError::InvalidPaymentAmount {
                amount: principal_paydown,
                reason: "paydown would clear the principal, redeem instead".to_string(),
            });
        }

        let required = quote.total + principal_paydown;
        if request.amount < required {
            return Err(LendingError::InsufficientRenewalPayment {
                required,
                provided: request.amount,
            });
        }
        if request.amount > required {
            return Err(LendingError::Overpayment {
                excess: request.amount - required,
            });
        }

        let new_principal = ticket.principal - principal_paydown;
        let mut new_terms = ticket.terms.clone();
        new_terms.principal = new_principal;
        let (new_maturity, new_final_due) = term_dates(&new_terms, ticket.maturity_date)?;

        let payment = Payment::with_breakdown(
            request,
            PaymentBreakdown {
                principal: principal_paydown,
                interest: quote.interest,
                penalty: Money::ZERO,
                service_charge: quote.service_charge,
            },
        );

        let mut next = ticket.clone();
        let mut events = EventStore::new();
        next.renewals.push(PawnRenewal {
            sequence: ticket.renewal_count + 1,
            date: request.date,
            payment_id: payment.id,
            previous_principal: ticket.principal,
            new_principal,
            previous_maturity_date: ticket.maturity_date,
            previous_final_due_date: ticket.final_due_date,
            new_maturity_date: new_maturity,
            new_final_due_date: new_final_due,
            interest_paid: quote.interest,
            service_charge_paid: quote.service_charge,
            principal_paydown,
        });
        next.payments.push(payment);
        next.renewal_count += 1;
        next.principal = new_principal;
        next.interest_amount = new_terms.term_interest(new_principal);
        next.term_start_date = ticket.maturity_date;
        next.maturity_date = new_maturity;
        next.final_due_date = new_final_due;
        next.terms = new_terms;

        events.emit(Event::TicketRenewed {
            ticket_id: next.id,
            renewal_count: next.renewal_count,
            amount_paid: request.amount,
            new_principal,
            new_maturity_date: new_maturity,
            new_final_due_date: new_final_due,
        });
        info!(
            ticket_id = %next.id,
            renewal_count = next.renewal_count,
            new_maturity = %new_maturity,
            "pawn ticket renewed"
        );
        transition(&mut next, TicketStatus::Renewed, request.date, None, "renewed", &mut events);
        Ok(finish(next, events))
    }

    /// amount that redeems the ticket, `discount` coming off the charges
    pub fn redemption_quote(&self, ticket: &PawnTicket, as_of: NaiveDate, discount: Money) -> Result<RedemptionQuote> {
        require_open(ticket, "redeem")?;

        let interest = self.accrued_interest(ticket, as_of);
        let service_charge = ticket.terms.service_charge;
        if discount.is_negative() || discount > interest + service_charge {
            return Err(LendingError::InvalidPaymentAmount {
                amount: discount,
                reason: format!("discount must be between 0 and the charges of {}", interest + service_charge),
            });
        }

        Ok(RedemptionQuote {
            as_of,
            principal: ticket.principal,
            interest,
            service_charge,
            discount,
            total: ticket.principal + interest + service_charge - discount,
        })
    }

    /// settle the ticket and release the collateral
    pub fn redeem(&self, ticket: &PawnTicket, request: &PaymentRequest, discount: Money) -> Result<Outcome<PawnTicket>> {
        let quote = self.redemption_quote(ticket, request.date, discount)?;

        let breakdown = PaymentAllocator::allocate_redemption(&quote, request.amount)?;
        let payment = Payment::with_breakdown(request, breakdown);

        let mut next = ticket.clone();
        let mut events = EventStore::new();
        next.outcome = Some(TicketOutcome::Redeemed(PawnRedemption {
            date: request.date,
            payment_id: payment.id,
            principal_paid: quote.principal,
            interest_paid: breakdown.interest,
            service_charge_paid: breakdown.service_charge,
            discount: quote.discount,
            total_paid: request.amount,
        }));
        next.payments.push(payment);
        next.collateral.released_on = Some(request.date);

        events.emit(Event::TicketRedeemed {
            ticket_id: next.id,
            amount_paid: request.amount,
            date: request.date,
        });
        transition(&mut next, TicketStatus::Redeemed, request.date, None, "redeemed, collateral released", &mut events);
        Ok(finish(next, events))
    }

    /// administrative forfeiture once the final due date has passed
    pub fn forfeit(&self, ticket: &PawnTicket, actor: &str, as_of: NaiveDate) -> Result<Outcome<PawnTicket>> {
        require_open(ticket, "forfeit")?;
        if !ticket.is_past_final_due(as_of) {
            return Err(invalid(ticket, "forfeit before its final due date"));
        }

        let unpaid_interest = self.accrued_interest(ticket, as_of);
        let forfeiture = PawnForfeiture {
            date: as_of,
            actor: actor.to_string(),
            principal_loss: ticket.principal,
            unpaid_interest,
            total_loss: ticket.principal + unpaid_interest,
            auction: None,
        };

        let mut next = ticket.clone();
        let mut events = EventStore::new();
        events.emit(Event::TicketForfeited {
            ticket_id: next.id,
            principal_loss: forfeiture.principal_loss,
            unpaid_interest,
            date: as_of,
        });
        next.outcome = Some(TicketOutcome::Forfeited(forfeiture));
        transition(&mut next, TicketStatus::Forfeited, as_of, Some(actor), "final due date passed", &mut events);
        Ok(finish(next, events))
    }

    /// record the one sale of forfeited collateral; status stays `forfeited`
    pub fn record_auction_sale(
        &self,
        ticket: &PawnTicket,
        date: NaiveDate,
        method: AuctionMethod,
        buyer: Option<String>,
        gross_proceeds: Money,
        costs: Money,
    ) -> Result<Outcome<PawnTicket>> {
        let forfeiture = match &ticket.outcome {
            Some(TicketOutcome::Forfeited(f)) if ticket.status == TicketStatus::Forfeited => f,
            _ => return Err(invalid(ticket, "record an auction sale for")),
        };
        if forfeiture.auction.is_some() {
            return Err(invalid(ticket, "record a second auction sale for"));
        }

        let sale = AuctionSale::settle(date, method, buyer, gross_proceeds, costs, forfeiture.total_loss)?;

        let mut next = ticket.clone();
        let mut events = EventStore::new();
        events.emit(Event::AuctionRecorded {
            ticket_id: next.id,
            net_proceeds: sale.net_proceeds,
            surplus: sale.surplus,
            deficiency: sale.deficiency,
            date,
        });
        info!(ticket_id = %next.id, net_proceeds = %sale.net_proceeds, "auction sale recorded");

        if let Some(TicketOutcome::Forfeited(f)) = next.outcome.as_mut() {
            f.auction = Some(sale);
        }
        Ok(finish(next, events))
    }
}

/// maturity and final due date of a term starting at `start`
fn term_dates(terms: &PawnTerms, start: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let maturity = interest::term_end(start, terms.term_length, terms.term_unit).ok_or_else(|| {
        LendingError::CalculationError {
            message: format!("maturity of a term starting {} is out of range", start),
        }
    })?;
    let final_due = maturity
        .checked_add_days(Days::new(u64::from(terms.grace_period_days)))
        .ok_or_else(|| LendingError::CalculationError {
            message: format!("final due date after {} is out of range", maturity),
        })?;
    Ok((maturity, final_due))
}

fn invalid(ticket: &PawnTicket, operation: &str) -> LendingError {
    LendingError::InvalidTicketState {
        status: ticket.status,
        operation: operation.to_string(),
    }
}

fn require_open(ticket: &PawnTicket, operation: &str) -> Result<()> {
    if ticket.status.is_terminal() {
        Err(invalid(ticket, operation))
    } else {
        Ok(())
    }
}

fn finish(mut ticket: PawnTicket, events: EventStore) -> Outcome<PawnTicket> {
    ticket.version += 1;
    Outcome::new(ticket, events)
}

fn transition(
    ticket: &mut PawnTicket,
    to: TicketStatus,
    date: NaiveDate,
    actor: Option<&str>,
    reason: &str,
    events: &mut EventStore,
) {
    let from = ticket.status;
    if from == to {
        return;
    }

    info!(ticket_id = %ticket.id, from = %from, to = %to, reason, "ticket status changed");

    ticket.status = to;
    ticket.status_history.push(StatusChange {
        from,
        to,
        date,
        actor: actor.map(str::to_string),
        reason: Some(reason.to_string()),
    });
    events.emit(Event::TicketStatusChanged {
        ticket_id: ticket.id,
        old_status: from,
        new_status: to,
        reason: reason.to_string(),
        date,
    });
}
