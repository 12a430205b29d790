/// pawn ticket - issue, renew, then redeem or forfeit
use chrono::NaiveDate;
use lending_engine::{
    AuctionMethod, Collateral, EngineConfig, Money, PawnLifecycle, PawnPolicy, PawnTerms, PaymentRequest, Rate,
    TicketView,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== pawn tickets ===\n");

    let lifecycle = PawnLifecycle::new(EngineConfig {
        pawn: PawnPolicy {
            max_loan_to_value: Rate::from_percentage(70),
            ..PawnPolicy::default()
        },
        ..EngineConfig::default()
    });

    let terms = |principal: i64, appraised: i64| {
        PawnTerms::one_month(
            Money::from_major(principal),
            Money::from_major(appraised),
            Rate::from_percentage(3),
            90,
            Money::from_major(20),
        )
    };

    // ticket 1: renewed once, then redeemed
    println!("1. renew and redeem");
    println!("-------------------");
    let ring = Collateral::new("18k gold ring", "jewelry", Money::from_major(15_000), date(2024, 1, 15))
        .appraised_by("appraiser-2");
    let ticket = lifecycle.issue("PT-000101", "customer-7", ring, terms(10_000, 15_000), date(2024, 1, 15))?.snapshot;
    println!("  issued {}: principal {}, maturity {}, final due {}", ticket.ticket_number, ticket.principal, ticket.maturity_date, ticket.final_due_date);

    let quote = lifecycle.renewal_quote(&ticket, date(2024, 2, 15))?;
    println!("  renewal due: {} (interest {}, service charge {})", quote.total, quote.interest, quote.service_charge);
    let ticket = lifecycle
        .renew(&ticket, &PaymentRequest::cash(quote.total, date(2024, 2, 15)), Money::ZERO)?
        .snapshot;
    println!("  renewed: maturity {}, final due {}", ticket.maturity_date, ticket.final_due_date);

    let quote = lifecycle.redemption_quote(&ticket, date(2024, 3, 10), Money::from_major(50))?;
    let outcome = lifecycle.redeem(&ticket, &PaymentRequest::cash(quote.total, date(2024, 3, 10)), quote.discount)?;
    println!("  redeemed for {} (discount {})", quote.total, quote.discount);
    println!("{}", TicketView::from_ticket(&outcome.snapshot).to_json_pretty()?);

    // ticket 2: never comes back
    println!("\n2. forfeit and auction");
    println!("----------------------");
    let phone = Collateral::new("smartphone, 256GB", "gadget", Money::from_major(8_000), date(2024, 1, 20));
    let ticket = lifecycle.issue("PT-000102", "customer-9", phone, terms(5_000, 8_000), date(2024, 1, 20))?.snapshot;

    if let Err(e) = lifecycle.forfeit(&ticket, "branch-manager", date(2024, 3, 1)) {
        println!("  too early: {}", e);
    }

    let ticket = lifecycle.forfeit(&ticket, "branch-manager", date(2024, 5, 21))?.snapshot;
    if let Some(forfeiture) = ticket.forfeiture() {
        println!("  forfeited: loss {} (principal {}, interest {})", forfeiture.total_loss, forfeiture.principal_loss, forfeiture.unpaid_interest);
    }

    let outcome = lifecycle.record_auction_sale(
        &ticket,
        date(2024, 6, 5),
        AuctionMethod::PublicAuction,
        Some("bidder-31".to_string()),
        Money::from_major(7_200),
        Money::from_major(300),
    )?;
    for event in &outcome.events {
        println!("  {:?}", event);
    }

    Ok(())
}
