/// lifecycle - installment loan from application to payoff
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use lending_engine::{
    transact, EngineConfig, InMemoryStore, InterestMethod, Loan, LoanLifecycle, LoanTerms, LoanView, Money,
    OverpaymentStrategy, PaymentRequest, Rate, SafeTimeProvider, SnapshotStore, TermsOverride, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== installment loan lifecycle ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()));
    let controller = time.test_control().unwrap();
    let today = || time.now().date_naive();

    let lifecycle = LoanLifecycle::new(EngineConfig {
        overpayment_strategy: OverpaymentStrategy::HoldAsCredit,
        ..EngineConfig::default()
    });
    let store: InMemoryStore<Loan> = InMemoryStore::new();
    let attempts = lifecycle.config().max_commit_attempts;

    // 1. origination
    println!("1. origination");
    println!("--------------");
    let terms = LoanTerms::monthly(Money::from_major(10_000), Rate::from_percentage(12), 6, InterestMethod::Diminishing)
        .with_penalty(Rate::from_bps(10), 3);
    let loan = lifecycle.apply("LN-2024-0001", "borrower-42", terms, today())?.snapshot;
    let loan = lifecycle.start_review(&loan, "officer-7", today())?.snapshot;
    let overrides = TermsOverride {
        principal: Some(Money::from_major(9_000)),
        ..TermsOverride::default()
    };
    let loan = lifecycle.approve(&loan, "officer-7", overrides, today())?.snapshot;
    println!("  approved {} for {}", loan.loan_number, loan.terms.principal);

    let loan = lifecycle.disburse(&loan, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())?.snapshot;
    let id = loan.id;
    store.save(loan, 0)?;

    let loan = store.load(id)?;
    println!("  status: {}", loan.status);
    for installment in &loan.installments {
        println!(
            "    #{:<2} due {}  principal {:>8}  interest {:>6}  total {:>8}",
            installment.sequence,
            installment.due_date,
            installment.principal_due,
            installment.interest_due,
            installment.total_due
        );
    }

    // 2. on-time payments
    println!("\n2. servicing");
    println!("------------");
    for _ in 0..2 {
        let loan = store.load(id)?;
        let Some(next) = loan.earliest_unpaid() else { break };
        // pay on the due date
        controller.advance(Duration::days((next.due_date - today()).num_days()));
        let request = PaymentRequest::cash(next.outstanding(), today());
        let outcome = transact(&store, id, attempts, |current: &Loan| lifecycle.apply_payment(current, &request))?;
        println!("  {} paid {}, outstanding {}", today(), request.amount, outcome.snapshot.outstanding_balance);
    }

    // 3. missed due date
    println!("\n3. overdue");
    println!("----------");
    let missed = store.load(id)?.next_payment_due_date.ok_or("schedule exhausted")?;
    controller.advance(Duration::days((missed - today()).num_days() + 10));
    let outcome = transact(&store, id, attempts, |current: &Loan| lifecycle.refresh_status_now(current, &time))?;
    println!("  {} status: {}", today(), outcome.snapshot.status);

    let quote = lifecycle.payoff_quote(&outcome.snapshot, today())?;
    println!(
        "  payoff quote: {} (penalty {}, interest {}, principal {})",
        quote.total, quote.breakdown.penalty, quote.breakdown.interest, quote.breakdown.principal
    );

    let late = PaymentRequest::cash(Money::from_major(2_000), today());
    let outcome = transact(&store, id, attempts, |current: &Loan| lifecycle.apply_payment(current, &late))?;
    println!("  late payment of {} -> status {}", late.amount, outcome.snapshot.status);

    // 4. reversal
    println!("\n4. reversal");
    println!("-----------");
    let bounced = outcome
        .snapshot
        .effective_payments()
        .last()
        .map(|p| p.id)
        .ok_or("no payment to reverse")?;
    let outcome = transact(&store, id, attempts, |current: &Loan| {
        lifecycle.reverse_payment(current, bounced, "cheque bounced", today())
    })?;
    println!("  reversed {}, outstanding back to {}", bounced, outcome.snapshot.outstanding_balance);

    // 5. payoff with an overpayment held as credit
    println!("\n5. payoff");
    println!("---------");
    let quote = lifecycle.payoff_quote(&outcome.snapshot, today())?;
    let request = PaymentRequest::cash(quote.total + Money::from_major(25), today());
    let outcome = transact(&store, id, attempts, |current: &Loan| {
        lifecycle.apply_payment_resolving_overpayment(current, &request)
    })?;
    println!("  paid {} -> status {}", request.amount, outcome.snapshot.status);
    println!("  credit held: {}", outcome.snapshot.credit_balance);
    println!("  events:");
    for event in &outcome.events {
        println!("    {:?}", event);
    }

    println!("\n6. final state");
    println!("--------------");
    println!("{}", LoanView::from_loan(&store.load(id)?).to_json_pretty()?);

    Ok(())
}
