pub mod collateral;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod interest;
pub mod ledger;
pub mod lifecycle;
pub mod payments;
pub mod state;
pub mod store;
pub mod types;

// re-export key types
pub use decimal::{Money, Rate};
pub use errors::{LendingError, Result};
pub use events::{Event, EventStore};
pub use config::{EngineConfig, LoanTerms, PawnPolicy, PawnTerms, TermsOverride};
pub use interest::{PenaltyAssessment, PenaltyConfig, PenaltyEngine};
pub use collateral::{AuctionMethod, AuctionSale, Collateral, LtvCalculator};
pub use ledger::{LedgerProjector, LoanSummary};
pub use lifecycle::{
    LoanLifecycle, LoanView, Outcome, PawnLifecycle, PayoffQuote, RenewalQuote, TicketView,
};
pub use payments::{
    Adjustment, AdjustmentKind, AmortizationCalculator, AmortizationSchedule, LedgerEntry, OverpaymentHandler,
    Payment, PaymentAllocator, PaymentBreakdown, PaymentRequest, RedemptionQuote, Reversal,
};
pub use state::{Installment, Loan, PawnTicket, StatusChange};
pub use store::{transact, InMemoryStore, SnapshotStore, Versioned};
pub use types::{
    InstallmentStatus, InterestMethod, LoanId, LoanStatus, OverpaymentStrategy, PaymentFrequency, PaymentId,
    PaymentMethod, PenaltyBasis, TermUnit, TicketId, TicketStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
