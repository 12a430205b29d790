use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::types::{OverpaymentStrategy, PaymentId};

use super::{Adjustment, AdjustmentKind};

/// decides what happens to money beyond the final installment
pub struct OverpaymentHandler {
    strategy: OverpaymentStrategy,
}

impl OverpaymentHandler {
    pub fn new(strategy: OverpaymentStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> OverpaymentStrategy {
        self.strategy
    }

    /// book `excess` from `payment_id`, or refuse it
    pub fn resolve(&self, excess: Money, payment_id: PaymentId, date: NaiveDate) -> Result<Adjustment> {
        if !excess.is_positive() {
            return Err(LendingError::InvalidPaymentAmount {
                amount: excess,
                reason: "overpayment excess must be positive".to_string(),
            });
        }

        let kind = match self.strategy {
            OverpaymentStrategy::Reject => {
                warn!(excess = %excess, "overpayment rejected");
                return Err(LendingError::Overpayment { excess });
            }
            OverpaymentStrategy::HoldAsCredit => AdjustmentKind::AdvanceCredit,
            OverpaymentStrategy::Refund => AdjustmentKind::Refund,
        };

        info!(excess = %excess, kind = ?kind, payment_id = %payment_id, "overpayment booked");

        Ok(Adjustment {
            id: Uuid::new_v4(),
            kind,
            amount: excess,
            date,
            payment_id: Some(payment_id),
        })
    }
}
