use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};

/// loan-to-value checks made when a pawn ticket is issued
pub struct LtvCalculator {
    max_ltv: Rate,
}

impl LtvCalculator {
    pub fn new(max_ltv: Rate) -> Self {
        Self { max_ltv }
    }

    /// principal as a fraction of the appraised value
    pub fn calculate_ltv(principal: Money, appraised_value: Money) -> Result<Rate> {
        if !appraised_value.is_positive() {
            return Err(LendingError::invalid_terms("appraised value must be positive"));
        }
        Ok(Rate::from_decimal(principal.as_decimal() / appraised_value.as_decimal()))
    }

    /// largest principal the appraisal supports
    pub fn max_principal(&self, appraised_value: Money) -> Money {
        let limit = appraised_value.as_decimal() * self.max_ltv.as_decimal();
        // never round up past the cap
        Money::from_decimal(limit.round_dp_with_strategy(2, RoundingStrategy::ToZero))
    }

    /// ltv of the proposed principal, or `InvalidTerms` above the cap
    pub fn check(&self, principal: Money, appraised_value: Money) -> Result<Rate> {
        let ltv = Self::calculate_ltv(principal, appraised_value)?;
        if ltv.as_decimal() > self.max_ltv.as_decimal() {
            warn!(
                principal = %principal,
                appraised_value = %appraised_value,
                ltv = %ltv,
                max_ltv = %self.max_ltv,
                "principal exceeds loan-to-value cap"
            );
            return Err(LendingError::invalid_terms(format!(
                "principal {} is {} of the appraised value, above the {} cap (max principal {})",
                principal,
                ltv,
                self.max_ltv,
                self.max_principal(appraised_value)
            )));
        }
        Ok(ltv)
    }

    pub fn headroom(&self, principal: Money, appraised_value: Money) -> Money {
        self.max_principal(appraised_value).saturating_sub(principal)
    }
}

impl Default for LtvCalculator {
    fn default() -> Self {
        Self::new(Rate::from_decimal(Decimal::ONE))
    }
}
