pub mod appraisal;
pub mod auction;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;

pub use appraisal::LtvCalculator;
pub use auction::{AuctionMethod, AuctionSale};

/// item pledged against a pawn ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collateral {
    pub description: String,
    /// e.g. jewelry, gadget, appliance
    pub category: String,
    pub appraised_value: Money,
    pub appraised_on: NaiveDate,
    pub appraiser: Option<String>,
    /// set when the item goes back to the pledgor on redemption
    pub released_on: Option<NaiveDate>,
}

impl Collateral {
    pub fn new(
        description: impl Into<String>,
        category: impl Into<String>,
        appraised_value: Money,
        appraised_on: NaiveDate,
    ) -> Self {
        Self {
            description: description.into(),
            category: category.into(),
            appraised_value,
            appraised_on,
            appraiser: None,
            released_on: None,
        }
    }

    pub fn appraised_by(mut self, appraiser: impl Into<String>) -> Self {
        self.appraiser = Some(appraiser.into());
        self
    }

    pub fn is_released(&self) -> bool {
        self.released_on.is_some()
    }
}
