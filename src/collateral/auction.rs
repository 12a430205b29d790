use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LendingError, Result};

/// how forfeited collateral was disposed of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionMethod {
    PublicAuction,
    /// sold over the counter in the shop
    RetailSale,
    PrivateSale,
}

/// disposal of forfeited collateral, settled against the forfeiture loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionSale {
    pub date: NaiveDate,
    pub method: AuctionMethod,
    pub buyer: Option<String>,
    pub gross_proceeds: Money,
    pub costs: Money,
    pub net_proceeds: Money,
    /// loss recorded at forfeiture
    pub loss_before: Money,
    pub loss_after: Money,
    pub surplus: Option<Money>,
    pub deficiency: Option<Money>,
}

impl AuctionSale {
    /// settle a sale against the forfeited loss
    pub fn settle(
        date: NaiveDate,
        method: AuctionMethod,
        buyer: Option<String>,
        gross_proceeds: Money,
        costs: Money,
        loss: Money,
    ) -> Result<Self> {
        if gross_proceeds.is_negative() {
            return Err(LendingError::InvalidPaymentAmount {
                amount: gross_proceeds,
                reason: "gross proceeds must not be negative".to_string(),
            });
        }
        if costs.is_negative() {
            return Err(LendingError::InvalidPaymentAmount {
                amount: costs,
                reason: "sale costs must not be negative".to_string(),
            });
        }

        let net_proceeds = gross_proceeds.saturating_sub(costs);
        let loss_after = loss.saturating_sub(net_proceeds);

        let deficiency = if loss_after > Money::ZERO { Some(loss_after) } else { None };
        let surplus = if net_proceeds > loss { Some(net_proceeds - loss) } else { None };

        Ok(Self {
            date,
            method,
            buyer,
            gross_proceeds,
            costs,
            net_proceeds,
            loss_before: loss,
            loss_after,
            surplus,
            deficiency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
    }

    #[test]
    fn test_sale_with_surplus() {
        let sale = AuctionSale::settle(
            date(),
            AuctionMethod::PublicAuction,
            Some("bidder 12".to_string()),
            Money::from_major(12_000),
            Money::from_major(500),
            Money::from_major(10_600),
        )
        .unwrap();

        assert_eq!(sale.net_proceeds, Money::from_major(11_500));
        assert_eq!(sale.loss_after, Money::ZERO);
        assert_eq!(sale.surplus, Some(Money::from_major(900)));
        assert_eq!(sale.deficiency, None);
    }

    #[test]
    fn test_sale_with_deficiency() {
        let sale = AuctionSale::settle(
            date(),
            AuctionMethod::RetailSale,
            None,
            Money::from_major(8_000),
            Money::from_major(200),
            Money::from_major(10_600),
        )
        .unwrap();

        assert_eq!(sale.net_proceeds, Money::from_major(7_800));
        assert_eq!(sale.deficiency, Some(Money::from_major(2_800)));
        assert_eq!(sale.surplus, None);
    }

    #[test]
    fn test_negative_amounts_rejected() {
        assert!(AuctionSale::settle(
            date(),
            AuctionMethod::PrivateSale,
            None,
            Money::from_major(1_000),
            Money::from_major(-1),
            Money::from_major(500),
        )
        .is_err());
    }
}
