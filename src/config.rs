use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::interest::{self, PenaltyConfig};
use crate::types::{InterestMethod, OverpaymentStrategy, PaymentFrequency, PenaltyBasis, TermUnit};

/// loan terms, fixed at application time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    /// nominal annual interest rate
    pub annual_rate: Rate,
    pub interest_method: InterestMethod,
    pub term_length: u32,
    pub term_unit: TermUnit,
    pub frequency: PaymentFrequency,
    /// penalty charged per day overdue
    pub penalty_rate: Option<Rate>,
    pub grace_period_days: Option<u32>,
}

impl LoanTerms {
    pub fn new(
        principal: Money,
        annual_rate: Rate,
        interest_method: InterestMethod,
        term_length: u32,
        term_unit: TermUnit,
        frequency: PaymentFrequency,
    ) -> Self {
        Self {
            principal,
            annual_rate,
            interest_method,
            term_length,
            term_unit,
            frequency,
            penalty_rate: None,
            grace_period_days: None,
        }
    }

    /// monthly installments over a term given in months
    pub fn monthly(principal: Money, annual_rate: Rate, months: u32, method: InterestMethod) -> Self {
        Self::new(principal, annual_rate, method, months, TermUnit::Months, PaymentFrequency::Monthly)
    }

    /// weekly installments over a term given in weeks
    pub fn weekly(principal: Money, annual_rate: Rate, weeks: u32, method: InterestMethod) -> Self {
        Self::new(principal, annual_rate, method, weeks, TermUnit::Weeks, PaymentFrequency::Weekly)
    }

    pub fn with_penalty(mut self, daily_rate: Rate, grace_period_days: u32) -> Self {
        self.penalty_rate = Some(daily_rate);
        self.grace_period_days = Some(grace_period_days);
        self
    }

    pub fn installment_count(&self) -> u32 {
        interest::installment_count(self.term_length, self.term_unit, self.frequency)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(LendingError::invalid_terms(format!(
                "principal must be positive, got {}",
                self.principal
            )));
        }
        if self.annual_rate.is_negative() {
            return Err(LendingError::invalid_terms(format!(
                "interest rate must not be negative, got {}",
                self.annual_rate
            )));
        }
        if self.term_length < 1 {
            return Err(LendingError::invalid_terms("term length must be at least 1"));
        }
        if let Some(rate) = self.penalty_rate {
            if rate.is_negative() {
                return Err(LendingError::invalid_terms("penalty rate must not be negative"));
            }
        }
        Ok(())
    }

    /// penalty settings, if these terms carry a penalty rate
    pub fn penalty_config(&self, basis: PenaltyBasis) -> Option<PenaltyConfig> {
        self.penalty_rate
            .map(|rate| PenaltyConfig::new(rate, self.grace_period_days.unwrap_or(0), basis))
    }
}

/// overrides an approver may apply to the applied-for terms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermsOverride {
    pub principal: Option<Money>,
    pub annual_rate: Option<Rate>,
    pub term_length: Option<u32>,
}

impl TermsOverride {
    pub fn is_empty(&self) -> bool {
        self.principal.is_none() && self.annual_rate.is_none() && self.term_length.is_none()
    }

    pub fn apply(&self, terms: &LoanTerms) -> LoanTerms {
        let mut updated = terms.clone();
        if let Some(principal) = self.principal {
            updated.principal = principal;
        }
        if let Some(rate) = self.annual_rate {
            updated.annual_rate = rate;
        }
        if let Some(length) = self.term_length {
            updated.term_length = length;
        }
        updated
    }
}

/// pawn ticket terms, fixed at issue and replaced on renewal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PawnTerms {
    /// amount lent against the collateral
    pub principal: Money,
    pub appraised_value: Money,
    /// interest rate per month of term
    pub monthly_rate: Rate,
    pub term_length: u32,
    pub term_unit: TermUnit,
    pub grace_period_days: u32,
    /// flat charge collected on redemption and on each renewal
    pub service_charge: Money,
}

impl PawnTerms {
    /// one-month ticket, the common pawnshop term
    pub fn one_month(
        principal: Money,
        appraised_value: Money,
        monthly_rate: Rate,
        grace_period_days: u32,
        service_charge: Money,
    ) -> Self {
        Self {
            principal,
            appraised_value,
            monthly_rate,
            term_length: 1,
            term_unit: TermUnit::Months,
            grace_period_days,
            service_charge,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(LendingError::invalid_terms(format!(
                "principal must be positive, got {}",
                self.principal
            )));
        }
        if !self.appraised_value.is_positive() {
            return Err(LendingError::invalid_terms("appraised value must be positive"));
        }
        if self.monthly_rate.is_negative() {
            return Err(LendingError::invalid_terms("interest rate must not be negative"));
        }
        if self.term_length < 1 {
            return Err(LendingError::invalid_terms("term length must be at least 1"));
        }
        if self.service_charge.is_negative() {
            return Err(LendingError::invalid_terms("service charge must not be negative"));
        }
        Ok(())
    }

    /// interest for one full term on `principal`
    pub fn term_interest(&self, principal: Money) -> Money {
        let months = interest::term_in_months(self.term_length, self.term_unit);
        Money::from_decimal(principal.as_decimal() * self.monthly_rate.as_decimal() * months)
    }
}

/// pawnshop policy knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PawnPolicy {
    /// principal may not exceed this fraction of the appraised value
    pub max_loan_to_value: Rate,
    /// charge a month of interest for each started 30 days past maturity
    pub charge_late_interest: bool,
    /// allow a renewal to also pay down principal
    pub allow_renewal_principal_paydown: bool,
}

impl Default for PawnPolicy {
    fn default() -> Self {
        Self {
            max_loan_to_value: Rate::ONE,
            charge_late_interest: true,
            allow_renewal_principal_paydown: true,
        }
    }
}

/// engine-wide policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub penalty_basis: PenaltyBasis,
    pub overpayment_strategy: OverpaymentStrategy,
    /// attempts made by `store::transact` before giving up on conflicts
    pub max_commit_attempts: u32,
    pub pawn: PawnPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            penalty_basis: PenaltyBasis::OutstandingPrincipal,
            overpayment_strategy: OverpaymentStrategy::Reject,
            max_commit_attempts: 3,
            pawn: PawnPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// parse from json, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json).map_err(|e| LendingError::InvalidTerms {
            reason: format!("engine configuration: {}", e),
        })?;
        if config.max_commit_attempts == 0 {
            return Err(LendingError::invalid_terms("max_commit_attempts must be at least 1"));
        }
        if config.pawn.max_loan_to_value.as_decimal() <= Decimal::ZERO {
            return Err(LendingError::invalid_terms("max_loan_to_value must be positive"));
        }
        Ok(config)
    }
}
