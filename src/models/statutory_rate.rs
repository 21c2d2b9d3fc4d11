//! Statutory rate configuration.
//!
//! A [`StatutoryRate`] pairs a country and an effective date range with a
//! strongly-typed [`StatutoryConfig`]. Each rate type carries its own shape:
//! PAYE holds progressive brackets and a flat relief, pension holds a rate and
//! a pensionable-pay cap, health holds fixed-amount tiers.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The statutory deduction a rate row configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    /// Pay-as-you-earn income tax.
    Paye,
    /// Pension fund contribution (NSSF-style).
    Pension,
    /// Health fund contribution (NHIF-style).
    Health,
}

impl RateType {
    /// All rate types in remittance order.
    pub const ALL: [RateType; 3] = [RateType::Paye, RateType::Pension, RateType::Health];

    /// Returns the snake_case name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateType::Paye => "paye",
            RateType::Pension => "pension",
            RateType::Health => "health",
        }
    }
}

impl fmt::Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progressive tax bracket.
///
/// `max = None` means the bracket is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Lower bound of the bracket.
    pub min: Decimal,
    /// Upper bound of the bracket, inclusive.
    #[serde(default)]
    pub max: Option<Decimal>,
    /// Rate as a percentage (e.g., 25 for 25%).
    pub rate: Decimal,
}

/// PAYE configuration: brackets plus a flat monthly personal relief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeConfig {
    /// Brackets; the engine sorts them by `min` before use.
    pub brackets: Vec<TaxBracket>,
    /// Relief subtracted once from total tax.
    #[serde(default)]
    pub relief: Decimal,
}

/// Pension configuration: a rate applied to pay capped at `cap_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PensionConfig {
    /// Contribution rate as a percentage.
    pub rate: Decimal,
    /// Maximum pensionable pay.
    pub cap_amount: Decimal,
}

/// One health fund tier; bounds are inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthTier {
    /// Lower bound of gross pay.
    pub min: Decimal,
    /// Upper bound of gross pay; `None` means unbounded.
    #[serde(default)]
    pub max: Option<Decimal>,
    /// Fixed contribution for the tier.
    pub amount: Decimal,
}

impl HealthTier {
    /// Returns true if `gross_pay` falls inside the tier.
    pub fn contains(&self, gross_pay: Decimal) -> bool {
        self.min <= gross_pay && self.max.is_none_or(|max| gross_pay <= max)
    }
}

/// Health fund configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Tiers in ascending order of `min`.
    pub tiers: Vec<HealthTier>,
}

/// Configuration payload tagged by rate type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatutoryConfig {
    /// Progressive income tax.
    Paye(PayeConfig),
    /// Capped percentage contribution.
    Pension(PensionConfig),
    /// Tiered fixed contribution.
    Health(HealthConfig),
}

impl StatutoryConfig {
    /// Returns the rate type this payload configures.
    pub fn rate_type(&self) -> RateType {
        match self {
            StatutoryConfig::Paye(_) => RateType::Paye,
            StatutoryConfig::Pension(_) => RateType::Pension,
            StatutoryConfig::Health(_) => RateType::Health,
        }
    }
}

/// A versioned statutory rate row for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatutoryRate {
    /// Unique identifier.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// ISO country code (e.g., "KE").
    pub country: String,
    /// First day the rate applies.
    pub effective_from: NaiveDate,
    /// First day the rate no longer applies; `None` is open-ended.
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    /// The typed configuration.
    pub config: StatutoryConfig,
}

impl StatutoryRate {
    /// Returns the rate type of the configuration payload.
    pub fn rate_type(&self) -> RateType {
        self.config.rate_type()
    }

    /// Returns true if the row applies on `date`.
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| date < to)
    }

    /// Returns true if both rows configure the same deduction over shared days.
    pub fn overlaps(&self, other: &StatutoryRate) -> bool {
        self.country.eq_ignore_ascii_case(&other.country)
            && self.rate_type() == other.rate_type()
            && other.effective_to.is_none_or(|to| self.effective_from < to)
            && self.effective_to.is_none_or(|to| other.effective_from < to)
    }
}
