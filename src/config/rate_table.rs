//! Effective-dated statutory rate lookup.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::calculation::ResolvedStatutoryRates;
use crate::error::{EngineError, EngineResult};
use crate::models::{RateType, StatutoryConfig, StatutoryRate};

/// All statutory rate rows known to the engine.
///
/// Rows for the same (country, rate type) never overlap: [`insert`] rejects
/// a row whose effective range intersects an existing one, so a lookup is
/// always unambiguous.
///
/// [`insert`]: StatutoryRateTable::insert
///
/// # Example
///
/// ```
/// use payroll_engine::config::StatutoryRateTable;
/// use payroll_engine::models::{PensionConfig, RateType, StatutoryConfig, StatutoryRate};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
/// use uuid::Uuid;
///
/// let mut table = StatutoryRateTable::new();
/// table.insert(StatutoryRate {
///     id: Uuid::new_v4(),
///     country: "KE".to_string(),
///     effective_from: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
///     effective_to: None,
///     config: StatutoryConfig::Pension(PensionConfig {
///         rate: Decimal::from(6),
///         cap_amount: Decimal::from(36_000),
///     }),
/// })?;
///
/// let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
/// assert!(table.resolve("KE", RateType::Pension, date).is_ok());
/// assert!(table.resolve("KE", RateType::Paye, date).is_err());
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatutoryRateTable {
    rates: Vec<StatutoryRate>,
}

impl StatutoryRateTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rows, validating each as it is inserted.
    pub fn from_rates<I>(rates: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = StatutoryRate>,
    {
        let mut table = Self::new();
        for rate in rates {
            table.insert(rate)?;
        }
        Ok(table)
    }

    /// Adds a rate row.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if the row is malformed or
    /// overlaps an existing row for the same country and rate type.
    pub fn insert(&mut self, rate: StatutoryRate) -> EngineResult<()> {
        validate_rate(&rate)?;

        if let Some(existing) = self.rates.iter().find(|r| r.overlaps(&rate)) {
            return Err(EngineError::validation(format!(
                "{} rate for '{}' effective {} overlaps rate {} effective {}",
                rate.rate_type(),
                rate.country,
                rate.effective_from,
                existing.id,
                existing.effective_from
            )));
        }

        self.rates.push(rate);
        self.rates.sort_by(|a, b| {
            (&a.country, a.rate_type(), a.effective_from)
                .cmp(&(&b.country, b.rate_type(), b.effective_from))
        });
        Ok(())
    }

    /// All rows, ordered by country, type and effective date.
    pub fn rates(&self) -> &[StatutoryRate] {
        &self.rates
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Finds the row in force for `country` and `rate_type` on `date`.
    ///
    /// A row is in force when `effective_from <= date < effective_to`; the
    /// latest `effective_from` wins.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingStatutoryRate`] when no row applies.
    pub fn resolve(
        &self,
        country: &str,
        rate_type: RateType,
        date: NaiveDate,
    ) -> EngineResult<&StatutoryRate> {
        self.rates
            .iter()
            .filter(|r| {
                r.country.eq_ignore_ascii_case(country)
                    && r.rate_type() == rate_type
                    && r.is_effective_on(date)
            })
            .max_by_key(|r| r.effective_from)
            .ok_or_else(|| EngineError::MissingStatutoryRate {
                country: country.to_string(),
                rate_type: rate_type.to_string(),
                date,
            })
    }

    /// Resolves every rate type for `country` on `date`.
    ///
    /// Missing types are left as `None`; the calculation turns them into
    /// warnings.
    pub fn resolve_all(&self, country: &str, date: NaiveDate) -> ResolvedStatutoryRates {
        let mut resolved = ResolvedStatutoryRates {
            country: country.to_string(),
            as_of: Some(date),
            ..Default::default()
        };

        for rate_type in RateType::ALL {
            match self.resolve(country, rate_type, date) {
                Ok(rate) => match &rate.config {
                    StatutoryConfig::Paye(config) => resolved.paye = Some(config.clone()),
                    StatutoryConfig::Pension(config) => resolved.pension = Some(config.clone()),
                    StatutoryConfig::Health(config) => resolved.health = Some(config.clone()),
                },
                Err(error) => debug!(%error, "Statutory rate not resolved"),
            }
        }

        resolved
    }
}

fn validate_rate(rate: &StatutoryRate) -> EngineResult<()> {
    if rate.country.trim().is_empty() {
        return Err(EngineError::validation("Statutory rate country must not be empty"));
    }
    if rate.effective_to.is_some_and(|to| to <= rate.effective_from) {
        return Err(EngineError::validation(format!(
            "{} rate for '{}' ends before it starts",
            rate.rate_type(),
            rate.country
        )));
    }

    let percent = |value: Decimal| value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED;

    match &rate.config {
        StatutoryConfig::Paye(paye) => {
            for bracket in &paye.brackets {
                if !percent(bracket.rate) {
                    return Err(EngineError::validation(format!(
                        "PAYE bracket starting at {} has rate {} outside 0..=100",
                        bracket.min, bracket.rate
                    )));
                }
                if bracket.max.is_some_and(|max| max < bracket.min) {
                    return Err(EngineError::validation(format!(
                        "PAYE bracket starting at {} has max below min",
                        bracket.min
                    )));
                }
            }
            if paye.brackets.iter().filter(|b| b.max.is_none()).count() > 1 {
                return Err(EngineError::validation(
                    "PAYE table has more than one open-ended bracket",
                ));
            }
        }
        StatutoryConfig::Pension(pension) => {
            if !percent(pension.rate) || pension.cap_amount < Decimal::ZERO {
                return Err(EngineError::validation(format!(
                    "Pension rate {} or cap {} is invalid",
                    pension.rate, pension.cap_amount
                )));
            }
        }
        StatutoryConfig::Health(health) => {
            if health
                .tiers
                .iter()
                .any(|t| t.amount < Decimal::ZERO || t.max.is_some_and(|max| max < t.min))
            {
                return Err(EngineError::validation("Health tier has invalid bounds or amount"));
            }
        }
    }

    Ok(())
}
