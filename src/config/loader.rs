//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading engine settings
//! and statutory rate tables from YAML files.

use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::calculation::ResolvedStatutoryRates;
use crate::error::{EngineError, EngineResult};
use crate::models::StatutoryRate;

use super::{EngineSettings, StatutoryRateTable};

/// Loads and provides access to engine configuration.
///
/// # Directory Structure
///
/// ```text
/// config/kenya/
/// ├── engine.yaml              # Engine settings
/// └── statutory/
///     ├── paye-2023-07-01.yaml # One statutory rate row per file
///     ├── pension-2024-02-01.yaml
///     └── health-2015-04-01.yaml
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
/// use chrono::NaiveDate;
///
/// let loader = ConfigLoader::load("./config/kenya")?;
/// let rates = loader.rates_for("KE", NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
/// assert!(rates.paye.is_some());
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    settings: EngineSettings,
    rate_table: StatutoryRateTable,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ConfigNotFound`] if `engine.yaml` or the `statutory`
    ///   directory is missing, or the directory holds no rate files
    /// - [`EngineError::ConfigParseError`] if any file is not valid YAML for
    ///   its type
    /// - [`EngineError::Validation`] if two rate rows overlap
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let settings = Self::load_yaml::<EngineSettings>(&path.join("engine.yaml"))?;
        let rates = Self::load_rates(&path.join("statutory"))?;
        let rate_table = StatutoryRateTable::from_rates(rates)?;

        info!(
            path = %path.display(),
            rates = rate_table.len(),
            default_country = %settings.default_country,
            "Loaded payroll configuration"
        );

        Ok(Self {
            settings,
            rate_table,
        })
    }

    /// Builds a loader from values already in memory.
    pub fn from_parts(settings: EngineSettings, rate_table: StatutoryRateTable) -> Self {
        Self {
            settings,
            rate_table,
        }
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads all rate files from the statutory directory, in file name order.
    fn load_rates(rates_dir: &Path) -> EngineResult<Vec<StatutoryRate>> {
        let rates_dir_str = rates_dir.display().to_string();

        let entries = fs::read_dir(rates_dir).map_err(|_| EngineError::ConfigNotFound {
            path: rates_dir_str.clone(),
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: rates_dir_str.clone(),
            })?;
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no rate files found)", rates_dir_str),
            });
        }

        paths
            .iter()
            .map(|path| Self::load_yaml::<StatutoryRate>(path))
            .collect()
    }

    /// Engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The statutory rate table.
    pub fn rate_table(&self) -> &StatutoryRateTable {
        &self.rate_table
    }

    /// Resolves all statutory rates for `country` on `date`.
    pub fn rates_for(&self, country: &str, date: NaiveDate) -> ResolvedStatutoryRates {
        self.rate_table.resolve_all(country, date)
    }
}
