//! Configuration loading and management for the payroll engine.
//!
//! This module loads engine settings and effective-dated statutory rate
//! tables from YAML files, and resolves the rates in force for a country on
//! a date.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/kenya").unwrap();
//! println!("Loaded {} statutory rates", config.rate_table().len());
//! ```

mod loader;
mod rate_table;
mod types;

pub use loader::ConfigLoader;
pub use rate_table::StatutoryRateTable;
pub use types::EngineSettings;
