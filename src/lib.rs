//! Payroll batch calculation engine.
//!
//! This crate calculates multi-tenant payroll for a period: it resolves each
//! employee's salary structure, computes statutory deductions (PAYE, pension
//! and health contributions) from versioned rate tables, takes loan
//! installments against the loan ledger, and drives the period through its
//! approval and locking lifecycle.
//!
//! # Example
//!
//! ```
//! use payroll_engine::calculation::compute_paye;
//! use payroll_engine::models::TaxBracket;
//! use rust_decimal::Decimal;
//! use std::str::FromStr;
//!
//! let d = |s: &str| Decimal::from_str(s).unwrap();
//! let brackets = vec![
//!     TaxBracket { min: d("0"), max: Some(d("24000")), rate: d("10") },
//!     TaxBracket { min: d("24001"), max: Some(d("32333")), rate: d("25") },
//!     TaxBracket { min: d("32334"), max: None, rate: d("30") },
//! ];
//! let paye = compute_paye(d("50000"), &brackets, d("2400"));
//! assert_eq!(paye.amount, d("7383.05"));
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod period;
pub mod processing;
pub mod store;
pub mod structure;
