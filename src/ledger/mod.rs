//! Employee loan ledger.
//!
//! [`loan_ledger`](self) functions are the balance arithmetic; [`LoanLedger`]
//! applies them to the store and records every balance change for audit.

mod loan_ledger;
mod service;

pub use loan_ledger::{
    NewLoan, RepaymentRequest, approve_loan, book_repayment, create_loan, reverse_repayment,
    write_off_loan,
};
pub use service::{LoanLedger, audit_loan_balance, audit_loan_posting};
