//! Request bodies for the period endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{PaymentDetails, PaymentMethod};
use crate::period::NewPeriod;

/// Request body for `POST /periods`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePeriodRequest {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Display name (e.g., "January 2025").
    pub name: String,
    /// First day of the period (inclusive).
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive).
    pub end_date: NaiveDate,
    /// Date employees are paid.
    pub pay_date: NaiveDate,
}

impl From<CreatePeriodRequest> for NewPeriod {
    fn from(req: CreatePeriodRequest) -> Self {
        NewPeriod {
            tenant_id: req.tenant_id,
            name: req.name,
            start_date: req.start_date,
            end_date: req.end_date,
            pay_date: req.pay_date,
        }
    }
}

/// Request body for `POST /periods/:id/mark-paid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPaidRequest {
    /// Disbursement channel.
    pub method: PaymentMethod,
    /// Batch or transaction reference.
    pub reference: String,
}

impl From<MarkPaidRequest> for PaymentDetails {
    fn from(req: MarkPaidRequest) -> Self {
        PaymentDetails {
            method: req.method,
            reference: req.reference,
        }
    }
}
