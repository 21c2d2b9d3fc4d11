//! Remittance obligations emitted on lock.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{RateType, Remittance};

/// Receives statutory remittance obligations.
///
/// `record_remittance` is an upsert keyed by (period, tax type): recording
/// the same obligation twice leaves a single row.
pub trait RemittanceSink: Send + Sync {
    /// Records or replaces the obligation for `remittance.period_id` and
    /// `remittance.tax_type`.
    fn record_remittance(&self, remittance: &Remittance) -> EngineResult<()>;
}

/// Remittances held in memory.
#[derive(Debug, Default)]
pub struct InMemoryRemittanceSink {
    rows: RwLock<BTreeMap<(Uuid, RateType), Remittance>>,
}

impl InMemoryRemittanceSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remittances recorded for a period, in tax type order.
    pub fn remittances_for(&self, period_id: Uuid) -> EngineResult<Vec<Remittance>> {
        let rows = self.rows.read();
        Ok(rows
            .range((period_id, RateType::Paye)..=(period_id, RateType::Health))
            .map(|(_, r)| r.clone())
            .collect())
    }

    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RemittanceSink for InMemoryRemittanceSink {
    fn record_remittance(&self, remittance: &Remittance) -> EngineResult<()> {
        self.rows.write().insert(
            (remittance.period_id, remittance.tax_type),
            remittance.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn remittance(period_id: Uuid, tax_type: RateType, amount: i64) -> Remittance {
        Remittance {
            period_id,
            tax_type,
            amount: Decimal::from(amount),
            due_date: NaiveDate::from_ymd_opt(2025, 2, 9).unwrap(),
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let sink = InMemoryRemittanceSink::new();
        let period = Uuid::new_v4();
        sink.record_remittance(&remittance(period, RateType::Paye, 100))
            .unwrap();
        sink.record_remittance(&remittance(period, RateType::Paye, 100))
            .unwrap();
        sink.record_remittance(&remittance(period, RateType::Health, 50))
            .unwrap();
        sink.record_remittance(&remittance(Uuid::new_v4(), RateType::Paye, 10))
            .unwrap();

        let rows = sink.remittances_for(period).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tax_type, RateType::Paye);
        assert_eq!(rows[1].tax_type, RateType::Health);
        assert_eq!(sink.len(), 3);
    }
}
