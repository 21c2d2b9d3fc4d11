//! The pure per-employee payroll pipeline.
//!
//! Given a resolved salary structure, the statutory rates in force and the
//! planned loan installments, produces every figure and line item of one
//! payroll. Nothing here touches storage; committing the result is the
//! orchestrator's job.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    LoanDeduction, ResolvedStatutoryRates, ResolvedStructure, compute_statutory_deductions,
};
use crate::models::{
    ComponentCategory, ComponentKind, Payroll, PayrollItem, PayrollStatus, PayrollWarning,
    RateType,
};

/// A payroll line before identifiers are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    /// Originating component; `None` for engine-generated lines.
    pub component_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Earning or deduction.
    pub kind: ComponentKind,
    /// Reporting category.
    pub category: ComponentCategory,
    /// Line amount.
    pub amount: Decimal,
    /// Counted toward taxable income.
    pub is_taxable: bool,
    /// Derivation.
    pub calculation_detail: serde_json::Value,
}

/// Every figure of one employee's payroll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeePayrollCalculation {
    /// Sum of earning lines.
    pub gross_pay: Decimal,
    /// Sum of taxable earning lines.
    pub taxable_income: Decimal,
    /// PAYE withheld.
    pub paye: Decimal,
    /// Pension contribution withheld.
    pub pension: Decimal,
    /// Health contribution withheld.
    pub health: Decimal,
    /// Loan installments withheld.
    pub loan_deductions: Decimal,
    /// Non-statutory deduction components.
    pub other_deductions: Decimal,
    /// All deductions.
    pub total_deductions: Decimal,
    /// `gross_pay - total_deductions`.
    pub net_pay: Decimal,
    /// Line items, earnings first.
    pub items: Vec<ItemDraft>,
    /// Installments to book against the loan ledger.
    pub loan_plan: Vec<LoanDeduction>,
    /// Configuration gaps from resolution and statutory calculation.
    pub warnings: Vec<PayrollWarning>,
}

impl EmployeePayrollCalculation {
    /// True when deductions exceed earnings.
    pub fn has_negative_net_pay(&self) -> bool {
        self.net_pay < Decimal::ZERO
    }

    /// Builds the payroll row and its items.
    ///
    /// Item ids are derived from the payroll id and the line position, so
    /// the same calculation always yields the same rows.
    pub fn into_payroll(
        self,
        payroll_id: Uuid,
        period_id: Uuid,
        employee_id: Uuid,
    ) -> (Payroll, Vec<PayrollItem>) {
        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(index, draft)| PayrollItem {
                id: item_id(payroll_id, index),
                payroll_id,
                component_id: draft.component_id,
                name: draft.name,
                kind: draft.kind,
                category: draft.category,
                amount: draft.amount,
                is_taxable: draft.is_taxable,
                calculation_detail: draft.calculation_detail,
            })
            .collect();

        let payroll = Payroll {
            id: payroll_id,
            period_id,
            employee_id,
            gross_pay: self.gross_pay,
            total_earnings: self.gross_pay,
            taxable_income: self.taxable_income,
            total_deductions: self.total_deductions,
            net_pay: self.net_pay,
            paye: self.paye,
            pension: self.pension,
            health: self.health,
            loan_deductions: self.loan_deductions,
            other_deductions: self.other_deductions,
            status: PayrollStatus::Calculated,
            failure_reason: None,
            warnings: self.warnings,
            payment_method: None,
            payment_reference: None,
        };

        (payroll, items)
    }
}

/// Deterministic id of the `index`-th line of a payroll.
pub fn item_id(payroll_id: Uuid, index: usize) -> Uuid {
    Uuid::new_v5(&payroll_id, format!("item-{index}").as_bytes())
}

fn statutory_name(rate_type: RateType) -> &'static str {
    match rate_type {
        RateType::Paye => "PAYE",
        RateType::Pension => "Pension Contribution",
        RateType::Health => "Health Insurance",
    }
}

/// Runs the calculation steps for one employee.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::{
///     ResolvedStatutoryRates, ResolvedStructure, calculate_employee_payroll,
/// };
///
/// let result = calculate_employee_payroll(
///     &ResolvedStructure::default(),
///     &ResolvedStatutoryRates::default(),
///     &[],
/// );
/// assert!(result.net_pay.is_zero());
/// assert_eq!(result.warnings.len(), 3);
/// ```
pub fn calculate_employee_payroll(
    structure: &ResolvedStructure,
    rates: &ResolvedStatutoryRates,
    loan_plan: &[LoanDeduction],
) -> EmployeePayrollCalculation {
    let mut items = Vec::new();

    let mut gross_pay = Decimal::ZERO;
    let mut taxable_income = Decimal::ZERO;
    for line in structure.earnings() {
        gross_pay += line.amount;
        if line.is_taxable {
            taxable_income += line.amount;
        }
        items.push(ItemDraft {
            component_id: Some(line.component_id),
            name: line.name.clone(),
            kind: ComponentKind::Earning,
            category: line.category,
            amount: line.amount,
            is_taxable: line.is_taxable,
            calculation_detail: line.detail.clone(),
        });
    }

    let statutory = compute_statutory_deductions(rates, taxable_income, gross_pay);
    for line in &statutory.lines {
        items.push(ItemDraft {
            component_id: None,
            name: statutory_name(line.rate_type).to_string(),
            kind: ComponentKind::Deduction,
            category: ComponentCategory::Statutory,
            amount: line.amount,
            is_taxable: false,
            calculation_detail: line.detail.clone(),
        });
    }

    let mut loan_deductions = Decimal::ZERO;
    for deduction in loan_plan {
        loan_deductions += deduction.amount;
        items.push(ItemDraft {
            component_id: None,
            name: "Loan Repayment".to_string(),
            kind: ComponentKind::Deduction,
            category: ComponentCategory::Loan,
            amount: deduction.amount,
            is_taxable: false,
            calculation_detail: serde_json::json!({
                "loan_id": deduction.loan_id,
                "balance_before": deduction.balance_before.to_string(),
                "balance_after": deduction.balance_after().to_string(),
            }),
        });
    }

    let mut other_deductions = Decimal::ZERO;
    for line in structure.other_deductions() {
        other_deductions += line.amount;
        items.push(ItemDraft {
            component_id: Some(line.component_id),
            name: line.name.clone(),
            kind: ComponentKind::Deduction,
            category: line.category,
            amount: line.amount,
            is_taxable: false,
            calculation_detail: line.detail.clone(),
        });
    }

    let total_deductions = statutory.total() + loan_deductions + other_deductions;
    let net_pay = gross_pay - total_deductions;

    let mut warnings = structure.warnings.clone();
    warnings.extend(statutory.warnings.iter().cloned());

    EmployeePayrollCalculation {
        gross_pay,
        taxable_income,
        paye: statutory.paye,
        pension: statutory.pension,
        health: statutory.health,
        loan_deductions,
        other_deductions,
        total_deductions,
        net_pay,
        items,
        loan_plan: loan_plan.to_vec(),
        warnings,
    }
}
