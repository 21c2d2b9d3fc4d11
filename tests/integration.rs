//! Integration tests for the payroll engine.
//!
//! This suite drives the public API end to end:
//! - Statutory deductions on reference rate tables
//! - Period lifecycle and payroll invariants
//! - Loan ledger across consecutive periods
//! - Reprocessing and lock idempotence
//! - Concurrent processing of one period
//! - HTTP endpoints
//! - Property tests on the calculation primitives

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use payroll_engine::api::{ACTOR_HEADER, AppState, create_router};
use payroll_engine::calculation::{compute_health_contribution, compute_paye};
use payroll_engine::collaborators::{InMemoryDirectory, InMemoryRemittanceSink, RecordingAuditSink};
use payroll_engine::config::{ConfigLoader, EngineSettings, StatutoryRateTable};
use payroll_engine::error::EngineError;
use payroll_engine::ledger::{NewLoan, approve_loan, create_loan};
use payroll_engine::models::{
    CalculationMode, ComponentCategory, ComponentKind, Employee, EmployeeLoan,
    EmployeeSalaryComponent, HealthConfig, HealthTier, LoanStatus, PayeConfig, PaymentDetails,
    PaymentMethod, PayrollStatus, PensionConfig, PeriodStatus, RateType, SalaryComponent,
    StatutoryConfig, StatutoryRate, TaxBracket,
};
use payroll_engine::period::{NewPeriod, PeriodService};
use payroll_engine::store::{InMemoryStore, PayrollStore};

// =============================================================================
// Test Helpers
// =============================================================================

fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn reference_brackets() -> Vec<TaxBracket> {
    vec![
        TaxBracket { min: decimal("0"), max: Some(decimal("24000")), rate: decimal("10") },
        TaxBracket { min: decimal("24001"), max: Some(decimal("32333")), rate: decimal("25") },
        TaxBracket { min: decimal("32334"), max: None, rate: decimal("30") },
    ]
}

fn reference_tiers() -> Vec<HealthTier> {
    [
        ("0", "5999", "150"),
        ("6000", "7999", "300"),
        ("8000", "11999", "400"),
        ("12000", "14999", "500"),
        ("15000", "19999", "600"),
        ("20000", "24999", "750"),
        ("25000", "29999", "850"),
        ("30000", "34999", "900"),
        ("35000", "39999", "950"),
        ("40000", "44999", "1000"),
    ]
    .into_iter()
    .map(|(min, max, amount)| HealthTier {
        min: decimal(min),
        max: Some(decimal(max)),
        amount: decimal(amount),
    })
    .collect()
}

/// Reference KE rates: three PAYE brackets, 6% pension capped at 18,000,
/// bounded health tiers topping out at 44,999.
fn reference_config() -> ConfigLoader {
    let rate = |config: StatutoryConfig| StatutoryRate {
        id: Uuid::new_v4(),
        country: "KE".to_string(),
        effective_from: date(2020, 1, 1),
        effective_to: None,
        config,
    };
    let table = StatutoryRateTable::from_rates(vec![
        rate(StatutoryConfig::Paye(PayeConfig {
            brackets: reference_brackets(),
            relief: decimal("2400"),
        })),
        rate(StatutoryConfig::Pension(PensionConfig {
            rate: decimal("6"),
            cap_amount: decimal("18000"),
        })),
        rate(StatutoryConfig::Health(HealthConfig {
            tiers: reference_tiers(),
        })),
    ])
    .expect("reference rates are valid");

    let settings = EngineSettings {
        worker_pool_limit: Some(4),
        ..EngineSettings::default()
    };
    ConfigLoader::from_parts(settings, table)
}

struct TestTenant {
    service: Arc<PeriodService>,
    store: Arc<InMemoryStore>,
    directory: Arc<InMemoryDirectory>,
    remittances: Arc<InMemoryRemittanceSink>,
    audit: Arc<RecordingAuditSink>,
    tenant_id: Uuid,
    basic: SalaryComponent,
}

fn create_test_tenant() -> TestTenant {
    let store = Arc::new(InMemoryStore::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let remittances = Arc::new(InMemoryRemittanceSink::new());
    let audit = Arc::new(RecordingAuditSink::new());

    let service = PeriodService::new(store.clone(), Arc::new(reference_config()), directory.clone())
        .with_remittance_sink(remittances.clone())
        .with_audit_sink(audit.clone());

    let tenant_id = Uuid::new_v4();
    let basic = SalaryComponent {
        id: Uuid::new_v4(),
        tenant_id,
        name: "Basic Salary".to_string(),
        code: "BASIC".to_string(),
        kind: ComponentKind::Earning,
        category: ComponentCategory::Basic,
        calculation: CalculationMode::Fixed,
        is_taxable: true,
        statutory_type: None,
        is_active: true,
    };
    store.save_component(basic.clone()).unwrap();

    TestTenant {
        service: Arc::new(service),
        store,
        directory,
        remittances,
        audit,
        tenant_id,
        basic,
    }
}

impl TestTenant {
    fn hire(&self, number: &str, basic: &str) -> Employee {
        let employee = Employee {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            employee_number: number.to_string(),
            full_name: format!("Employee {number}"),
            country: "KE".to_string(),
            hire_date: date(2022, 1, 1),
            termination_date: None,
            is_active: true,
        };
        self.directory.upsert(employee.clone()).unwrap();
        self.store
            .insert_assignment(EmployeeSalaryComponent {
                id: Uuid::new_v4(),
                employee_id: employee.id,
                component_id: self.basic.id,
                amount: decimal(basic),
                effective_from: date(2024, 1, 1),
                effective_to: None,
            })
            .unwrap();
        employee
    }

    fn lend(&self, employee: &Employee, principal: &str, installment: &str) -> EmployeeLoan {
        let loan = create_loan(
            Uuid::new_v4(),
            NewLoan {
                tenant_id: self.tenant_id,
                employee_id: employee.id,
                principal: decimal(principal),
                interest_rate: Decimal::ZERO,
                monthly_deduction: decimal(installment),
                purpose: None,
            },
        )
        .unwrap();
        let active = approve_loan(&loan, date(2025, 1, 1)).unwrap();
        self.store.insert_loan(active.clone()).unwrap();
        active
    }

    fn month(&self, month: u32) -> Uuid {
        let end = if month == 12 {
            date(2025, 12, 31)
        } else {
            date(2025, month + 1, 1).pred_opt().unwrap()
        };
        self.service
            .create_period(NewPeriod {
                tenant_id: self.tenant_id,
                name: format!("2025-{month:02}"),
                start_date: date(2025, month, 1),
                end_date: end,
                pay_date: date(2025, month, 25),
            })
            .unwrap()
            .id
    }

    async fn close(&self, period_id: Uuid) {
        self.service.process(period_id, "payroll-officer").await.unwrap();
        self.service.approve(period_id, "finance").unwrap();
        self.service.lock(period_id, "finance").unwrap();
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ACTOR_HEADER, "integration");
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn json_decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => decimal(s),
        other => decimal(&other.to_string()),
    }
}

// =============================================================================
// SECTION 1: Statutory deductions on reference rates
// =============================================================================

#[tokio::test]
async fn test_reference_statutory_figures() {
    let tenant = create_test_tenant();
    let senior = tenant.hire("EMP-001", "50000");
    let junior = tenant.hire("EMP-002", "30000");
    let mid = tenant.hire("EMP-003", "45000");
    let period_id = tenant.month(1);

    let summary = tenant.service.process(period_id, "ops").await.unwrap();
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);

    let payrolls = tenant.service.payrolls(period_id).unwrap();
    let row = |employee: &Employee| {
        payrolls
            .iter()
            .find(|p| p.employee_id == employee.id)
            .cloned()
            .unwrap()
    };

    let senior = row(&senior);
    assert_eq!(senior.paye, decimal("7383.05"));
    assert_eq!(senior.pension, decimal("1080"));
    assert_eq!(senior.health, decimal("1000"));
    assert_eq!(senior.net_pay, decimal("40536.95"));

    // 30,000 exceeds the pension cap; bracket two is taxed from 24,000.
    let junior = row(&junior);
    assert_eq!(junior.pension, decimal("1080"));
    assert_eq!(junior.paye, decimal("1500"));
    assert_eq!(junior.health, decimal("900"));

    // Above every bounded tier: the top tier applies.
    let mid = row(&mid);
    assert_eq!(mid.health, decimal("1000"));
    assert_eq!(mid.paye, decimal("5883.05"));
}

#[test]
fn test_paye_worked_example() {
    let result = compute_paye(decimal("50000"), &reference_brackets(), decimal("2400"));
    assert_eq!(result.amount, decimal("7383.05"));
    assert_eq!(result.gross_tax, decimal("9783.05"));
    assert_eq!(result.portions.len(), 3);
}

// =============================================================================
// SECTION 2: Lifecycle and payroll invariants
// =============================================================================

#[tokio::test]
async fn test_payroll_rows_balance() {
    let tenant = create_test_tenant();
    tenant.hire("EMP-001", "50000");
    tenant.hire("EMP-002", "30000");
    tenant.hire("EMP-003", "45000");
    let period_id = tenant.month(1);
    tenant.service.process(period_id, "ops").await.unwrap();

    for payroll in tenant.service.payrolls(period_id).unwrap() {
        assert_eq!(payroll.status, PayrollStatus::Calculated);
        assert_eq!(payroll.net_pay, payroll.total_earnings - payroll.total_deductions);
        assert!(payroll.total_deductions >= payroll.paye + payroll.pension + payroll.health);

        let items = tenant.service.payroll_items(payroll.id).unwrap();
        let earnings: Decimal = items
            .iter()
            .filter(|i| i.kind == ComponentKind::Earning)
            .map(|i| i.amount)
            .sum();
        let deductions: Decimal = items
            .iter()
            .filter(|i| i.kind == ComponentKind::Deduction)
            .map(|i| i.amount)
            .sum();
        assert_eq!(earnings, payroll.total_earnings);
        assert_eq!(deductions, payroll.total_deductions);
    }
}

#[tokio::test]
async fn test_lifecycle_totals_and_remittances() {
    let tenant = create_test_tenant();
    tenant.hire("EMP-001", "50000");
    tenant.hire("EMP-002", "30000");
    tenant.hire("EMP-003", "45000");
    let period_id = tenant.month(1);

    tenant.service.process(period_id, "ops").await.unwrap();
    let approved = tenant.service.approve(period_id, "finance").unwrap();
    assert_eq!(approved.status, PeriodStatus::Approved);
    assert_eq!(approved.totals.employee_count, 3);
    assert_eq!(approved.totals.total_gross, decimal("125000"));
    assert_eq!(approved.totals.total_deductions, decimal("20906.10"));
    assert_eq!(approved.totals.total_net, decimal("104093.90"));

    tenant
        .service
        .mark_paid(
            period_id,
            PaymentDetails {
                method: PaymentMethod::BankTransfer,
                reference: "EFT-0001".to_string(),
            },
            "finance",
        )
        .unwrap();
    let locked = tenant.service.lock(period_id, "finance").unwrap();
    assert_eq!(locked.status, PeriodStatus::Locked);

    let remittances = tenant.remittances.remittances_for(period_id).unwrap();
    let amount = |tax_type: RateType| {
        remittances
            .iter()
            .find(|r| r.tax_type == tax_type)
            .map(|r| r.amount)
            .unwrap()
    };
    assert_eq!(remittances.len(), 3);
    assert_eq!(amount(RateType::Paye), decimal("14766.10"));
    assert_eq!(amount(RateType::Pension), decimal("3240"));
    assert_eq!(amount(RateType::Health), decimal("2900"));
    assert!(remittances.iter().all(|r| r.due_date == date(2025, 2, 9)));
}

#[tokio::test]
async fn test_overlapping_period_rejected_per_tenant() {
    let tenant = create_test_tenant();
    tenant.month(3);

    let overlap = tenant.service.create_period(NewPeriod {
        tenant_id: tenant.tenant_id,
        name: "Spill-over".to_string(),
        start_date: date(2025, 3, 31),
        end_date: date(2025, 4, 29),
        pay_date: date(2025, 4, 25),
    });
    assert!(matches!(overlap, Err(EngineError::PeriodOverlap { .. })));

    let other_tenant = tenant.service.create_period(NewPeriod {
        tenant_id: Uuid::new_v4(),
        name: "2025-03".to_string(),
        start_date: date(2025, 3, 1),
        end_date: date(2025, 3, 31),
        pay_date: date(2025, 3, 25),
    });
    assert!(other_tenant.is_ok());
}

// =============================================================================
// SECTION 3: Loan ledger across periods
// =============================================================================

#[tokio::test]
async fn test_loan_balance_never_increases_and_completes_at_zero() {
    let tenant = create_test_tenant();
    let borrower = tenant.hire("EMP-001", "50000");
    let loan = tenant.lend(&borrower, "5000", "2000");

    let mut balances = vec![loan.remaining_balance];
    for month in 1..=4 {
        let period_id = tenant.month(month);
        tenant.close(period_id).await;
        balances.push(tenant.store.loan(loan.id).unwrap().remaining_balance);
    }

    assert_eq!(
        balances,
        vec![
            decimal("5000"),
            decimal("3000"),
            decimal("1000"),
            decimal("0"),
            decimal("0"),
        ]
    );
    let settled = tenant.store.loan(loan.id).unwrap();
    assert_eq!(settled.status, LoanStatus::Completed);
    assert_eq!(settled.total_paid, settled.total_amount);

    let repayments = tenant.store.loan_repayments(loan.id).unwrap();
    assert_eq!(repayments.len(), 3);
    assert_eq!(repayments[2].amount, decimal("1000"));
}

// =============================================================================
// SECTION 4: Reprocessing and lock idempotence
// =============================================================================

#[tokio::test]
async fn test_reprocess_after_reopen_is_idempotent() {
    let tenant = create_test_tenant();
    let borrower = tenant.hire("EMP-001", "50000");
    tenant.hire("EMP-002", "30000");
    let loan = tenant.lend(&borrower, "9000", "1500");
    let period_id = tenant.month(1);

    tenant.service.process(period_id, "ops").await.unwrap();
    let mut first = tenant.service.payrolls(period_id).unwrap();
    first.sort_by_key(|p| p.id);
    let loan_after_first = tenant.store.loan(loan.id).unwrap();

    tenant.service.reopen(period_id, "ops").unwrap();
    tenant.service.process(period_id, "ops").await.unwrap();
    let mut second = tenant.service.payrolls(period_id).unwrap();
    second.sort_by_key(|p| p.id);

    assert_eq!(first, second);
    assert_eq!(tenant.store.loan(loan.id).unwrap(), loan_after_first);
    assert_eq!(tenant.store.loan_repayments(loan.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_repeated_lock_does_not_duplicate_remittances() {
    let tenant = create_test_tenant();
    tenant.hire("EMP-001", "50000");
    let period_id = tenant.month(1);
    tenant.close(period_id).await;

    let before = tenant.remittances.remittances_for(period_id).unwrap();
    let again = tenant.service.lock(period_id, "finance").unwrap();
    assert_eq!(again.status, PeriodStatus::Locked);
    assert_eq!(tenant.remittances.remittances_for(period_id).unwrap(), before);

    let locked_entries = tenant
        .audit
        .entries_for(period_id)
        .into_iter()
        .filter(|e| e.new_value.as_deref() == Some("locked"))
        .count();
    assert_eq!(locked_entries, 1);
}

#[tokio::test]
async fn test_locked_period_is_immutable() {
    let tenant = create_test_tenant();
    tenant.hire("EMP-001", "50000");
    let period_id = tenant.month(1);
    tenant.close(period_id).await;

    assert!(matches!(
        tenant.service.process(period_id, "ops").await,
        Err(EngineError::PeriodLocked { .. })
    ));
    assert!(matches!(
        tenant.service.approve(period_id, "ops"),
        Err(EngineError::PeriodLocked { .. })
    ));
}

// =============================================================================
// SECTION 5: Approval policy
// =============================================================================

#[tokio::test]
async fn test_failed_payroll_blocks_approval_and_totals_exclude_it() {
    let tenant = create_test_tenant();
    tenant.hire("EMP-001", "50000");
    let overdrawn = tenant.hire("EMP-002", "8000");
    let advance = SalaryComponent {
        id: Uuid::new_v4(),
        tenant_id: tenant.tenant_id,
        name: "Salary Advance".to_string(),
        code: "ADVANCE".to_string(),
        kind: ComponentKind::Deduction,
        category: ComponentCategory::OtherDeduction,
        calculation: CalculationMode::Fixed,
        is_taxable: false,
        statutory_type: None,
        is_active: true,
    };
    tenant.store.save_component(advance.clone()).unwrap();
    tenant
        .store
        .insert_assignment(EmployeeSalaryComponent {
            id: Uuid::new_v4(),
            employee_id: overdrawn.id,
            component_id: advance.id,
            amount: decimal("20000"),
            effective_from: date(2024, 1, 1),
            effective_to: None,
        })
        .unwrap();
    let period_id = tenant.month(1);

    let summary = tenant.service.process(period_id, "ops").await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].employee_id, overdrawn.id);

    let view = tenant.service.summary(period_id).unwrap();
    assert_eq!(view.failed_payrolls, 1);
    assert_eq!(view.totals.employee_count, 1);
    assert_eq!(view.totals.total_gross, decimal("50000"));

    assert!(matches!(
        tenant.service.approve(period_id, "finance"),
        Err(EngineError::Validation { .. })
    ));
}

// =============================================================================
// SECTION 6: Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_process_calls_do_not_duplicate_rows() {
    let tenant = create_test_tenant();
    for n in 0..20 {
        tenant.hire(&format!("EMP-{n:03}"), "40000");
    }
    let period_id = tenant.month(1);

    let first = tenant.service.clone();
    let second = tenant.service.clone();
    let (a, b) = tokio::join!(
        async move { first.process(period_id, "worker-a").await },
        async move { second.process(period_id, "worker-b").await },
    );

    let results = [a, b];
    assert!(results.iter().any(|r| r.is_ok()));
    for result in &results {
        if let Err(error) = result {
            assert!(
                matches!(error, EngineError::ConcurrencyConflict { .. }),
                "unexpected error: {error}"
            );
            assert!(error.is_retryable());
        }
    }
    assert_eq!(tenant.service.payrolls(period_id).unwrap().len(), 20);
}

// =============================================================================
// SECTION 7: HTTP API
// =============================================================================

#[tokio::test]
async fn test_http_period_lifecycle() {
    let tenant = create_test_tenant();
    tenant.hire("EMP-001", "50000");
    let service = Arc::try_unwrap(tenant.service).ok().unwrap();
    let router = create_router(AppState::new(service));

    let (status, period) = send(
        &router,
        "POST",
        "/periods",
        Some(json!({
            "tenant_id": tenant.tenant_id,
            "name": "January 2025",
            "start_date": "2025-01-01",
            "end_date": "2025-01-31",
            "pay_date": "2025-01-25"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = period["id"].as_str().unwrap().to_string();

    let (status, summary) = send(&router, "POST", &format!("/periods/{id}/process"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["succeeded"], 1);

    let (status, payrolls) = send(&router, "GET", &format!("/periods/{id}/payrolls"), None).await;
    assert_eq!(status, StatusCode::OK);
    let payroll = &payrolls.as_array().unwrap()[0];
    assert_eq!(json_decimal(&payroll["paye"]), decimal("7383.05"));

    let payroll_id = payroll["id"].as_str().unwrap();
    let (status, items) = send(&router, "GET", &format!("/payrolls/{payroll_id}/items"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(items.as_array().unwrap().len() >= 4);

    let (status, _) = send(&router, "POST", &format!("/periods/{id}/approve"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, paid) = send(
        &router,
        "POST",
        &format!("/periods/{id}/mark-paid"),
        Some(json!({ "method": "mobile_money", "reference": "MM-778" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");

    let (status, locked) = send(&router, "POST", &format!("/periods/{id}/lock"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(locked["status"], "locked");

    let (status, error) = send(&router, "POST", &format!("/periods/{id}/reopen"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "PERIOD_LOCKED");

    let (status, view) = send(&router, "GET", &format!("/periods/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["period"]["status"], "locked");
    assert_eq!(json_decimal(&view["totals"]["total_gross"]), decimal("50000"));
}

#[tokio::test]
async fn test_http_unknown_period_is_not_found() {
    let tenant = create_test_tenant();
    let service = Arc::try_unwrap(tenant.service).ok().unwrap();
    let router = create_router(AppState::new(service));

    let uri = format!("/periods/{}/process", Uuid::new_v4());
    let (status, error) = send(&router, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "NOT_FOUND");
}

// =============================================================================
// SECTION 8: Property tests
// =============================================================================

proptest! {
    #[test]
    fn prop_paye_is_non_negative_and_monotonic(
        low in 0i64..2_000_000,
        step in 0i64..500_000,
    ) {
        let brackets = reference_brackets();
        let relief = decimal("2400");
        let lower = compute_paye(Decimal::from(low), &brackets, relief).amount;
        let higher = compute_paye(Decimal::from(low + step), &brackets, relief).amount;
        prop_assert!(lower >= Decimal::ZERO);
        prop_assert!(higher >= lower);
    }

    #[test]
    fn prop_health_always_returns_a_configured_amount(gross in 0i64..1_000_000) {
        let tiers = reference_tiers();
        let result = compute_health_contribution(Decimal::from(gross), &tiers);
        prop_assert!(tiers.iter().any(|t| t.amount == result.amount));
    }
}
