use chrono::{Duration, Utc};
use studio_platform_shared::{InstallmentFrequency, InstallmentStatus, PaymentPlanMethod};
use uuid::Uuid;

use crate::models::{Installment, Order, PaymentPlan};
use crate::payment::GatewayIntentStatus;
use crate::services::test_support::{self, harness};

fn plan(
    method: PaymentPlanMethod,
    customer: Option<&str>,
    payment_method: Option<&str>,
) -> PaymentPlan {
    PaymentPlan {
        id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        template_id: Uuid::new_v4(),
        method,
        total_amount: 9999,
        number_of_installments: 3,
        frequency: InstallmentFrequency::Monthly,
        stripe_customer_id: customer.map(str::to_string),
        stripe_payment_method_id: payment_method.map(str::to_string),
        created_at: Utc::now(),
    }
}

fn due_installment(plan_id: Uuid, number: i32) -> Installment {
    Installment::new(plan_id, number, 3333, Utc::now().date_naive())
}

#[tokio::test]
async fn plan_creation_marks_the_first_installment_paid() {
    let h = harness();
    let template = test_support::template(3, InstallmentFrequency::Monthly);
    h.store.add_template(template.clone()).await;

    let mut order = Order::new(Uuid::new_v4(), 10000);
    order.stripe_payment_intent_id = Some("pi_checkout".to_string());

    let plan = h
        .billing
        .create_payment_plan(
            &order,
            template.id,
            PaymentPlanMethod::AutoCharge,
            Some("cus_1".to_string()),
            Some("pm_1".to_string()),
        )
        .await
        .unwrap();

    let state = h.store.snapshot().await;
    let mut installments: Vec<_> = state
        .installments
        .values()
        .filter(|i| i.plan_id == plan.id)
        .cloned()
        .collect();
    installments.sort_by_key(|i| i.installment_number);

    let today = Utc::now().date_naive();
    assert_eq!(installments.len(), 3);

    assert_eq!(installments[0].amount, 3334);
    assert_eq!(installments[0].status, InstallmentStatus::Paid);
    assert_eq!(
        installments[0].stripe_payment_intent_id.as_deref(),
        Some("pi_checkout")
    );

    assert_eq!(installments[1].amount, 3333);
    assert_eq!(installments[1].due_date, today + Duration::days(30));
    assert_eq!(installments[2].due_date, today + Duration::days(60));

    let sum: i64 = installments.iter().map(|i| i.amount).sum();
    assert_eq!(sum, 10000);
}

#[tokio::test]
async fn plan_creation_is_idempotent_per_order() {
    let h = harness();
    let template = test_support::template(3, InstallmentFrequency::Monthly);
    h.store.add_template(template.clone()).await;

    let order = Order::new(Uuid::new_v4(), 9000);

    let first = h
        .billing
        .create_payment_plan(&order, template.id, PaymentPlanMethod::AutoCharge, None, None)
        .await
        .unwrap();
    let second = h
        .billing
        .create_payment_plan(&order, template.id, PaymentPlanMethod::AutoCharge, None, None)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    let state = h.store.snapshot().await;
    assert_eq!(state.plans.len(), 1);
    assert_eq!(state.installments.len(), 3);
}

#[tokio::test]
async fn auto_charge_marks_due_installments_paid() {
    let h = harness();
    let plan = plan(PaymentPlanMethod::AutoCharge, Some("cus_1"), Some("pm_1"));
    let installment = due_installment(plan.id, 2);
    let installment_id = installment.id;
    h.store.add_plan(plan).await;
    h.store.add_installment(installment).await;

    let summary = h.billing.process_installments().await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    let state = h.store.snapshot().await;
    let stored = &state.installments[&installment_id];
    assert_eq!(stored.status, InstallmentStatus::Paid);
    assert!(stored.paid_at.is_some());
    assert!(stored.stripe_payment_intent_id.is_some());
}

#[tokio::test]
async fn future_installments_are_left_alone() {
    let h = harness();
    let plan = plan(PaymentPlanMethod::AutoCharge, Some("cus_1"), Some("pm_1"));
    let mut installment = due_installment(plan.id, 2);
    installment.due_date = Utc::now().date_naive() + Duration::days(10);
    h.store.add_plan(plan).await;
    h.store.add_installment(installment).await;

    let summary = h.billing.process_installments().await.unwrap();
    assert_eq!(summary.processed, 0);
    assert_eq!(h.gateway.call_count("charge_payment_method"), 0);
}

#[tokio::test]
async fn missing_payment_details_fail_the_installment() {
    let h = harness();
    let plan = plan(PaymentPlanMethod::AutoCharge, Some("cus_1"), None);
    let installment = due_installment(plan.id, 2);
    let installment_id = installment.id;
    h.store.add_plan(plan).await;
    h.store.add_installment(installment).await;

    let summary = h.billing.process_installments().await.unwrap();
    assert_eq!(summary.failed, 1);

    let state = h.store.snapshot().await;
    let stored = &state.installments[&installment_id];
    assert_eq!(stored.status, InstallmentStatus::Failed);
    assert_eq!(stored.retry_count, 1);
    assert_eq!(h.gateway.call_count("charge_payment_method"), 0);
}

#[tokio::test]
async fn declined_charges_count_as_failures() {
    let h = harness();
    let plan = plan(PaymentPlanMethod::AutoCharge, Some("cus_1"), Some("pm_1"));
    let installment = due_installment(plan.id, 2);
    let installment_id = installment.id;
    h.store.add_plan(plan).await;
    h.store.add_installment(installment).await;

    h.gateway
        .push_charge_outcome(Ok(GatewayIntentStatus::RequiresPaymentMethod));

    let summary = h.billing.process_installments().await.unwrap();
    assert_eq!(summary.failed, 1);

    let state = h.store.snapshot().await;
    assert_eq!(state.installments[&installment_id].status, InstallmentStatus::Failed);
}

#[tokio::test]
async fn third_failure_parks_the_installment_overdue() {
    let h = harness();
    let plan = plan(PaymentPlanMethod::AutoCharge, Some("cus_1"), Some("pm_1"));
    let mut installment = due_installment(plan.id, 2);
    installment.status = InstallmentStatus::Failed;
    installment.retry_count = 2;
    let installment_id = installment.id;
    h.store.add_plan(plan).await;
    h.store.add_installment(installment).await;

    h.gateway
        .push_charge_outcome(Err("card expired".to_string()));

    let summary = h.billing.process_installments().await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);

    let state = h.store.snapshot().await;
    let stored = &state.installments[&installment_id];
    assert_eq!(stored.retry_count, 3);
    assert_eq!(stored.status, InstallmentStatus::Overdue);

    // Overdue means out of reach of the next sweep.
    let next = h.billing.process_installments().await.unwrap();
    assert_eq!(next.processed, 0);
}

#[tokio::test]
async fn manual_invoice_counts_as_succeeded_and_is_not_reinvoiced() {
    let h = harness();
    let plan = plan(PaymentPlanMethod::ManualInvoice, Some("cus_1"), None);
    let installment = due_installment(plan.id, 2);
    let installment_id = installment.id;
    h.store.add_plan(plan).await;
    h.store.add_installment(installment).await;

    let summary = h.billing.process_installments().await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let state = h.store.snapshot().await;
    let stored = &state.installments[&installment_id];
    // Payment confirmation arrives later by webhook; the installment
    // stays pending but carries the invoice id.
    assert_eq!(stored.status, InstallmentStatus::Pending);
    assert!(stored.stripe_invoice_id.is_some());

    let next = h.billing.process_installments().await.unwrap();
    assert_eq!(next.processed, 0);
    assert_eq!(h.gateway.call_count("create_and_send_invoice"), 1);
}

#[tokio::test]
async fn manual_invoice_without_customer_fails() {
    let h = harness();
    let plan = plan(PaymentPlanMethod::ManualInvoice, None, None);
    let installment = due_installment(plan.id, 2);
    let installment_id = installment.id;
    h.store.add_plan(plan).await;
    h.store.add_installment(installment).await;

    let summary = h.billing.process_installments().await.unwrap();
    assert_eq!(summary.failed, 1);

    let state = h.store.snapshot().await;
    assert_eq!(state.installments[&installment_id].status, InstallmentStatus::Failed);
}

#[tokio::test]
async fn one_bad_installment_does_not_abort_the_sweep() {
    let h = harness();
    let plan = plan(PaymentPlanMethod::AutoCharge, Some("cus_1"), Some("pm_1"));
    let mut early = due_installment(plan.id, 2);
    early.due_date = Utc::now().date_naive() - Duration::days(2);
    let late = due_installment(plan.id, 3);
    let early_id = early.id;
    let late_id = late.id;
    h.store.add_plan(plan).await;
    h.store.add_installment(early).await;
    h.store.add_installment(late).await;

    // The earlier-due installment's charge blows up; the later one is
    // still processed and succeeds.
    h.gateway.push_charge_outcome(Err("gateway down".to_string()));

    let summary = h.billing.process_installments().await.unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let state = h.store.snapshot().await;
    assert_eq!(state.installments[&early_id].status, InstallmentStatus::Failed);
    assert_eq!(state.installments[&late_id].status, InstallmentStatus::Paid);
}
