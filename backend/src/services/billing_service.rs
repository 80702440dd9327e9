use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use studio_platform_shared::constants::INSTALLMENT_SWEEP_INTERVAL_SECS;
use studio_platform_shared::{InstallmentStatus, PaymentPlanMethod};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Installment, Order, PaymentPlan};
use crate::payment::{GatewayIntentStatus, PaymentGateway};
use crate::repositories::{Store, StoreTx};

#[cfg(test)]
mod tests;

/// Outcome counts of one installment sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Installment payment plans and the daily collection sweep.
#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
}

impl BillingService {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Creates the plan for an order that just paid its first installment
    /// at checkout: installment #1 is recorded Paid, the rest are Pending
    /// on the frequency grid. Idempotent per order.
    pub async fn create_payment_plan(
        &self,
        order: &Order,
        template_id: Uuid,
        method: PaymentPlanMethod,
        stripe_customer_id: Option<String>,
        stripe_payment_method_id: Option<String>,
    ) -> Result<PaymentPlan, AppError> {
        let mut tx = self.store.begin().await?;

        if let Some(existing) = tx.payment_plan_for_order(order.id).await? {
            info!("Order {} already has payment plan {}", order.id, existing.id);
            return Ok(existing);
        }

        let template = tx
            .payment_plan_template(template_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment plan template not found".to_string()))?;

        let split = template.installment_amounts(order.total);
        let now = Utc::now();
        let today = now.date_naive();

        let plan = PaymentPlan {
            id: Uuid::new_v4(),
            order_id: order.id,
            template_id: template.id,
            method,
            total_amount: order.total,
            number_of_installments: template.number_of_installments,
            frequency: template.frequency,
            stripe_customer_id,
            stripe_payment_method_id,
            created_at: now,
        };
        tx.insert_payment_plan(&plan).await?;

        // Installment #1 was collected as the checkout charge.
        let mut first = Installment::new(plan.id, 1, split.first, today);
        first.status = InstallmentStatus::Paid;
        first.paid_at = Some(now);
        first.stripe_payment_intent_id = order.stripe_payment_intent_id.clone();
        tx.insert_installment(&first).await?;

        for number in 2..=template.number_of_installments {
            let due_date = Installment::due_date_for(today, template.frequency, number);
            let installment = Installment::new(plan.id, number, split.remaining, due_date);
            tx.insert_installment(&installment).await?;
        }

        tx.commit().await?;

        info!(
            "Payment plan {} created for order {}: {} x {} ({})",
            plan.id, order.id, template.number_of_installments, split.remaining, template.frequency
        );

        Ok(plan)
    }

    /// Daily sweep over due and retryable installments. Each installment
    /// is processed independently; a failure in one never aborts the rest.
    pub async fn process_installments(&self) -> Result<SweepSummary, AppError> {
        let today = Utc::now().date_naive();

        let selection = {
            let mut tx = self.store.begin().await?;
            tx.collectible_installments(today).await?
        };

        let mut summary = SweepSummary::default();
        for (installment, plan) in selection {
            summary.processed += 1;

            let outcome = match plan.method {
                PaymentPlanMethod::AutoCharge => {
                    self.charge_installment(installment.clone(), &plan).await
                }
                PaymentPlanMethod::ManualInvoice => {
                    self.invoice_installment(installment.clone(), &plan).await
                }
            };

            match outcome {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    error!(
                        "Installment {} processing error: {}",
                        installment.id, e
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Installment sweep: {} processed, {} succeeded, {} failed",
            summary.processed, summary.succeeded, summary.failed
        );

        Ok(summary)
    }

    /// Spawns the daily sweep loop.
    pub fn start_daily_sweep(&self) {
        let service = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                INSTALLMENT_SWEEP_INTERVAL_SECS,
            ));

            loop {
                interval.tick().await;

                if let Err(e) = service.process_installments().await {
                    error!("Installment sweep failed: {}", e);
                }
            }
        });

        info!("Installment billing sweep scheduled");
    }

    /// Charges the stored payment method. Returns whether the installment
    /// counted as succeeded for this sweep.
    async fn charge_installment(
        &self,
        installment: Installment,
        plan: &PaymentPlan,
    ) -> Result<bool, AppError> {
        let (Some(customer_id), Some(payment_method_id)) = (
            plan.stripe_customer_id.as_deref(),
            plan.stripe_payment_method_id.as_deref(),
        ) else {
            warn!(
                "Installment {} has no stored payment details, marking failed",
                installment.id
            );
            self.mark_failed(installment).await?;
            return Ok(false);
        };

        let description = format!(
            "Installment {}/{} for order {}",
            installment.installment_number, plan.number_of_installments, plan.order_id
        );
        let metadata = HashMap::from([
            ("installment_id".to_string(), installment.id.to_string()),
            ("order_id".to_string(), plan.order_id.to_string()),
        ]);

        match self
            .gateway
            .charge_payment_method(
                customer_id,
                payment_method_id,
                installment.amount,
                &description,
                metadata,
            )
            .await
        {
            Ok(intent) if intent.status == GatewayIntentStatus::Succeeded => {
                self.mark_paid(installment, intent.id).await?;
                Ok(true)
            }
            Ok(intent) => {
                warn!(
                    "Installment {} charge came back {:?}",
                    installment.id, intent.status
                );
                self.mark_failed(installment).await?;
                Ok(false)
            }
            Err(e) => {
                error!("Installment {} charge failed: {}", installment.id, e);
                self.mark_failed(installment).await?;
                Ok(false)
            }
        }
    }

    /// Creates and sends an invoice. The installment stays Pending until
    /// the invoice's payment webhook arrives, but counts as succeeded for
    /// this sweep.
    async fn invoice_installment(
        &self,
        mut installment: Installment,
        plan: &PaymentPlan,
    ) -> Result<bool, AppError> {
        let Some(customer_id) = plan.stripe_customer_id.as_deref() else {
            warn!(
                "Installment {} has no customer for invoicing, marking failed",
                installment.id
            );
            self.mark_failed(installment).await?;
            return Ok(false);
        };

        let description = format!(
            "Installment {}/{} for order {}",
            installment.installment_number, plan.number_of_installments, plan.order_id
        );
        let metadata = HashMap::from([
            ("installment_id".to_string(), installment.id.to_string()),
            ("order_id".to_string(), plan.order_id.to_string()),
        ]);

        match self
            .gateway
            .create_and_send_invoice(customer_id, installment.amount, &description, metadata)
            .await
        {
            Ok(invoice_id) => {
                installment.stripe_invoice_id = Some(invoice_id.clone());
                let mut tx = self.store.begin().await?;
                tx.update_installment(&installment).await?;
                tx.commit().await?;

                info!(
                    "Installment {} invoiced ({})",
                    installment.id, invoice_id
                );
                Ok(true)
            }
            Err(e) => {
                error!("Installment {} invoicing failed: {}", installment.id, e);
                self.mark_failed(installment).await?;
                Ok(false)
            }
        }
    }

    async fn mark_paid(
        &self,
        mut installment: Installment,
        payment_intent_id: String,
    ) -> Result<(), AppError> {
        installment.status = InstallmentStatus::Paid;
        installment.paid_at = Some(Utc::now());
        installment.stripe_payment_intent_id = Some(payment_intent_id);

        let mut tx = self.store.begin().await?;
        tx.update_installment(&installment).await?;
        tx.commit().await?;

        info!(
            "Installment {} ({}/{}) paid",
            installment.id, installment.installment_number, installment.amount
        );
        Ok(())
    }

    /// Retry state machine: the third failure parks the installment as
    /// Overdue, out of reach of further automated retries.
    async fn mark_failed(&self, mut installment: Installment) -> Result<(), AppError> {
        installment.retry_count += 1;
        installment.status = Installment::status_after_failure(installment.retry_count);

        let mut tx = self.store.begin().await?;
        tx.update_installment(&installment).await?;
        tx.commit().await?;

        warn!(
            "Installment {} failed (attempt {}), now {}",
            installment.id, installment.retry_count, installment.status
        );
        Ok(())
    }
}
