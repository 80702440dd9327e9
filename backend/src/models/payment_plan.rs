use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studio_platform_shared::constants::INSTALLMENT_MAX_RETRIES;
use studio_platform_shared::{
    InstallmentFrequency, InstallmentStatus, PaymentPlanMethod, ProductableType,
};
use uuid::Uuid;

/// How an order total splits into installments. The rounding remainder is
/// pushed entirely into the first installment so the remaining ones stay
/// uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallmentSplit {
    pub first: i64,
    pub remaining: i64,
}

/// Eligibility rule for offering a payment plan: product-type match plus a
/// price window on the order total.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentPlanTemplate {
    pub id: Uuid,
    pub name: String,
    /// None applies to any product type.
    pub applies_to: Option<ProductableType>,
    pub min_price: i64,
    pub max_price: i64,
    pub number_of_installments: i32,
    pub frequency: InstallmentFrequency,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl PaymentPlanTemplate {
    /// Splits `total` into `number_of_installments` parts whose sum is
    /// exactly `total`.
    pub fn installment_amounts(&self, total: i64) -> InstallmentSplit {
        let n = self.number_of_installments as i64;
        let base = total / n;
        let remainder = total - base * n;
        InstallmentSplit {
            first: base + remainder,
            remaining: base,
        }
    }

    /// Whether this template may be offered for an order with the given
    /// total and product types.
    pub fn matches(&self, total: i64, product_types: &[Option<ProductableType>]) -> bool {
        if !self.active {
            return false;
        }
        if total < self.min_price || total > self.max_price {
            return false;
        }
        match self.applies_to {
            None => true,
            Some(required) => product_types.iter().any(|t| *t == Some(required)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub id: Uuid,
    pub order_id: Uuid,
    pub template_id: Uuid,
    pub method: PaymentPlanMethod,
    pub total_amount: i64,
    pub number_of_installments: i32,
    pub frequency: InstallmentFrequency,
    pub stripe_customer_id: Option<String>,
    pub stripe_payment_method_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Installment {
    pub id: Uuid,
    pub plan_id: Uuid,
    /// 1-based position within the plan.
    pub installment_number: i32,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_invoice_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Installment {
    pub fn new(
        plan_id: Uuid,
        installment_number: i32,
        amount: i64,
        due_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            plan_id,
            installment_number,
            amount,
            due_date,
            status: InstallmentStatus::Pending,
            paid_at: None,
            retry_count: 0,
            stripe_payment_intent_id: None,
            stripe_invoice_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Due date for installment `number` in a plan starting today.
    pub fn due_date_for(start: NaiveDate, frequency: InstallmentFrequency, number: i32) -> NaiveDate {
        start + Duration::days(frequency.interval_days() * (number as i64 - 1))
    }

    /// Status after one more failed collection attempt. The third failure
    /// moves the installment to Overdue, which stops automated retries.
    pub fn status_after_failure(retry_count: i32) -> InstallmentStatus {
        if retry_count >= INSTALLMENT_MAX_RETRIES {
            InstallmentStatus::Overdue
        } else {
            InstallmentStatus::Failed
        }
    }

    /// Whether the daily sweep should pick this installment up.
    pub fn is_collectible(&self, today: NaiveDate) -> bool {
        match self.status {
            InstallmentStatus::Pending => {
                self.due_date <= today && self.stripe_invoice_id.is_none()
            }
            InstallmentStatus::Failed => self.retry_count < INSTALLMENT_MAX_RETRIES,
            InstallmentStatus::Paid | InstallmentStatus::Overdue => false,
        }
    }
}
