use serde::{Deserialize, Serialize};
use std::fmt;

// Order-related enums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl OrderStatus {
    /// Completed, Failed and Refunded orders never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Failed => write!(f, "failed"),
            OrderStatus::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fulfillment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    Pending,
    Fulfilled,
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FulfillmentStatus::Pending => write!(f, "pending"),
            FulfillmentStatus::Fulfilled => write!(f, "fulfilled"),
        }
    }
}

// Discount-related enums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::FixedAmount => write!(f, "fixed_amount"),
        }
    }
}

// Credit ledger enums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "credit_transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditTransactionType {
    GiftCardRedemption,
    CheckoutDebit,
    Refund,
    AdminAdjustment,
}

impl fmt::Display for CreditTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreditTransactionType::GiftCardRedemption => write!(f, "gift_card_redemption"),
            CreditTransactionType::CheckoutDebit => write!(f, "checkout_debit"),
            CreditTransactionType::Refund => write!(f, "refund"),
            CreditTransactionType::AdminAdjustment => write!(f, "admin_adjustment"),
        }
    }
}

// Payment plan enums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_plan_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentPlanMethod {
    AutoCharge,
    ManualInvoice,
}

impl fmt::Display for PaymentPlanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentPlanMethod::AutoCharge => write!(f, "auto_charge"),
            PaymentPlanMethod::ManualInvoice => write!(f, "manual_invoice"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "installment_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstallmentFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl InstallmentFrequency {
    /// Days between consecutive installments.
    pub fn interval_days(&self) -> i64 {
        match self {
            InstallmentFrequency::Weekly => 7,
            InstallmentFrequency::Biweekly => 14,
            InstallmentFrequency::Monthly => 30,
        }
    }
}

impl fmt::Display for InstallmentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallmentFrequency::Weekly => write!(f, "weekly"),
            InstallmentFrequency::Biweekly => write!(f, "biweekly"),
            InstallmentFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "installment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Failed,
    Overdue,
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallmentStatus::Pending => write!(f, "pending"),
            InstallmentStatus::Paid => write!(f, "paid"),
            InstallmentStatus::Failed => write!(f, "failed"),
            InstallmentStatus::Overdue => write!(f, "overdue"),
        }
    }
}

// Catalog enums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "productable_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductableType {
    Course,
    GiftCardType,
    Costume,
}

impl fmt::Display for ProductableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductableType::Course => write!(f, "course"),
            ProductableType::GiftCardType => write!(f, "gift_card_type"),
            ProductableType::Costume => write!(f, "costume"),
        }
    }
}
