use crate::types::*;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// Cart DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,

    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineResponse {
    pub cart_item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub lines: Vec<CartLineResponse>,
    pub subtotal: i64,
}

// Checkout DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCheckoutSessionRequest {
    #[validate(url)]
    pub success_url: Option<String>,

    #[validate(url)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    pub order_id: Uuid,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CreatePaymentIntentRequest {
    pub discount_code: Option<String>,

    /// Store credit the customer wants to put toward this order, in cents.
    /// Clamped to the remaining total and to the available balance.
    #[validate(range(min = 1))]
    pub credit_to_apply: Option<i64>,

    pub plan_template_id: Option<Uuid>,
    pub plan_method: Option<PaymentPlanMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutIntentResponse {
    pub order_id: Uuid,
    /// Absent when the order completed without a gateway charge.
    pub client_secret: Option<String>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub credit_applied: i64,
    pub total: i64,
    pub amount_due_now: i64,
    pub zero_total: bool,
    pub discount_summary: Option<String>,
    pub credit_summary: Option<String>,
    pub plan_summary: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub order_id: Uuid,
    pub plan_template_id: Option<Uuid>,
    pub plan_method: Option<PaymentPlanMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub credit_applied: i64,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOptionResponse {
    pub template_id: Uuid,
    pub name: String,
    pub number_of_installments: i32,
    pub frequency: InstallmentFrequency,
    pub first_amount: i64,
    pub installment_amount: i64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DiscountPreviewRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountPreviewResponse {
    pub code: String,
    pub discount_amount: i64,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundOrderRequest {
    /// Return the money as store credit instead of a gateway refund.
    #[serde(default)]
    pub to_store_credit: bool,
}

// Credit DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RedeemGiftCardRequest {
    #[validate(length(min = 16, max = 16))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditBalanceResponse {
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransactionResponse {
    pub id: Uuid,
    pub amount: i64,
    pub transaction_type: CreditTransactionType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AdminAdjustmentRequest {
    pub user_id: Uuid,
    pub amount: i64,

    #[validate(length(min = 1, max = 255))]
    pub description: String,
}

// Installment DTOs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentResponse {
    pub id: Uuid,
    pub installment_number: i32,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}
