use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studio_platform_shared::{FulfillmentStatus, OrderStatus};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub discount_code_id: Option<Uuid>,
    pub discount_amount: i64,
    pub credit_applied: i64,
    pub total: i64,
    pub stripe_checkout_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(user_id: Uuid, subtotal: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Pending,
            subtotal,
            discount_code_id: None,
            discount_amount: 0,
            credit_applied: 0,
            total: subtotal,
            stripe_checkout_session_id: None,
            stripe_payment_intent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Re-derives the total from the subtotal and adjustments, clamped at
    /// zero. Invariant: total = subtotal - discount_amount - credit_applied.
    pub fn recompute_total(&mut self) {
        self.total = (self.subtotal - self.discount_amount - self.credit_applied).max(0);
    }
}

/// Price snapshot of one order line. `unit_price`/`total_price` are taken
/// from the product at order time and never recomputed afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
    pub fulfillment_status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn new(order_id: Uuid, product_id: Uuid, quantity: i32, unit_price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            quantity,
            unit_price,
            total_price: unit_price * quantity as i64,
            fulfillment_status: FulfillmentStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
