use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studio_platform_shared::DiscountType;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent (0-100) for percentage codes, cents for fixed-amount codes.
    pub value: i64,
    pub min_order_amount: Option<i64>,
    pub max_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub times_used: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscountCode {
    /// Discount in cents for the given subtotal, capped at the subtotal so
    /// the order total can never go negative. Percentage amounts round
    /// half-up.
    pub fn calculate_discount(&self, subtotal: i64) -> i64 {
        let raw = match self.discount_type {
            DiscountType::Percentage => (subtotal * self.value + 50) / 100,
            DiscountType::FixedAmount => self.value,
        };
        raw.min(subtotal).max(0)
    }

    /// Active, unexpired and under the global use limit. The per-user limit
    /// needs an order count and is checked by the discount service.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return false;
            }
        }
        if let Some(max_uses) = self.max_uses {
            if self.times_used >= max_uses {
                return false;
            }
        }
        true
    }
}
