use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studio_platform_shared::constants::{GIFT_CARD_CODE_ALPHABET, GIFT_CARD_CODE_LENGTH};
use uuid::Uuid;

/// Catalog entry for a purchasable gift card. A zero denomination means
/// the customer picks the amount, taken from the product price.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GiftCardType {
    pub id: Uuid,
    pub name: String,
    pub denomination: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GiftCard {
    pub id: Uuid,
    pub code: String,
    pub gift_card_type_id: Uuid,
    pub initial_amount: i64,
    pub remaining_amount: i64,
    pub purchaser_id: Uuid,
    pub redeemed_by: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub active: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GiftCard {
    pub fn new(
        gift_card_type_id: Uuid,
        code: String,
        amount: i64,
        purchaser_id: Uuid,
        order_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            gift_card_type_id,
            initial_amount: amount,
            remaining_amount: amount,
            purchaser_id,
            redeemed_by: None,
            order_id,
            active: true,
            redeemed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Generates a candidate redemption code. Uniqueness is checked against
    /// the store by the caller, which retries on collision.
    pub fn generate_code<R: Rng>(rng: &mut R) -> String {
        (0..GIFT_CARD_CODE_LENGTH)
            .map(|_| GIFT_CARD_CODE_ALPHABET[rng.gen_range(0..GIFT_CARD_CODE_ALPHABET.len())] as char)
            .collect()
    }

    pub fn is_redeemable(&self) -> bool {
        self.active && self.redeemed_at.is_none() && self.remaining_amount > 0
    }
}
