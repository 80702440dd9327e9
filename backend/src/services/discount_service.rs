use std::sync::Arc;

use chrono::Utc;
use studio_platform_shared::constants::{
    ERROR_DISCOUNT_INVALID, ERROR_DISCOUNT_NOT_FOUND, ERROR_DISCOUNT_PRODUCT_MISMATCH,
};
use studio_platform_shared::format_usd;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::DiscountCode;
use crate::repositories::{Store, StoreTx};


/// Validates and applies discount codes.
#[derive(Clone)]
pub struct DiscountService {
    store: Arc<dyn Store>,
}

impl DiscountService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolves a code against an order-in-progress inside the caller's
    /// unit of work. Fails with NotFound for unknown codes and with
    /// Validation for unusable ones; the caller applies the returned
    /// code's discount and bumps its usage counter.
    pub async fn apply_within(
        &self,
        tx: &mut dyn StoreTx,
        code: &str,
        user_id: Uuid,
        subtotal: i64,
        product_ids: &[Uuid],
    ) -> Result<DiscountCode, AppError> {
        let discount_code = tx
            .discount_code_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(ERROR_DISCOUNT_NOT_FOUND.to_string()))?;

        if !discount_code.is_usable(Utc::now()) {
            return Err(AppError::Validation(ERROR_DISCOUNT_INVALID.to_string()));
        }

        if let Some(max_uses_per_user) = discount_code.max_uses_per_user {
            let used = tx
                .discount_code_use_count_for_user(discount_code.id, user_id)
                .await?;
            if used >= max_uses_per_user as i64 {
                return Err(AppError::Validation(ERROR_DISCOUNT_INVALID.to_string()));
            }
        }

        if let Some(min_order_amount) = discount_code.min_order_amount {
            if subtotal < min_order_amount {
                return Err(AppError::Validation(format!(
                    "This discount code requires a minimum order of {}",
                    format_usd(min_order_amount)
                )));
            }
        }

        let scoped_products = tx.discount_code_product_ids(discount_code.id).await?;
        if !scoped_products.is_empty()
            && !product_ids.iter().any(|id| scoped_products.contains(id))
        {
            return Err(AppError::Validation(
                ERROR_DISCOUNT_PRODUCT_MISMATCH.to_string(),
            ));
        }

        debug!(
            "Discount code {} accepted for user {} (subtotal {})",
            discount_code.code, user_id, subtotal
        );

        Ok(discount_code)
    }

    /// Read-only preview for the cart page: what would this code take off
    /// the given subtotal?
    pub async fn preview(
        &self,
        user_id: Uuid,
        code: &str,
        subtotal: i64,
        product_ids: &[Uuid],
    ) -> Result<(DiscountCode, i64), AppError> {
        let mut tx = self.store.begin().await?;
        let discount_code = self
            .apply_within(&mut *tx, code, user_id, subtotal, product_ids)
            .await?;
        let amount = discount_code.calculate_discount(subtotal);
        Ok((discount_code, amount))
    }
}
