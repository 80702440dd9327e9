use std::sync::Arc;

use chrono::Utc;
use studio_platform_shared::constants::{
    DEFAULT_PAGE_SIZE, ERROR_GIFT_CARD_NOT_FOUND, ERROR_GIFT_CARD_REDEEMED,
    ERROR_GIFT_CARD_UNUSABLE, MAX_PAGE_SIZE,
};
use studio_platform_shared::CreditTransactionType;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CreditReference, CreditTransaction};
use crate::repositories::{Store, StoreTx};


/// Store-credit ledger. The balance on the user row is a denormalized
/// running total; every mutation goes through [`CreditService::adjust_credit`]
/// so the balance and the ledger row land in the same unit of work.
#[derive(Clone)]
pub struct CreditService {
    store: Arc<dyn Store>,
}

impl CreditService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Applies `amount` (positive = credit, negative = debit) to the
    /// user's balance and appends the matching ledger row. No sign
    /// validation happens here; callers clamp the amount they apply.
    pub async fn adjust_credit(
        &self,
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        amount: i64,
        transaction_type: CreditTransactionType,
        reference: Option<CreditReference>,
        description: Option<String>,
    ) -> Result<CreditTransaction, AppError> {
        let new_balance = tx.adjust_credit_balance(user_id, amount).await?;

        let transaction =
            CreditTransaction::new(user_id, amount, transaction_type, reference, description);
        tx.insert_credit_transaction(&transaction).await?;

        debug!(
            "Ledger entry for user {}: {} {} (balance now {})",
            user_id, transaction_type, amount, new_balance
        );

        Ok(transaction)
    }

    /// Redeems a gift card in full onto the user's credit balance. Partial
    /// spend is not modeled: redemption zeroes the card.
    pub async fn redeem_gift_card(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<CreditTransaction, AppError> {
        let mut tx = self.store.begin().await?;

        let card = tx
            .gift_card_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(ERROR_GIFT_CARD_NOT_FOUND.to_string()))?;

        if card.redeemed_at.is_some() {
            return Err(AppError::Validation(ERROR_GIFT_CARD_REDEEMED.to_string()));
        }
        if !card.is_redeemable() {
            return Err(AppError::Validation(ERROR_GIFT_CARD_UNUSABLE.to_string()));
        }

        let transaction = self
            .adjust_credit(
                &mut *tx,
                user_id,
                card.remaining_amount,
                CreditTransactionType::GiftCardRedemption,
                Some(CreditReference::GiftCard(card.id)),
                Some(format!("Gift card {} redeemed", card.code)),
            )
            .await?;

        tx.mark_gift_card_redeemed(card.id, user_id, Utc::now())
            .await?;
        tx.commit().await?;

        info!(
            "Gift card {} redeemed by user {} for {}",
            card.code, user_id, card.remaining_amount
        );

        Ok(transaction)
    }

    /// Staff-issued balance correction, positive or negative.
    pub async fn admin_adjustment(
        &self,
        user_id: Uuid,
        amount: i64,
        description: String,
    ) -> Result<CreditTransaction, AppError> {
        if amount == 0 {
            return Err(AppError::Validation(
                "Adjustment amount must be non-zero".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let transaction = self
            .adjust_credit(
                &mut *tx,
                user_id,
                amount,
                CreditTransactionType::AdminAdjustment,
                None,
                Some(description),
            )
            .await?;
        tx.commit().await?;

        info!("Admin adjustment of {} for user {}", amount, user_id);

        Ok(transaction)
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<i64, AppError> {
        let mut tx = self.store.begin().await?;
        let user = tx
            .user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        Ok(user.credit_balance)
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<CreditTransaction>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let mut tx = self.store.begin().await?;
        tx.credit_transactions_for_user(user_id, limit).await
    }
}
