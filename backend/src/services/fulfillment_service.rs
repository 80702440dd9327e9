use std::collections::BTreeMap;
use std::sync::Arc;

use studio_platform_shared::constants::GIFT_CARD_CODE_MAX_ATTEMPTS;
use studio_platform_shared::{CreditTransactionType, FulfillmentStatus, OrderStatus};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CreditReference, Enrollment, GiftCard, Order, OrderItem, ProductKind};
use crate::payment::PaymentGateway;
use crate::repositories::{Store, StoreTx};
use crate::services::credit_service::CreditService;


/// Converts paid orders into enrollments and gift cards.
///
/// Completion is the one place that holds row locks: each course in the
/// order is locked (in ascending course-id order) and its capacity
/// re-checked before anything is written. Gateway calls happen only after
/// the unit of work has committed.
#[derive(Clone)]
pub struct FulfillmentService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    credit_service: CreditService,
}

impl FulfillmentService {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        credit_service: CreditService,
    ) -> Self {
        Self {
            store,
            gateway,
            credit_service,
        }
    }

    /// Completes a pending order. Returns false without side effects when
    /// the order is no longer pending (duplicate webhook delivery, double
    /// confirmation) and when a capacity shortfall failed the whole order.
    pub async fn complete_order(&self, order_id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if order.status != OrderStatus::Pending {
            info!(
                "Order {} already {}, skipping completion",
                order.id, order.status
            );
            return Ok(false);
        }

        let items = tx.order_items(order.id).await?;

        // Seats needed per course. BTreeMap keeps the lock acquisition in
        // ascending course-id order so concurrent completions cannot
        // deadlock against each other.
        let mut seats_needed: BTreeMap<Uuid, i64> = BTreeMap::new();
        for item in &items {
            let product = tx.product(item.product_id).await?.ok_or_else(|| {
                AppError::Internal(format!("order references missing product {}", item.product_id))
            })?;
            if let Some(course_id) = product.kind.course_id() {
                *seats_needed.entry(course_id).or_insert(0) += item.quantity as i64;
            }
        }

        for (&course_id, &needed) in &seats_needed {
            let course = tx.lock_course(course_id).await?.ok_or_else(|| {
                AppError::Internal(format!("order references missing course {}", course_id))
            })?;
            let enrolled = tx.confirmed_enrollment_count(course_id).await?;
            let available = course.available_capacity(enrolled);

            if needed > available {
                // The whole order fails; partially fulfilling a multi-item
                // cart would leave pricing and accounting inconsistent.
                order.status = OrderStatus::Failed;
                tx.update_order(&order).await?;
                tx.commit().await?;

                warn!(
                    "Order {} failed: {} needs {} seats in {}, {} available",
                    order.id, order.user_id, needed, course.name, available
                );

                self.refund_collected_payment(&order).await;
                return Ok(false);
            }
        }

        self.fulfill_items_within(&mut *tx, &order, &items).await?;

        order.status = OrderStatus::Completed;
        tx.update_order(&order).await?;
        tx.clear_cart(order.user_id).await?;
        tx.commit().await?;

        info!("Order {} completed for user {}", order.id, order.user_id);
        Ok(true)
    }

    /// Fulfills each line of an order inside the caller's unit of work:
    /// course lines become unassigned enrollments, gift-card lines are
    /// issued, everything else stays pending for manual fulfillment.
    pub async fn fulfill_items_within(
        &self,
        tx: &mut dyn StoreTx,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), AppError> {
        for item in items {
            let product = tx.product(item.product_id).await?.ok_or_else(|| {
                AppError::Internal(format!("order references missing product {}", item.product_id))
            })?;

            match product.kind {
                ProductKind::Course(course_id) => {
                    for _ in 0..item.quantity {
                        let enrollment =
                            Enrollment::new(course_id, Some(item.id), order.user_id);
                        tx.insert_enrollment(&enrollment).await?;
                    }
                    tx.set_order_item_fulfillment(item.id, FulfillmentStatus::Fulfilled)
                        .await?;
                }
                ProductKind::GiftCardType(type_id) => {
                    self.fulfill_gift_cards(tx, order, item, type_id).await?;
                    tx.set_order_item_fulfillment(item.id, FulfillmentStatus::Fulfilled)
                        .await?;
                }
                ProductKind::Costume(_) | ProductKind::Standalone => {
                    // fulfilled manually by staff
                }
            }
        }

        Ok(())
    }

    /// Issues `quantity` gift cards for an order line. A zero denomination
    /// means the customer chose the amount, taken from the line's unit
    /// price.
    pub async fn fulfill_gift_cards(
        &self,
        tx: &mut dyn StoreTx,
        order: &Order,
        item: &OrderItem,
        gift_card_type_id: Uuid,
    ) -> Result<Vec<GiftCard>, AppError> {
        let gift_card_type = tx.gift_card_type(gift_card_type_id).await?.ok_or_else(|| {
            AppError::Internal(format!(
                "product references missing gift card type {}",
                gift_card_type_id
            ))
        })?;

        let amount = if gift_card_type.denomination > 0 {
            gift_card_type.denomination
        } else {
            item.unit_price
        };

        let mut cards = Vec::with_capacity(item.quantity as usize);
        for _ in 0..item.quantity {
            let code = self.unique_gift_card_code(tx).await?;
            let card = GiftCard::new(
                gift_card_type_id,
                code,
                amount,
                order.user_id,
                Some(order.id),
            );
            tx.insert_gift_card(&card).await?;
            cards.push(card);
        }

        info!(
            "Issued {} gift card(s) of {} for order {}",
            cards.len(),
            amount,
            order.id
        );

        Ok(cards)
    }

    /// Manual staff refund of a completed order. Applied credit always
    /// returns to the ledger; the gateway-collected total is refunded at
    /// the gateway, or credited instead when `to_store_credit` is set.
    pub async fn refund_order(
        &self,
        order_id: Uuid,
        to_store_credit: bool,
    ) -> Result<Order, AppError> {
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if order.status != OrderStatus::Completed {
            return Err(AppError::Validation(
                "Only completed orders can be refunded".to_string(),
            ));
        }

        if order.credit_applied > 0 {
            self.credit_service
                .adjust_credit(
                    &mut *tx,
                    order.user_id,
                    order.credit_applied,
                    CreditTransactionType::Refund,
                    Some(CreditReference::Order(order.id)),
                    Some(format!("Store credit returned for refunded order {}", order.id)),
                )
                .await?;
        }

        if to_store_credit && order.total > 0 {
            self.credit_service
                .adjust_credit(
                    &mut *tx,
                    order.user_id,
                    order.total,
                    CreditTransactionType::Refund,
                    Some(CreditReference::Order(order.id)),
                    Some(format!("Refund of order {} as store credit", order.id)),
                )
                .await?;
        }

        order.status = OrderStatus::Refunded;
        tx.update_order(&order).await?;
        tx.commit().await?;

        if !to_store_credit && order.total > 0 {
            self.refund_collected_payment(&order).await;
        }

        info!("Order {} refunded (store credit: {})", order.id, to_store_credit);
        Ok(order)
    }

    /// Webhook support: persists the payment-intent id delivered with a
    /// completed checkout session.
    pub async fn record_session_payment(
        &self,
        order_id: Uuid,
        payment_intent_id: Option<String>,
    ) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if let Some(payment_intent_id) = payment_intent_id {
            order.stripe_payment_intent_id = Some(payment_intent_id);
            tx.update_order(&order).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Webhook support: fails the pending order matching a failed payment
    /// intent. Returns whether an order was updated.
    pub async fn fail_order_for_intent(&self, payment_intent_id: &str) -> Result<bool, AppError> {
        let mut tx = self.store.begin().await?;

        let Some(mut order) = tx.order_by_payment_intent(payment_intent_id).await? else {
            return Ok(false);
        };
        if order.status != OrderStatus::Pending {
            return Ok(false);
        }

        order.status = OrderStatus::Failed;
        tx.update_order(&order).await?;
        tx.commit().await?;

        warn!(
            "Order {} marked failed after payment intent {} failed",
            order.id, payment_intent_id
        );
        Ok(true)
    }

    /// Best-effort compensating refund, outside any unit of work. There is
    /// no caller to surface a failure to, so it is only logged.
    async fn refund_collected_payment(&self, order: &Order) {
        let Some(payment_intent_id) = &order.stripe_payment_intent_id else {
            return;
        };

        match self
            .gateway
            .refund_payment_intent(payment_intent_id, None)
            .await
        {
            Ok(refund_id) => info!(
                "Refunded payment intent {} for order {} ({})",
                payment_intent_id, order.id, refund_id
            ),
            Err(e) => warn!(
                "Refund of payment intent {} for order {} failed: {}",
                payment_intent_id, order.id, e
            ),
        }
    }

    async fn unique_gift_card_code(&self, tx: &mut dyn StoreTx) -> Result<String, AppError> {
        for _ in 0..GIFT_CARD_CODE_MAX_ATTEMPTS {
            let code = {
                let mut rng = rand::thread_rng();
                GiftCard::generate_code(&mut rng)
            };
            if !tx.gift_card_code_exists(&code).await? {
                return Ok(code);
            }
        }

        Err(AppError::Conflict(
            "Could not allocate a unique gift card code".to_string(),
        ))
    }
}
