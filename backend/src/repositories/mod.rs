//! Persistence layer.
//!
//! Services talk to a [`Store`] and do all reads and writes inside a
//! [`StoreTx`] unit of work. The Postgres implementation maps a unit of
//! work onto a database transaction; the in-memory implementation (tests)
//! serializes units of work on a mutex with staged commit. Payment-gateway
//! calls are never made while a unit of work is open.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CartItem, Course, CreditTransaction, DiscountCode, Enrollment, GiftCard, GiftCardType,
    Installment, Order, OrderItem, PaymentPlan, PaymentPlanTemplate, Product, User,
};
use studio_platform_shared::FulfillmentStatus;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;
}

/// One unit of work. Dropping without [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: Send {
    // users + credit ledger
    async fn user(&mut self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn set_stripe_customer_id(
        &mut self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), AppError>;
    /// Atomically applies `delta` to the user's credit balance and returns
    /// the new balance.
    async fn adjust_credit_balance(&mut self, user_id: Uuid, delta: i64) -> Result<i64, AppError>;
    async fn insert_credit_transaction(
        &mut self,
        transaction: &CreditTransaction,
    ) -> Result<(), AppError>;
    async fn credit_transactions_for_user(
        &mut self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CreditTransaction>, AppError>;

    // catalog
    async fn product(&mut self, id: Uuid) -> Result<Option<Product>, AppError>;
    async fn course(&mut self, id: Uuid) -> Result<Option<Course>, AppError>;
    /// Row-locks the course until the unit of work ends. The authoritative
    /// capacity check happens under this lock.
    async fn lock_course(&mut self, id: Uuid) -> Result<Option<Course>, AppError>;
    async fn confirmed_enrollment_count(&mut self, course_id: Uuid) -> Result<i64, AppError>;
    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), AppError>;
    async fn gift_card_type(&mut self, id: Uuid) -> Result<Option<GiftCardType>, AppError>;

    // cart
    async fn cart_lines(&mut self, user_id: Uuid) -> Result<Vec<(CartItem, Product)>, AppError>;
    async fn cart_item_for_product(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, AppError>;
    async fn cart_item(&mut self, user_id: Uuid, id: Uuid) -> Result<Option<CartItem>, AppError>;
    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<(), AppError>;
    async fn set_cart_item_quantity(&mut self, id: Uuid, quantity: i32) -> Result<(), AppError>;
    /// Deletes the row matching (id, user). Returns the number of rows
    /// removed; ownership is enforced by the predicate itself.
    async fn delete_cart_item(&mut self, user_id: Uuid, id: Uuid) -> Result<u64, AppError>;
    async fn clear_cart(&mut self, user_id: Uuid) -> Result<(), AppError>;

    // orders
    async fn insert_order(&mut self, order: &Order) -> Result<(), AppError>;
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), AppError>;
    async fn order(&mut self, id: Uuid) -> Result<Option<Order>, AppError>;
    async fn order_by_payment_intent(
        &mut self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, AppError>;
    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError>;
    async fn update_order(&mut self, order: &Order) -> Result<(), AppError>;
    async fn set_order_item_fulfillment(
        &mut self,
        id: Uuid,
        status: FulfillmentStatus,
    ) -> Result<(), AppError>;

    // discount codes
    async fn discount_code_by_code(&mut self, code: &str)
        -> Result<Option<DiscountCode>, AppError>;
    async fn discount_code_product_ids(&mut self, code_id: Uuid) -> Result<Vec<Uuid>, AppError>;
    async fn discount_code_use_count_for_user(
        &mut self,
        code_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, AppError>;
    /// Atomic `times_used` increment.
    async fn increment_discount_code_usage(&mut self, code_id: Uuid) -> Result<(), AppError>;

    // gift cards
    async fn gift_card_by_code(&mut self, code: &str) -> Result<Option<GiftCard>, AppError>;
    async fn gift_card_code_exists(&mut self, code: &str) -> Result<bool, AppError>;
    async fn insert_gift_card(&mut self, card: &GiftCard) -> Result<(), AppError>;
    async fn mark_gift_card_redeemed(
        &mut self,
        id: Uuid,
        redeemed_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    // payment plans
    async fn payment_plan_templates(&mut self) -> Result<Vec<PaymentPlanTemplate>, AppError>;
    async fn payment_plan_template(
        &mut self,
        id: Uuid,
    ) -> Result<Option<PaymentPlanTemplate>, AppError>;
    async fn payment_plan_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Option<PaymentPlan>, AppError>;
    async fn insert_payment_plan(&mut self, plan: &PaymentPlan) -> Result<(), AppError>;
    async fn insert_installment(&mut self, installment: &Installment) -> Result<(), AppError>;
    /// Installments the daily sweep should attempt: due Pending ones that
    /// have not been invoiced yet, plus Failed ones still under the retry
    /// limit. Overdue installments are never selected.
    async fn collectible_installments(
        &mut self,
        today: NaiveDate,
    ) -> Result<Vec<(Installment, PaymentPlan)>, AppError>;
    async fn update_installment(&mut self, installment: &Installment) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
