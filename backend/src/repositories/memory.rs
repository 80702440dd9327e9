//! In-memory store used by the test suite.
//!
//! Units of work serialize on one mutex and mutate a staged copy of the
//! state; `commit` swaps the copy in, dropping without commit rolls back.
//! That coarse serialization gives the same observable ordering the
//! Postgres row lock provides, so the capacity race and idempotence
//! properties are exercised against identical service logic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CartItem, Course, CreditTransaction, DiscountCode, Enrollment, GiftCard, GiftCardType,
    Installment, Order, OrderItem, PaymentPlan, PaymentPlanTemplate, Product, User,
};
use studio_platform_shared::FulfillmentStatus;

use super::{Store, StoreTx};

#[derive(Debug, Default, Clone)]
pub struct MemState {
    pub users: HashMap<Uuid, User>,
    pub products: HashMap<Uuid, Product>,
    pub courses: HashMap<Uuid, Course>,
    pub enrollments: Vec<Enrollment>,
    pub gift_card_types: HashMap<Uuid, GiftCardType>,
    pub gift_cards: HashMap<Uuid, GiftCard>,
    pub cart_items: HashMap<Uuid, CartItem>,
    pub orders: HashMap<Uuid, Order>,
    pub order_items: HashMap<Uuid, OrderItem>,
    pub discount_codes: HashMap<Uuid, DiscountCode>,
    pub discount_code_products: HashMap<Uuid, Vec<Uuid>>,
    pub credit_transactions: Vec<CreditTransaction>,
    pub templates: HashMap<Uuid, PaymentPlanTemplate>,
    pub plans: HashMap<Uuid, PaymentPlan>,
    pub installments: HashMap<Uuid, Installment>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers for tests. Production data arrives through
    // migrations and admin tooling, not through the store trait.

    pub async fn add_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn add_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn add_course(&self, course: Course) {
        self.state.lock().await.courses.insert(course.id, course);
    }

    pub async fn add_gift_card_type(&self, gift_card_type: GiftCardType) {
        self.state
            .lock()
            .await
            .gift_card_types
            .insert(gift_card_type.id, gift_card_type);
    }

    pub async fn add_gift_card(&self, card: GiftCard) {
        self.state.lock().await.gift_cards.insert(card.id, card);
    }

    pub async fn add_discount_code(&self, code: DiscountCode, product_ids: Vec<Uuid>) {
        let mut state = self.state.lock().await;
        state.discount_code_products.insert(code.id, product_ids);
        state.discount_codes.insert(code.id, code);
    }

    pub async fn add_template(&self, template: PaymentPlanTemplate) {
        self.state
            .lock()
            .await
            .templates
            .insert(template.id, template);
    }

    pub async fn add_installment(&self, installment: Installment) {
        self.state
            .lock()
            .await
            .installments
            .insert(installment.id, installment);
    }

    pub async fn add_plan(&self, plan: PaymentPlan) {
        self.state.lock().await.plans.insert(plan.id, plan);
    }

    /// Snapshot of the committed state for assertions.
    pub async fn snapshot(&self) -> MemState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemState>,
    staged: MemState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn user(&mut self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn set_stripe_customer_id(
        &mut self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), AppError> {
        if let Some(user) = self.staged.users.get_mut(&user_id) {
            user.stripe_customer_id = Some(customer_id.to_string());
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn adjust_credit_balance(&mut self, user_id: Uuid, delta: i64) -> Result<i64, AppError> {
        let user = self
            .staged
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.credit_balance += delta;
        user.updated_at = Utc::now();
        Ok(user.credit_balance)
    }

    async fn insert_credit_transaction(
        &mut self,
        transaction: &CreditTransaction,
    ) -> Result<(), AppError> {
        self.staged.credit_transactions.push(transaction.clone());
        Ok(())
    }

    async fn credit_transactions_for_user(
        &mut self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CreditTransaction>, AppError> {
        let mut transactions: Vec<CreditTransaction> = self
            .staged
            .credit_transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        transactions.reverse();
        transactions.truncate(limit as usize);
        Ok(transactions)
    }

    async fn product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn course(&mut self, id: Uuid) -> Result<Option<Course>, AppError> {
        Ok(self.staged.courses.get(&id).cloned())
    }

    async fn lock_course(&mut self, id: Uuid) -> Result<Option<Course>, AppError> {
        // The whole state is already held exclusively for this unit of work.
        Ok(self.staged.courses.get(&id).cloned())
    }

    async fn confirmed_enrollment_count(&mut self, course_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .staged
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id)
            .count() as i64)
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), AppError> {
        self.staged.enrollments.push(enrollment.clone());
        Ok(())
    }

    async fn gift_card_type(&mut self, id: Uuid) -> Result<Option<GiftCardType>, AppError> {
        Ok(self.staged.gift_card_types.get(&id).cloned())
    }

    async fn cart_lines(&mut self, user_id: Uuid) -> Result<Vec<(CartItem, Product)>, AppError> {
        let mut items: Vec<CartItem> = self
            .staged
            .cart_items
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.created_at, i.id));

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = self
                .staged
                .products
                .get(&item.product_id)
                .cloned()
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "cart references missing product {}",
                        item.product_id
                    ))
                })?;
            lines.push((item, product));
        }
        Ok(lines)
    }

    async fn cart_item_for_product(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, AppError> {
        Ok(self
            .staged
            .cart_items
            .values()
            .find(|i| i.user_id == user_id && i.product_id == product_id)
            .cloned())
    }

    async fn cart_item(&mut self, user_id: Uuid, id: Uuid) -> Result<Option<CartItem>, AppError> {
        Ok(self
            .staged
            .cart_items
            .get(&id)
            .filter(|i| i.user_id == user_id)
            .cloned())
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<(), AppError> {
        self.staged.cart_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn set_cart_item_quantity(&mut self, id: Uuid, quantity: i32) -> Result<(), AppError> {
        if let Some(item) = self.staged.cart_items.get_mut(&id) {
            item.quantity = quantity;
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_cart_item(&mut self, user_id: Uuid, id: Uuid) -> Result<u64, AppError> {
        let matches = self
            .staged
            .cart_items
            .get(&id)
            .map(|i| i.user_id == user_id)
            .unwrap_or(false);
        if matches {
            self.staged.cart_items.remove(&id);
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn clear_cart(&mut self, user_id: Uuid) -> Result<(), AppError> {
        self.staged.cart_items.retain(|_, i| i.user_id != user_id);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), AppError> {
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), AppError> {
        self.staged.order_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn order(&mut self, id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn order_by_payment_intent(
        &mut self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, AppError> {
        Ok(self
            .staged
            .orders
            .values()
            .find(|o| o.stripe_payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let mut items: Vec<OrderItem> = self
            .staged
            .order_items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.created_at, i.id));
        Ok(items)
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), AppError> {
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn set_order_item_fulfillment(
        &mut self,
        id: Uuid,
        status: FulfillmentStatus,
    ) -> Result<(), AppError> {
        if let Some(item) = self.staged.order_items.get_mut(&id) {
            item.fulfillment_status = status;
        }
        Ok(())
    }

    async fn discount_code_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<DiscountCode>, AppError> {
        Ok(self
            .staged
            .discount_codes
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn discount_code_product_ids(&mut self, code_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self
            .staged
            .discount_code_products
            .get(&code_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn discount_code_use_count_for_user(
        &mut self,
        code_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, AppError> {
        Ok(self
            .staged
            .orders
            .values()
            .filter(|o| o.discount_code_id == Some(code_id) && o.user_id == user_id)
            .count() as i64)
    }

    async fn increment_discount_code_usage(&mut self, code_id: Uuid) -> Result<(), AppError> {
        if let Some(code) = self.staged.discount_codes.get_mut(&code_id) {
            code.times_used += 1;
            code.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn gift_card_by_code(&mut self, code: &str) -> Result<Option<GiftCard>, AppError> {
        Ok(self
            .staged
            .gift_cards
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn gift_card_code_exists(&mut self, code: &str) -> Result<bool, AppError> {
        Ok(self.staged.gift_cards.values().any(|c| c.code == code))
    }

    async fn insert_gift_card(&mut self, card: &GiftCard) -> Result<(), AppError> {
        self.staged.gift_cards.insert(card.id, card.clone());
        Ok(())
    }

    async fn mark_gift_card_redeemed(
        &mut self,
        id: Uuid,
        redeemed_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(card) = self.staged.gift_cards.get_mut(&id) {
            card.remaining_amount = 0;
            card.redeemed_by = Some(redeemed_by);
            card.redeemed_at = Some(at);
        }
        Ok(())
    }

    async fn payment_plan_templates(&mut self) -> Result<Vec<PaymentPlanTemplate>, AppError> {
        let mut templates: Vec<PaymentPlanTemplate> = self
            .staged
            .templates
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect();
        templates.sort_by_key(|t| t.number_of_installments);
        Ok(templates)
    }

    async fn payment_plan_template(
        &mut self,
        id: Uuid,
    ) -> Result<Option<PaymentPlanTemplate>, AppError> {
        Ok(self.staged.templates.get(&id).cloned())
    }

    async fn payment_plan_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Option<PaymentPlan>, AppError> {
        Ok(self
            .staged
            .plans
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn insert_payment_plan(&mut self, plan: &PaymentPlan) -> Result<(), AppError> {
        self.staged.plans.insert(plan.id, plan.clone());
        Ok(())
    }

    async fn insert_installment(&mut self, installment: &Installment) -> Result<(), AppError> {
        self.staged
            .installments
            .insert(installment.id, installment.clone());
        Ok(())
    }

    async fn collectible_installments(
        &mut self,
        today: NaiveDate,
    ) -> Result<Vec<(Installment, PaymentPlan)>, AppError> {
        let mut selected: Vec<Installment> = self
            .staged
            .installments
            .values()
            .filter(|i| i.is_collectible(today))
            .cloned()
            .collect();
        selected.sort_by_key(|i| (i.due_date, i.installment_number));

        let mut result = Vec::with_capacity(selected.len());
        for installment in selected {
            let plan = self
                .staged
                .plans
                .get(&installment.plan_id)
                .cloned()
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "installment references missing plan {}",
                        installment.plan_id
                    ))
                })?;
            result.push((installment, plan));
        }
        Ok(result)
    }

    async fn update_installment(&mut self, installment: &Installment) -> Result<(), AppError> {
        self.staged
            .installments
            .insert(installment.id, installment.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), AppError> {
        *self.guard = self.staged;
        Ok(())
    }
}
