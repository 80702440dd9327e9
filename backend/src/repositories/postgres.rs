use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::credit::CreditTransactionRow;
use crate::models::product::ProductRow;
use crate::models::{
    CartItem, Course, CreditTransaction, DiscountCode, Enrollment, GiftCard, GiftCardType,
    Installment, Order, OrderItem, PaymentPlan, PaymentPlanTemplate, Product, User,
};
use studio_platform_shared::constants::INSTALLMENT_MAX_RETRIES;
use studio_platform_shared::FulfillmentStatus;

use super::{Store, StoreTx};

/// Postgres-backed store. One [`StoreTx`] maps onto one database
/// transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn user(&mut self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, credit_balance, stripe_customer_id, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn set_stripe_customer_id(
        &mut self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET stripe_customer_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(customer_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn adjust_credit_balance(&mut self, user_id: Uuid, delta: i64) -> Result<i64, AppError> {
        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET credit_balance = credit_balance + $2, updated_at = NOW()
             WHERE id = $1
             RETURNING credit_balance",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        balance.ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn insert_credit_transaction(
        &mut self,
        transaction: &CreditTransaction,
    ) -> Result<(), AppError> {
        let (reference_type, reference_id) = match transaction.reference {
            Some(reference) => {
                let (t, id) = reference.to_columns();
                (Some(t), Some(id))
            }
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO credit_transactions
                 (id, user_id, amount, transaction_type, reference_type, reference_id, description, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(transaction.id)
        .bind(transaction.user_id)
        .bind(transaction.amount)
        .bind(transaction.transaction_type)
        .bind(reference_type)
        .bind(reference_id)
        .bind(&transaction.description)
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn credit_transactions_for_user(
        &mut self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CreditTransaction>, AppError> {
        let rows = sqlx::query_as::<_, CreditTransactionRow>(
            "SELECT id, user_id, amount, transaction_type, reference_type, reference_id, description, created_at
             FROM credit_transactions
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(CreditTransaction::try_from).collect()
    }

    async fn product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, description, price, active, productable_type, productable_id, created_at, updated_at
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn course(&mut self, id: Uuid) -> Result<Option<Course>, AppError> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, name, capacity, active, created_at, updated_at FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(course)
    }

    async fn lock_course(&mut self, id: Uuid) -> Result<Option<Course>, AppError> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, name, capacity, active, created_at, updated_at
             FROM courses WHERE id = $1
             FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(course)
    }

    async fn confirmed_enrollment_count(&mut self, course_id: Uuid) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(count)
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO enrollments (id, course_id, order_item_id, purchaser_id, student_name, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(enrollment.id)
        .bind(enrollment.course_id)
        .bind(enrollment.order_item_id)
        .bind(enrollment.purchaser_id)
        .bind(&enrollment.student_name)
        .bind(enrollment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn gift_card_type(&mut self, id: Uuid) -> Result<Option<GiftCardType>, AppError> {
        let gift_card_type = sqlx::query_as::<_, GiftCardType>(
            "SELECT id, name, denomination, active, created_at FROM gift_card_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(gift_card_type)
    }

    async fn cart_lines(&mut self, user_id: Uuid) -> Result<Vec<(CartItem, Product)>, AppError> {
        let items = sqlx::query_as::<_, CartItem>(
            "SELECT id, user_id, product_id, quantity, created_at, updated_at
             FROM cart_items WHERE user_id = $1
             ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = self.product(item.product_id).await?.ok_or_else(|| {
                AppError::Internal(format!("cart references missing product {}", item.product_id))
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
        let item = sqlx::query_as::<_, CartItem>(
            "SELECT id, user_id, product_id, quantity, created_at, updated_at
             FROM cart_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(item)
    }

    async fn cart_item(&mut self, user_id: Uuid, id: Uuid) -> Result<Option<CartItem>, AppError> {
        let item = sqlx::query_as::<_, CartItem>(
            "SELECT id, user_id, product_id, quantity, created_at, updated_at
             FROM cart_items WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(item)
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO cart_items (id, user_id, product_id, quantity, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(item.id)
        .bind(item.user_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_cart_item_quantity(&mut self, id: Uuid, quantity: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_cart_item(&mut self, user_id: Uuid, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn clear_cart(&mut self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO orders
                 (id, user_id, status, subtotal, discount_code_id, discount_amount, credit_applied,
                  total, stripe_checkout_session_id, stripe_payment_intent_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.status)
        .bind(order.subtotal)
        .bind(order.discount_code_id)
        .bind(order.discount_amount)
        .bind(order.credit_applied)
        .bind(order.total)
        .bind(&order.stripe_checkout_session_id)
        .bind(&order.stripe_payment_intent_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO order_items
                 (id, order_id, product_id, quantity, unit_price, total_price, fulfillment_status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(item.id)
        .bind(item.order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(item.fulfillment_status)
        .bind(item.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn order(&mut self, id: Uuid) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, subtotal, discount_code_id, discount_amount, credit_applied,
                    total, stripe_checkout_session_id, stripe_payment_intent_id, created_at, updated_at
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(order)
    }

    async fn order_by_payment_intent(
        &mut self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, subtotal, discount_code_id, discount_amount, credit_applied,
                    total, stripe_checkout_session_id, stripe_payment_intent_id, created_at, updated_at
             FROM orders WHERE stripe_payment_intent_id = $1",
        )
        .bind(payment_intent_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(order)
    }

    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, quantity, unit_price, total_price, fulfillment_status, created_at
             FROM order_items WHERE order_id = $1
             ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(items)
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE orders SET
                 status = $2, subtotal = $3, discount_code_id = $4, discount_amount = $5,
                 credit_applied = $6, total = $7, stripe_checkout_session_id = $8,
                 stripe_payment_intent_id = $9, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.status)
        .bind(order.subtotal)
        .bind(order.discount_code_id)
        .bind(order.discount_amount)
        .bind(order.credit_applied)
        .bind(order.total)
        .bind(&order.stripe_checkout_session_id)
        .bind(&order.stripe_payment_intent_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_order_item_fulfillment(
        &mut self,
        id: Uuid,
        status: FulfillmentStatus,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE order_items SET fulfillment_status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn discount_code_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<DiscountCode>, AppError> {
        let discount_code = sqlx::query_as::<_, DiscountCode>(
            "SELECT id, code, discount_type, value, min_order_amount, max_uses, max_uses_per_user,
                    expires_at, active, times_used, created_at, updated_at
             FROM discount_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(discount_code)
    }

    async fn discount_code_product_ids(&mut self, code_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT product_id FROM discount_code_products WHERE discount_code_id = $1",
        )
        .bind(code_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn discount_code_use_count_for_user(
        &mut self,
        code_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE discount_code_id = $1 AND user_id = $2",
        )
        .bind(code_id)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn increment_discount_code_usage(&mut self, code_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE discount_codes SET times_used = times_used + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(code_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn gift_card_by_code(&mut self, code: &str) -> Result<Option<GiftCard>, AppError> {
        let card = sqlx::query_as::<_, GiftCard>(
            "SELECT id, code, gift_card_type_id, initial_amount, remaining_amount, purchaser_id,
                    redeemed_by, order_id, active, redeemed_at, created_at
             FROM gift_cards WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(card)
    }

    async fn gift_card_code_exists(&mut self, code: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gift_cards WHERE code = $1")
            .bind(code)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count > 0)
    }

    async fn insert_gift_card(&mut self, card: &GiftCard) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO gift_cards
                 (id, code, gift_card_type_id, initial_amount, remaining_amount, purchaser_id,
                  redeemed_by, order_id, active, redeemed_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(card.id)
        .bind(&card.code)
        .bind(card.gift_card_type_id)
        .bind(card.initial_amount)
        .bind(card.remaining_amount)
        .bind(card.purchaser_id)
        .bind(card.redeemed_by)
        .bind(card.order_id)
        .bind(card.active)
        .bind(card.redeemed_at)
        .bind(card.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn mark_gift_card_redeemed(
        &mut self,
        id: Uuid,
        redeemed_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE gift_cards SET remaining_amount = 0, redeemed_by = $2, redeemed_at = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(redeemed_by)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn payment_plan_templates(&mut self) -> Result<Vec<PaymentPlanTemplate>, AppError> {
        let templates = sqlx::query_as::<_, PaymentPlanTemplate>(
            "SELECT id, name, applies_to, min_price, max_price, number_of_installments, frequency,
                    active, created_at
             FROM payment_plan_templates WHERE active = TRUE
             ORDER BY number_of_installments",
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(templates)
    }

    async fn payment_plan_template(
        &mut self,
        id: Uuid,
    ) -> Result<Option<PaymentPlanTemplate>, AppError> {
        let template = sqlx::query_as::<_, PaymentPlanTemplate>(
            "SELECT id, name, applies_to, min_price, max_price, number_of_installments, frequency,
                    active, created_at
             FROM payment_plan_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(template)
    }

    async fn payment_plan_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Option<PaymentPlan>, AppError> {
        let plan = sqlx::query_as::<_, PaymentPlan>(
            "SELECT id, order_id, template_id, method, total_amount, number_of_installments,
                    frequency, stripe_customer_id, stripe_payment_method_id, created_at
             FROM payment_plans WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(plan)
    }

    async fn insert_payment_plan(&mut self, plan: &PaymentPlan) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO payment_plans
                 (id, order_id, template_id, method, total_amount, number_of_installments,
                  frequency, stripe_customer_id, stripe_payment_method_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(plan.id)
        .bind(plan.order_id)
        .bind(plan.template_id)
        .bind(plan.method)
        .bind(plan.total_amount)
        .bind(plan.number_of_installments)
        .bind(plan.frequency)
        .bind(&plan.stripe_customer_id)
        .bind(&plan.stripe_payment_method_id)
        .bind(plan.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_installment(&mut self, installment: &Installment) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO installments
                 (id, plan_id, installment_number, amount, due_date, status, paid_at, retry_count,
                  stripe_payment_intent_id, stripe_invoice_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(installment.id)
        .bind(installment.plan_id)
        .bind(installment.installment_number)
        .bind(installment.amount)
        .bind(installment.due_date)
        .bind(installment.status)
        .bind(installment.paid_at)
        .bind(installment.retry_count)
        .bind(&installment.stripe_payment_intent_id)
        .bind(&installment.stripe_invoice_id)
        .bind(installment.created_at)
        .bind(installment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn collectible_installments(
        &mut self,
        today: NaiveDate,
    ) -> Result<Vec<(Installment, PaymentPlan)>, AppError> {
        let installments = sqlx::query_as::<_, Installment>(
            "SELECT id, plan_id, installment_number, amount, due_date, status, paid_at, retry_count,
                    stripe_payment_intent_id, stripe_invoice_id, created_at, updated_at
             FROM installments
             WHERE (status = 'pending' AND due_date <= $1 AND stripe_invoice_id IS NULL)
                OR (status = 'failed' AND retry_count < $2)
             ORDER BY due_date, installment_number",
        )
        .bind(today)
        .bind(INSTALLMENT_MAX_RETRIES)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut selected = Vec::with_capacity(installments.len());
        for installment in installments {
            let plan = sqlx::query_as::<_, PaymentPlan>(
                "SELECT id, order_id, template_id, method, total_amount, number_of_installments,
                        frequency, stripe_customer_id, stripe_payment_method_id, created_at
                 FROM payment_plans WHERE id = $1",
            )
            .bind(installment.plan_id)
            .fetch_one(&mut *self.tx)
            .await?;

            selected.push((installment, plan));
        }

        Ok(selected)
    }

    async fn update_installment(&mut self, installment: &Installment) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE installments SET
                 status = $2, paid_at = $3, retry_count = $4, stripe_payment_intent_id = $5,
                 stripe_invoice_id = $6, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(installment.id)
        .bind(installment.status)
        .bind(installment.paid_at)
        .bind(installment.retry_count)
        .bind(&installment.stripe_payment_intent_id)
        .bind(&installment.stripe_invoice_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
