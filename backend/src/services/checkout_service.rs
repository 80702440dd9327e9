use std::collections::HashMap;
use std::sync::Arc;

use studio_platform_shared::constants::ERROR_EMPTY_CART;
use studio_platform_shared::{
    format_usd, CheckoutIntentResponse, CheckoutSessionResponse, CreatePaymentIntentRequest,
    CreditTransactionType, OrderStatus, PaymentPlanMethod, PlanOptionResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CreditReference, InstallmentSplit, Order, OrderItem, PaymentPlanTemplate, Product, User,
};
use crate::payment::{GatewayIntentStatus, PaymentGateway, SessionLineItem};
use crate::repositories::{Store, StoreTx};
use crate::services::billing_service::BillingService;
use crate::services::credit_service::CreditService;
use crate::services::discount_service::DiscountService;
use crate::services::fulfillment_service::FulfillmentService;


/// Builds orders from carts and orchestrates payment collection.
///
/// Local state is committed before any gateway call; the gateway result is
/// applied in a short follow-up unit of work so no locks are held across
/// network I/O.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    discount_service: DiscountService,
    credit_service: CreditService,
    fulfillment_service: FulfillmentService,
    billing_service: BillingService,
    success_url: String,
    cancel_url: String,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        discount_service: DiscountService,
        credit_service: CreditService,
        fulfillment_service: FulfillmentService,
        billing_service: BillingService,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            store,
            gateway,
            discount_service,
            credit_service,
            fulfillment_service,
            billing_service,
            success_url,
            cancel_url,
        }
    }

    /// Hosted-checkout flow: order rows first, then a gateway session the
    /// customer is redirected to. The webhook completes the order.
    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        success_url: Option<String>,
        cancel_url: Option<String>,
    ) -> Result<CheckoutSessionResponse, AppError> {
        let mut tx = self.store.begin().await?;
        let user = self.load_user(&mut *tx, user_id).await?;
        let (order, items) = self.build_order_from_cart(&mut *tx, &user).await?;
        tx.commit().await?;

        let customer_id = self.gateway.create_or_get_customer(&user).await?;

        let line_items: Vec<SessionLineItem> = items
            .iter()
            .map(|(item, product)| SessionLineItem {
                name: product.name.clone(),
                unit_amount: item.unit_price,
                quantity: item.quantity,
            })
            .collect();

        let metadata = HashMap::from([("order_id".to_string(), order.id.to_string())]);
        let session = self
            .gateway
            .create_checkout_session(
                &customer_id,
                &line_items,
                success_url.as_deref().unwrap_or(&self.success_url),
                cancel_url.as_deref().unwrap_or(&self.cancel_url),
                metadata,
            )
            .await?;

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order(order.id)
            .await?
            .ok_or_else(|| AppError::Internal("checkout order vanished".to_string()))?;
        order.stripe_checkout_session_id = Some(session.id.clone());
        tx.update_order(&order).await?;
        self.persist_customer_id(&mut *tx, &user, &customer_id).await?;
        tx.commit().await?;

        info!(
            "Checkout session {} created for order {} (user {})",
            session.id, order.id, user_id
        );

        Ok(CheckoutSessionResponse {
            order_id: order.id,
            checkout_url: session.url,
        })
    }

    /// Embedded-element flow. Adjustments apply in a fixed order: discount
    /// code, then store credit, then either immediate completion (total
    /// reached zero) or a payment intent for the amount due now.
    pub async fn create_payment_intent(
        &self,
        user_id: Uuid,
        request: CreatePaymentIntentRequest,
    ) -> Result<CheckoutIntentResponse, AppError> {
        let mut tx = self.store.begin().await?;
        let user = self.load_user(&mut *tx, user_id).await?;
        let (mut order, items) = self.build_order_from_cart(&mut *tx, &user).await?;

        let mut discount_summary = None;
        if let Some(code) = request
            .discount_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            let product_ids: Vec<Uuid> = items.iter().map(|(_, p)| p.id).collect();
            let discount_code = self
                .discount_service
                .apply_within(&mut *tx, code, user_id, order.subtotal, &product_ids)
                .await?;

            order.discount_code_id = Some(discount_code.id);
            order.discount_amount = discount_code.calculate_discount(order.subtotal);
            order.recompute_total();
            tx.increment_discount_code_usage(discount_code.id).await?;

            discount_summary = Some(format!(
                "{} (-{})",
                discount_code.code,
                format_usd(order.discount_amount)
            ));
        }

        let mut credit_summary = None;
        if let Some(requested) = request.credit_to_apply {
            if requested <= 0 {
                return Err(AppError::Validation(
                    "Credit amount must be positive".to_string(),
                ));
            }

            let actual = requested.min(order.total).min(user.credit_balance);
            if actual > 0 {
                self.credit_service
                    .adjust_credit(
                        &mut *tx,
                        user_id,
                        -actual,
                        CreditTransactionType::CheckoutDebit,
                        Some(CreditReference::Order(order.id)),
                        Some(format!("Store credit applied to order {}", order.id)),
                    )
                    .await?;
                order.credit_applied = actual;
                order.recompute_total();
                credit_summary = Some(format!("{} store credit applied", format_usd(actual)));
            }
        }

        // Fully covered by discount and credit: fulfill right away, the
        // gateway is never involved.
        if order.total == 0 {
            let order_items: Vec<OrderItem> = items.iter().map(|(i, _)| i.clone()).collect();
            self.fulfillment_service
                .fulfill_items_within(&mut *tx, &order, &order_items)
                .await?;
            order.status = OrderStatus::Completed;
            tx.update_order(&order).await?;
            tx.clear_cart(user_id).await?;
            tx.commit().await?;

            info!("Order {} completed at checkout with zero total", order.id);

            return Ok(CheckoutIntentResponse {
                order_id: order.id,
                client_secret: None,
                subtotal: order.subtotal,
                discount_amount: order.discount_amount,
                credit_applied: order.credit_applied,
                total: 0,
                amount_due_now: 0,
                zero_total: true,
                discount_summary,
                credit_summary,
                plan_summary: None,
            });
        }

        let mut plan_summary = None;
        let mut amount_due_now = order.total;
        let mut plan_requested = false;
        if let Some(template_id) = request.plan_template_id {
            let method = request.plan_method.ok_or_else(|| {
                AppError::Validation("A payment plan method is required".to_string())
            })?;

            let template = self.eligible_template(&mut *tx, template_id, &order, &items).await?;
            let split = template.installment_amounts(order.total);
            amount_due_now = split.first;
            plan_requested = true;
            plan_summary = Some(Self::plan_summary(&template, split, method));
        }

        tx.update_order(&order).await?;
        tx.commit().await?;

        let customer_id = self.gateway.create_or_get_customer(&user).await?;

        let mut metadata = HashMap::from([("order_id".to_string(), order.id.to_string())]);
        if let Some(template_id) = request.plan_template_id {
            metadata.insert("plan_template_id".to_string(), template_id.to_string());
        }
        if let Some(method) = request.plan_method {
            metadata.insert("plan_method".to_string(), method.to_string());
        }

        let intent = self
            .gateway
            .create_payment_intent(&customer_id, amount_due_now, metadata, plan_requested)
            .await?;

        let mut tx = self.store.begin().await?;
        order.stripe_payment_intent_id = Some(intent.id.clone());
        tx.update_order(&order).await?;
        self.persist_customer_id(&mut *tx, &user, &customer_id).await?;
        tx.commit().await?;

        info!(
            "Payment intent {} created for order {} ({} due now)",
            intent.id, order.id, amount_due_now
        );

        Ok(CheckoutIntentResponse {
            order_id: order.id,
            client_secret: intent.client_secret,
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            credit_applied: order.credit_applied,
            total: order.total,
            amount_due_now,
            zero_total: false,
            discount_summary,
            credit_summary,
            plan_summary,
        })
    }

    /// Verifies the payment with the gateway and completes the order. Plan
    /// identifiers come from the request, but the customer and payment
    /// method always come from the confirmed intent, never from the
    /// client.
    pub async fn confirm_payment(
        &self,
        order_id: Uuid,
        plan_template_id: Option<Uuid>,
        plan_method: Option<PaymentPlanMethod>,
    ) -> Result<Order, AppError> {
        let order = {
            let mut tx = self.store.begin().await?;
            tx.order(order_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?
        };

        if order.status != OrderStatus::Pending {
            return Err(AppError::Validation(
                "Order is not awaiting payment".to_string(),
            ));
        }
        let payment_intent_id = order.stripe_payment_intent_id.clone().ok_or_else(|| {
            AppError::Validation("Order has no payment intent".to_string())
        })?;

        let intent = self
            .gateway
            .retrieve_payment_intent(&payment_intent_id)
            .await?;
        if intent.status != GatewayIntentStatus::Succeeded {
            return Err(AppError::Validation(
                "Payment has not completed".to_string(),
            ));
        }

        self.fulfillment_service.complete_order(order_id).await?;

        let order = {
            let mut tx = self.store.begin().await?;
            tx.order(order_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?
        };

        match order.status {
            OrderStatus::Completed => {}
            status => {
                warn!("Order {} did not complete (status {})", order.id, status);
                return Err(AppError::Validation(
                    "Order could not be fulfilled; any collected payment has been refunded"
                        .to_string(),
                ));
            }
        }

        if let Some(template_id) = plan_template_id {
            let method = plan_method.ok_or_else(|| {
                AppError::Validation("A payment plan method is required".to_string())
            })?;
            self.billing_service
                .create_payment_plan(
                    &order,
                    template_id,
                    method,
                    intent.customer_id.clone(),
                    intent.payment_method_id.clone(),
                )
                .await?;
        }

        Ok(order)
    }

    /// Fetches an order scoped to its owner.
    pub async fn order_for_user(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, AppError> {
        let mut tx = self.store.begin().await?;
        tx.order(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
    }

    /// Payment plan templates that may be offered for the current cart.
    pub async fn plan_options(&self, user_id: Uuid) -> Result<Vec<PlanOptionResponse>, AppError> {
        let mut tx = self.store.begin().await?;
        let lines = tx.cart_lines(user_id).await?;
        let total: i64 = lines
            .iter()
            .map(|(item, product)| product.price * item.quantity as i64)
            .sum();
        let product_types: Vec<_> = lines
            .iter()
            .map(|(_, product)| product.kind.productable_type())
            .collect();

        let templates = tx.payment_plan_templates().await?;
        let options = templates
            .into_iter()
            .filter(|t| t.matches(total, &product_types))
            .map(|t| {
                let split = t.installment_amounts(total);
                PlanOptionResponse {
                    template_id: t.id,
                    name: t.name,
                    number_of_installments: t.number_of_installments,
                    frequency: t.frequency,
                    first_amount: split.first,
                    installment_amount: split.remaining,
                }
            })
            .collect();

        Ok(options)
    }

    async fn load_user(&self, tx: &mut dyn StoreTx, user_id: Uuid) -> Result<User, AppError> {
        tx.user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Snapshots the cart into Order + OrderItems priced from the current
    /// product prices, after a best-effort capacity check per line.
    async fn build_order_from_cart(
        &self,
        tx: &mut dyn StoreTx,
        user: &User,
    ) -> Result<(Order, Vec<(OrderItem, Product)>), AppError> {
        let lines = tx.cart_lines(user.id).await?;
        if lines.is_empty() {
            return Err(AppError::Validation(ERROR_EMPTY_CART.to_string()));
        }

        for (item, product) in &lines {
            if !product.is_purchasable() {
                return Err(AppError::Validation(format!(
                    "{} is no longer available",
                    product.name
                )));
            }
            if let Some(course_id) = product.kind.course_id() {
                let course = tx.course(course_id).await?.ok_or_else(|| {
                    AppError::Internal(format!("product references missing course {}", course_id))
                })?;
                let enrolled = tx.confirmed_enrollment_count(course_id).await?;
                let available = course.available_capacity(enrolled);
                if item.quantity as i64 > available {
                    return Err(AppError::Validation(format!(
                        "Only {} spots left in {}",
                        available, product.name
                    )));
                }
            }
        }

        let subtotal: i64 = lines
            .iter()
            .map(|(item, product)| product.price * item.quantity as i64)
            .sum();

        let order = Order::new(user.id, subtotal);
        tx.insert_order(&order).await?;

        let mut items = Vec::with_capacity(lines.len());
        for (cart_item, product) in lines {
            let item = OrderItem::new(order.id, product.id, cart_item.quantity, product.price);
            tx.insert_order_item(&item).await?;
            items.push((item, product));
        }

        Ok((order, items))
    }

    async fn eligible_template(
        &self,
        tx: &mut dyn StoreTx,
        template_id: Uuid,
        order: &Order,
        items: &[(OrderItem, Product)],
    ) -> Result<PaymentPlanTemplate, AppError> {
        let template = tx
            .payment_plan_template(template_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment plan template not found".to_string()))?;

        let product_types: Vec<_> = items
            .iter()
            .map(|(_, product)| product.kind.productable_type())
            .collect();
        if !template.matches(order.total, &product_types) {
            return Err(AppError::Validation(
                "This payment plan is not available for this order".to_string(),
            ));
        }

        Ok(template)
    }

    async fn persist_customer_id(
        &self,
        tx: &mut dyn StoreTx,
        user: &User,
        customer_id: &str,
    ) -> Result<(), AppError> {
        if user.stripe_customer_id.as_deref() != Some(customer_id) {
            tx.set_stripe_customer_id(user.id, customer_id).await?;
        }
        Ok(())
    }

    fn plan_summary(
        template: &PaymentPlanTemplate,
        split: InstallmentSplit,
        method: PaymentPlanMethod,
    ) -> String {
        let collection = match method {
            PaymentPlanMethod::AutoCharge => "charged automatically",
            PaymentPlanMethod::ManualInvoice => "invoiced",
        };
        format!(
            "{} {} payments: {} today, then {} x {} ({})",
            template.number_of_installments,
            template.frequency,
            format_usd(split.first),
            template.number_of_installments - 1,
            format_usd(split.remaining),
            collection
        )
    }
}
