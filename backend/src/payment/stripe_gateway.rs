use std::collections::HashMap;

use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CollectionMethod, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCustomer, CreateInvoice,
    CreateInvoiceItem, CreatePaymentIntent, CreateRefund, Currency, Customer, CustomerId,
    EventObject, EventType, Expandable, Invoice, InvoiceItem, PaymentIntent,
    PaymentIntentSetupFutureUsage, PaymentIntentStatus, PaymentMethodId, Refund, Webhook,
};
use tracing::warn;

use crate::error::AppError;
use crate::models::User;

use super::{
    GatewayEvent, GatewayIntentStatus, GatewayPaymentIntent, GatewaySession, PaymentGateway,
    SessionLineItem,
};

/// Stripe-backed payment gateway.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret,
        }
    }

    fn intent_from_stripe(intent: PaymentIntent) -> GatewayPaymentIntent {
        let status = match intent.status {
            PaymentIntentStatus::Succeeded => GatewayIntentStatus::Succeeded,
            PaymentIntentStatus::Processing => GatewayIntentStatus::Processing,
            PaymentIntentStatus::RequiresAction => GatewayIntentStatus::RequiresAction,
            PaymentIntentStatus::RequiresPaymentMethod => GatewayIntentStatus::RequiresPaymentMethod,
            PaymentIntentStatus::Canceled => GatewayIntentStatus::Canceled,
            _ => GatewayIntentStatus::Other,
        };

        let customer_id = intent.customer.as_ref().map(|c| match c {
            Expandable::Id(id) => id.to_string(),
            Expandable::Object(customer) => customer.id.to_string(),
        });

        let payment_method_id = intent.payment_method.as_ref().map(|pm| match pm {
            Expandable::Id(id) => id.to_string(),
            Expandable::Object(method) => method.id.to_string(),
        });

        GatewayPaymentIntent {
            id: intent.id.to_string(),
            client_secret: intent.client_secret.clone(),
            status,
            customer_id,
            payment_method_id,
            amount: intent.amount,
        }
    }

    fn parse_customer_id(customer_id: &str) -> Result<CustomerId, AppError> {
        customer_id
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid customer id: {}", customer_id)))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_or_get_customer(&self, user: &User) -> Result<String, AppError> {
        if let Some(customer_id) = &user.stripe_customer_id {
            return Ok(customer_id.clone());
        }

        let mut create_params = CreateCustomer::new();
        create_params.email = Some(&user.email);
        create_params.name = Some(&user.name);
        create_params.metadata = Some(HashMap::from([(
            "user_id".to_string(),
            user.id.to_string(),
        )]));

        let customer = Customer::create(&self.client, create_params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Ok(customer.id.to_string())
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        line_items: &[SessionLineItem],
        success_url: &str,
        cancel_url: &str,
        metadata: HashMap<String, String>,
    ) -> Result<GatewaySession, AppError> {
        let customer_id = Self::parse_customer_id(customer_id)?;

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(success_url);
        params.cancel_url = Some(cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.customer = Some(customer_id);
        params.line_items = Some(
            line_items
                .iter()
                .map(|line| CreateCheckoutSessionLineItems {
                    price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                        currency: Currency::USD,
                        product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                            name: line.name.clone(),
                            ..Default::default()
                        }),
                        unit_amount: Some(line.unit_amount),
                        ..Default::default()
                    }),
                    quantity: Some(line.quantity as u64),
                    ..Default::default()
                })
                .collect(),
        );
        params.metadata = Some(metadata);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Ok(GatewaySession {
            id: session.id.to_string(),
            url: session.url,
        })
    }

    async fn create_payment_intent(
        &self,
        customer_id: &str,
        amount: i64,
        metadata: HashMap<String, String>,
        setup_future_usage: bool,
    ) -> Result<GatewayPaymentIntent, AppError> {
        let customer_id = Self::parse_customer_id(customer_id)?;

        let mut create_params = CreatePaymentIntent::new(amount, Currency::USD);
        create_params.customer = Some(customer_id);
        create_params.metadata = Some(metadata);
        if setup_future_usage {
            create_params.setup_future_usage = Some(PaymentIntentSetupFutureUsage::OffSession);
        }

        let payment_intent = PaymentIntent::create(&self.client, create_params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Ok(Self::intent_from_stripe(payment_intent))
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<GatewayPaymentIntent, AppError> {
        let id = payment_intent_id.parse().map_err(|_| {
            AppError::Validation(format!("Invalid payment intent id: {}", payment_intent_id))
        })?;

        let payment_intent = PaymentIntent::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Ok(Self::intent_from_stripe(payment_intent))
    }

    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<GatewayEvent, AppError> {
        let payload_str = std::str::from_utf8(payload)
            .map_err(|_| AppError::Validation("Invalid UTF-8 in webhook payload".to_string()))?;

        let event = Webhook::construct_event(payload_str, signature, &self.webhook_secret)
            .map_err(|e| AppError::Validation(format!("Invalid webhook signature: {}", e)))?;

        let event = match event.type_ {
            EventType::CheckoutSessionCompleted => {
                if let EventObject::CheckoutSession(session) = &event.data.object {
                    let order_id = session
                        .metadata
                        .as_ref()
                        .and_then(|m| m.get("order_id"))
                        .and_then(|raw| raw.parse().ok());
                    let payment_intent_id = session.payment_intent.as_ref().map(|pi| match pi {
                        Expandable::Id(id) => id.to_string(),
                        Expandable::Object(intent) => intent.id.to_string(),
                    });
                    GatewayEvent::CheckoutSessionCompleted {
                        order_id,
                        payment_intent_id,
                    }
                } else {
                    warn!("checkout.session.completed event carried an unexpected object");
                    GatewayEvent::Unhandled {
                        kind: event.type_.to_string(),
                    }
                }
            }
            EventType::PaymentIntentPaymentFailed => {
                if let EventObject::PaymentIntent(intent) = &event.data.object {
                    GatewayEvent::PaymentIntentFailed {
                        payment_intent_id: intent.id.to_string(),
                    }
                } else {
                    warn!("payment_intent.payment_failed event carried an unexpected object");
                    GatewayEvent::Unhandled {
                        kind: event.type_.to_string(),
                    }
                }
            }
            other => GatewayEvent::Unhandled {
                kind: other.to_string(),
            },
        };

        Ok(event)
    }

    async fn refund_payment_intent(
        &self,
        payment_intent_id: &str,
        amount: Option<i64>,
    ) -> Result<String, AppError> {
        let id = payment_intent_id.parse().map_err(|_| {
            AppError::Validation(format!("Invalid payment intent id: {}", payment_intent_id))
        })?;

        let mut params = CreateRefund::new();
        params.payment_intent = Some(id);
        params.amount = amount;

        let refund = Refund::create(&self.client, params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Ok(refund.id.to_string())
    }

    async fn charge_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        amount: i64,
        description: &str,
        metadata: HashMap<String, String>,
    ) -> Result<GatewayPaymentIntent, AppError> {
        let customer_id = Self::parse_customer_id(customer_id)?;
        let payment_method_id: PaymentMethodId = payment_method_id.parse().map_err(|_| {
            AppError::Validation(format!("Invalid payment method id: {}", payment_method_id))
        })?;

        let mut create_params = CreatePaymentIntent::new(amount, Currency::USD);
        create_params.customer = Some(customer_id);
        create_params.payment_method = Some(payment_method_id);
        create_params.confirm = Some(true);
        create_params.description = Some(description);
        create_params.metadata = Some(metadata);

        let payment_intent = PaymentIntent::create(&self.client, create_params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Ok(Self::intent_from_stripe(payment_intent))
    }

    async fn create_and_send_invoice(
        &self,
        customer_id: &str,
        amount: i64,
        description: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, AppError> {
        let customer_id = Self::parse_customer_id(customer_id)?;

        let mut item_params = CreateInvoiceItem::new(customer_id.clone());
        item_params.amount = Some(amount);
        item_params.currency = Some(Currency::USD);
        item_params.description = Some(description);

        InvoiceItem::create(&self.client, item_params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        // auto_advance lets Stripe finalize and email the invoice without
        // further calls from our side.
        let mut invoice_params = CreateInvoice::new();
        invoice_params.customer = Some(customer_id);
        invoice_params.collection_method = Some(CollectionMethod::SendInvoice);
        invoice_params.days_until_due = Some(30);
        invoice_params.auto_advance = Some(true);
        invoice_params.description = Some(description);
        invoice_params.metadata = Some(metadata);

        let invoice = Invoice::create(&self.client, invoice_params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Ok(invoice.id.to_string())
    }
}
