//! Payment gateway seam.
//!
//! The checkout and billing services depend on this trait; Stripe is the
//! production implementation. Webhook payloads are resolved into the
//! closed [`GatewayEvent`] enum here so the handler can match
//! exhaustively instead of dispatching on raw event-type strings.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;

#[cfg(test)]
pub mod mock;
pub mod stripe_gateway;

pub use stripe_gateway::StripeGateway;

/// One line on a hosted checkout session.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayIntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    Canceled,
    Other,
}

#[derive(Debug, Clone)]
pub struct GatewayPaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: GatewayIntentStatus,
    pub customer_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub amount: i64,
}

/// Webhook events the platform reacts to. Everything else arrives as
/// `Unhandled` and is acknowledged without processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    CheckoutSessionCompleted {
        order_id: Option<Uuid>,
        payment_intent_id: Option<String>,
    },
    PaymentIntentFailed {
        payment_intent_id: String,
    },
    Unhandled {
        kind: String,
    },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the user's gateway customer id, creating the customer if
    /// needed. Persisting the id on the user is the caller's job.
    async fn create_or_get_customer(&self, user: &User) -> Result<String, AppError>;

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        line_items: &[SessionLineItem],
        success_url: &str,
        cancel_url: &str,
        metadata: HashMap<String, String>,
    ) -> Result<GatewaySession, AppError>;

    /// `setup_future_usage` asks the gateway to store the payment method
    /// for later off-session charges (installment plans).
    async fn create_payment_intent(
        &self,
        customer_id: &str,
        amount: i64,
        metadata: HashMap<String, String>,
        setup_future_usage: bool,
    ) -> Result<GatewayPaymentIntent, AppError>;

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<GatewayPaymentIntent, AppError>;

    /// Verifies the webhook signature and resolves the payload into a
    /// [`GatewayEvent`]. A bad signature is a Validation error.
    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<GatewayEvent, AppError>;

    /// Refunds the intent, fully when `amount` is None. Returns the
    /// refund id.
    async fn refund_payment_intent(
        &self,
        payment_intent_id: &str,
        amount: Option<i64>,
    ) -> Result<String, AppError>;

    /// Off-session charge against a stored payment method.
    async fn charge_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        amount: i64,
        description: &str,
        metadata: HashMap<String, String>,
    ) -> Result<GatewayPaymentIntent, AppError>;

    /// Creates and sends an invoice to the customer. Returns the invoice
    /// id; payment confirmation arrives later by webhook.
    async fn create_and_send_invoice(
        &self,
        customer_id: &str,
        amount: i64,
        description: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, AppError>;
}
