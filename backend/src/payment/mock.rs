//! Scriptable in-process gateway for tests.
//!
//! Records every call, mints deterministic ids, and lets tests steer
//! intent statuses and charge outcomes. Webhook payloads are plain JSON
//! (`{"type": ..., "order_id": ..., "payment_intent_id": ...}`) and any
//! signature other than `"valid"` is rejected.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::User;

use super::{
    GatewayEvent, GatewayIntentStatus, GatewayPaymentIntent, GatewaySession, PaymentGateway,
    SessionLineItem,
};

#[derive(Default)]
struct MockState {
    counter: u64,
    calls: Vec<String>,
    intents: HashMap<String, GatewayPaymentIntent>,
    refunds: Vec<(String, Option<i64>)>,
    invoices: Vec<(String, i64)>,
    charge_outcomes: VecDeque<Result<GatewayIntentStatus, String>>,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == name)
            .count()
    }

    pub fn refunds(&self) -> Vec<(String, Option<i64>)> {
        self.state.lock().unwrap().refunds.clone()
    }

    pub fn invoices(&self) -> Vec<(String, i64)> {
        self.state.lock().unwrap().invoices.clone()
    }

    /// Simulates the customer paying: the intent retrieves as Succeeded
    /// with a stored payment method attached.
    pub fn mark_intent_succeeded(&self, payment_intent_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(intent) = state.intents.get_mut(payment_intent_id) {
            intent.status = GatewayIntentStatus::Succeeded;
            if intent.payment_method_id.is_none() {
                intent.payment_method_id = Some(format!("pm_{}", payment_intent_id));
            }
        }
    }

    /// Queues the outcome of the next `charge_payment_method` call. An Err
    /// simulates a thrown gateway error rather than a declined charge.
    pub fn push_charge_outcome(&self, outcome: Result<GatewayIntentStatus, String>) {
        self.state.lock().unwrap().charge_outcomes.push_back(outcome);
    }

    fn next_id(state: &mut MockState, prefix: &str) -> String {
        state.counter += 1;
        format!("{}_{}", prefix, state.counter)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_or_get_customer(&self, user: &User) -> Result<String, AppError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create_or_get_customer".to_string());
        if let Some(customer_id) = &user.stripe_customer_id {
            return Ok(customer_id.clone());
        }
        Ok(Self::next_id(&mut state, "cus"))
    }

    async fn create_checkout_session(
        &self,
        _customer_id: &str,
        _line_items: &[SessionLineItem],
        _success_url: &str,
        _cancel_url: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<GatewaySession, AppError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create_checkout_session".to_string());
        let id = Self::next_id(&mut state, "cs");
        Ok(GatewaySession {
            url: Some(format!("https://checkout.example/{}", id)),
            id,
        })
    }

    async fn create_payment_intent(
        &self,
        customer_id: &str,
        amount: i64,
        _metadata: HashMap<String, String>,
        _setup_future_usage: bool,
    ) -> Result<GatewayPaymentIntent, AppError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create_payment_intent".to_string());
        let id = Self::next_id(&mut state, "pi");
        let intent = GatewayPaymentIntent {
            client_secret: Some(format!("{}_secret", id)),
            id: id.clone(),
            status: GatewayIntentStatus::RequiresPaymentMethod,
            customer_id: Some(customer_id.to_string()),
            payment_method_id: None,
            amount,
        };
        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<GatewayPaymentIntent, AppError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("retrieve_payment_intent".to_string());
        state
            .intents
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| AppError::External("No such payment intent".to_string()))
    }

    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<GatewayEvent, AppError> {
        if signature != "valid" {
            return Err(AppError::Validation("Invalid webhook signature".to_string()));
        }

        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))?;
        let kind = value["type"].as_str().unwrap_or("unknown").to_string();

        let event = match kind.as_str() {
            "checkout.session.completed" => GatewayEvent::CheckoutSessionCompleted {
                order_id: value["order_id"].as_str().and_then(|raw| raw.parse().ok()),
                payment_intent_id: value["payment_intent_id"].as_str().map(str::to_string),
            },
            "payment_intent.payment_failed" => GatewayEvent::PaymentIntentFailed {
                payment_intent_id: value["payment_intent_id"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => GatewayEvent::Unhandled { kind },
        };

        Ok(event)
    }

    async fn refund_payment_intent(
        &self,
        payment_intent_id: &str,
        amount: Option<i64>,
    ) -> Result<String, AppError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("refund_payment_intent".to_string());
        state.refunds.push((payment_intent_id.to_string(), amount));
        Ok(Self::next_id(&mut state, "re"))
    }

    async fn charge_payment_method(
        &self,
        customer_id: &str,
        _payment_method_id: &str,
        amount: i64,
        _description: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<GatewayPaymentIntent, AppError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("charge_payment_method".to_string());

        let status = match state.charge_outcomes.pop_front() {
            Some(Ok(status)) => status,
            Some(Err(message)) => return Err(AppError::External(message)),
            None => GatewayIntentStatus::Succeeded,
        };

        let id = Self::next_id(&mut state, "pi");
        let intent = GatewayPaymentIntent {
            client_secret: None,
            id: id.clone(),
            status,
            customer_id: Some(customer_id.to_string()),
            payment_method_id: Some("pm_stored".to_string()),
            amount,
        };
        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn create_and_send_invoice(
        &self,
        customer_id: &str,
        amount: i64,
        _description: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<String, AppError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create_and_send_invoice".to_string());
        state.invoices.push((customer_id.to_string(), amount));
        Ok(Self::next_id(&mut state, "in"))
    }
}
