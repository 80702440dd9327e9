use std::sync::Arc;

use actix_web::{post, web, HttpRequest, HttpResponse};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::payment::{GatewayEvent, PaymentGateway};
use crate::services::FulfillmentService;

/// Stripe webhook endpoint.
///
/// Signature failures are rejected with 400 before any processing. A
/// completed checkout session completes its order; a failed payment
/// intent fails its pending order; everything else is acknowledged as
/// unhandled. Completion errors are logged, not surfaced, since the
/// gateway retries on non-2xx and there is no user to report to.
#[post("/webhooks/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    gateway: web::Data<Arc<dyn PaymentGateway>>,
    fulfillment_service: web::Data<FulfillmentService>,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing Stripe signature".to_string()))?;

    let event = gateway
        .construct_webhook_event(&body, signature)
        .map_err(|e| {
            warn!("Rejected webhook: {}", e);
            e
        })?;

    match event {
        GatewayEvent::CheckoutSessionCompleted {
            order_id,
            payment_intent_id,
        } => {
            let order_id = order_id.ok_or_else(|| {
                AppError::Validation("Missing order_id metadata".to_string())
            })?;

            fulfillment_service
                .record_session_payment(order_id, payment_intent_id)
                .await?;

            match fulfillment_service.complete_order(order_id).await {
                Ok(completed) => info!(
                    "Webhook completion for order {}: {}",
                    order_id,
                    if completed { "fulfilled" } else { "skipped" }
                ),
                Err(e) => error!("Webhook completion for order {} errored: {}", order_id, e),
            }
        }
        GatewayEvent::PaymentIntentFailed { payment_intent_id } => {
            let failed = fulfillment_service
                .fail_order_for_intent(&payment_intent_id)
                .await?;
            if !failed {
                info!(
                    "No pending order for failed payment intent {}",
                    payment_intent_id
                );
            }
        }
        GatewayEvent::Unhandled { kind } => {
            info!("Unhandled webhook event: {}", kind);
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
    })))
}
