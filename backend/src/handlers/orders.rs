use actix_web::{get, post, web, HttpRequest, HttpResponse};
use studio_platform_shared::{OrderResponse, RefundOrderRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::caller_id;
use crate::services::{CheckoutService, FulfillmentService};

#[get("/orders/{order_id}")]
pub async fn get_order(
    req: HttpRequest,
    checkout_service: web::Data<CheckoutService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let order = checkout_service
        .order_for_user(user_id, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(OrderResponse {
        id: order.id,
        status: order.status,
        subtotal: order.subtotal,
        discount_amount: order.discount_amount,
        credit_applied: order.credit_applied,
        total: order.total,
        created_at: order.created_at,
    }))
}

// Staff endpoint; authentication fronts this service elsewhere.
#[post("/orders/{order_id}/refund")]
pub async fn refund_order(
    fulfillment_service: web::Data<FulfillmentService>,
    path: web::Path<Uuid>,
    payload: web::Json<RefundOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order = fulfillment_service
        .refund_order(path.into_inner(), payload.to_store_credit)
        .await?;

    Ok(HttpResponse::Ok().json(order))
}
