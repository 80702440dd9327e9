use actix_web::{get, post, web, HttpRequest, HttpResponse};
use studio_platform_shared::{
    format_usd, ConfirmPaymentRequest, CreateCheckoutSessionRequest, CreatePaymentIntentRequest,
    DiscountPreviewRequest, DiscountPreviewResponse,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::{caller_id, validated};
use crate::services::{CartService, CheckoutService, DiscountService};

#[post("/checkout/session")]
pub async fn create_checkout_session(
    req: HttpRequest,
    checkout_service: web::Data<CheckoutService>,
    payload: web::Json<CreateCheckoutSessionRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let payload = validated(payload.into_inner())?;

    let response = checkout_service
        .create_checkout_session(user_id, payload.success_url, payload.cancel_url)
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

#[post("/checkout/payment-intent")]
pub async fn create_payment_intent(
    req: HttpRequest,
    checkout_service: web::Data<CheckoutService>,
    payload: web::Json<CreatePaymentIntentRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let payload = validated(payload.into_inner())?;

    let response = checkout_service
        .create_payment_intent(user_id, payload)
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

#[post("/checkout/confirm")]
pub async fn confirm_payment(
    req: HttpRequest,
    checkout_service: web::Data<CheckoutService>,
    payload: web::Json<ConfirmPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    caller_id(&req)?;
    let payload = payload.into_inner();

    let order = checkout_service
        .confirm_payment(
            payload.order_id,
            payload.plan_template_id,
            payload.plan_method,
        )
        .await?;

    Ok(HttpResponse::Ok().json(order))
}

#[get("/checkout/plan-options")]
pub async fn plan_options(
    req: HttpRequest,
    checkout_service: web::Data<CheckoutService>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let options = checkout_service.plan_options(user_id).await?;
    Ok(HttpResponse::Ok().json(options))
}

#[post("/checkout/discount-preview")]
pub async fn discount_preview(
    req: HttpRequest,
    cart_service: web::Data<CartService>,
    discount_service: web::Data<DiscountService>,
    payload: web::Json<DiscountPreviewRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let payload = validated(payload.into_inner())?;

    let cart = cart_service.cart(user_id).await?;
    let product_ids: Vec<Uuid> = cart.lines.iter().map(|l| l.product_id).collect();

    let (code, amount) = discount_service
        .preview(user_id, payload.code.trim(), cart.subtotal, &product_ids)
        .await?;

    Ok(HttpResponse::Ok().json(DiscountPreviewResponse {
        summary: format!("{} (-{})", code.code, format_usd(amount)),
        code: code.code,
        discount_amount: amount,
    }))
}
