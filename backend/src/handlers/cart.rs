use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use studio_platform_shared::{AddToCartRequest, UpdateCartItemRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::{caller_id, validated};
use crate::services::CartService;

#[get("/cart")]
pub async fn get_cart(
    req: HttpRequest,
    cart_service: web::Data<CartService>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let cart = cart_service.cart(user_id).await?;
    Ok(HttpResponse::Ok().json(cart))
}

#[post("/cart")]
pub async fn add_to_cart(
    req: HttpRequest,
    cart_service: web::Data<CartService>,
    payload: web::Json<AddToCartRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let payload = validated(payload.into_inner())?;

    let item = cart_service
        .add(user_id, payload.product_id, payload.quantity.unwrap_or(1))
        .await?;

    Ok(HttpResponse::Created().json(item))
}

#[put("/cart/{cart_item_id}")]
pub async fn update_cart_item(
    req: HttpRequest,
    cart_service: web::Data<CartService>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateCartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let payload = validated(payload.into_inner())?;

    let item = cart_service
        .update_quantity(user_id, path.into_inner(), payload.quantity)
        .await?;

    Ok(HttpResponse::Ok().json(item))
}

#[delete("/cart/{cart_item_id}")]
pub async fn remove_cart_item(
    req: HttpRequest,
    cart_service: web::Data<CartService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    cart_service.remove(user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
