use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use studio_platform_shared::{
    AdminAdjustmentRequest, CreditBalanceResponse, CreditTransactionResponse,
    RedeemGiftCardRequest,
};

use crate::error::AppError;
use crate::handlers::{caller_id, validated};
use crate::services::CreditService;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[get("/credits/balance")]
pub async fn get_balance(
    req: HttpRequest,
    credit_service: web::Data<CreditService>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let balance = credit_service.balance(user_id).await?;
    Ok(HttpResponse::Ok().json(CreditBalanceResponse { balance }))
}

#[get("/credits/history")]
pub async fn get_history(
    req: HttpRequest,
    credit_service: web::Data<CreditService>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let history = credit_service.history(user_id, query.limit).await?;

    let response: Vec<CreditTransactionResponse> = history
        .into_iter()
        .map(|t| CreditTransactionResponse {
            id: t.id,
            amount: t.amount,
            transaction_type: t.transaction_type,
            description: t.description,
            created_at: t.created_at,
        })
        .collect();

    Ok(HttpResponse::Ok().json(response))
}

#[post("/credits/redeem-gift-card")]
pub async fn redeem_gift_card(
    req: HttpRequest,
    credit_service: web::Data<CreditService>,
    payload: web::Json<RedeemGiftCardRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = caller_id(&req)?;
    let payload = validated(payload.into_inner())?;

    let transaction = credit_service
        .redeem_gift_card(user_id, payload.code.trim())
        .await?;
    let balance = credit_service.balance(user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "credited": transaction.amount,
        "balance": balance,
    })))
}

// Staff endpoint; authentication fronts this service elsewhere.
#[post("/credits/adjust")]
pub async fn admin_adjust(
    credit_service: web::Data<CreditService>,
    payload: web::Json<AdminAdjustmentRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = validated(payload.into_inner())?;

    let transaction = credit_service
        .admin_adjustment(payload.user_id, payload.amount, payload.description)
        .await?;

    Ok(HttpResponse::Ok().json(transaction))
}
