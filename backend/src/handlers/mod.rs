//! HTTP handlers. Thin glue over the services: parse, validate, call,
//! serialize.
//!
//! The caller's identity always arrives as an explicit `X-User-Id` header
//! rather than ambient session state; real authentication fronts this
//! service elsewhere.

use actix_web::HttpRequest;
use uuid::Uuid;

use crate::error::AppError;

pub mod cart;
pub mod checkout;
pub mod credits;
pub mod health;
pub mod orders;
pub mod webhooks;

pub fn caller_id(req: &HttpRequest) -> Result<Uuid, AppError> {
    req.headers()
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| AppError::Validation("Missing or invalid X-User-Id header".to_string()))
}

/// Maps validator errors onto the platform's validation failure.
pub fn validated<T: validator::Validate>(payload: T) -> Result<T, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(payload)
}
