use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing::{info, Level};

mod config;
mod database;
mod error;
mod handlers;
mod models;
mod payment;
mod repositories;
mod services;

use config::AppConfig;
use database::Database;
use error::AppError;
use payment::{PaymentGateway, StripeGateway};
use repositories::{PgStore, Store};
use services::{
    BillingService, CartService, CheckoutService, CreditService, DiscountService,
    FulfillmentService,
};

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::from_env()?;
    info!(
        "Starting studio platform backend on {}:{}",
        config.host, config.port
    );

    let database = Database::new(&config.database_url).await?;
    database.migrate().await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(database.pool().clone()));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(
        config.stripe_secret_key.clone(),
        config.stripe_webhook_secret.clone(),
    ));

    let credit_service = CreditService::new(store.clone());
    let discount_service = DiscountService::new(store.clone());
    let cart_service = CartService::new(store.clone());
    let fulfillment_service =
        FulfillmentService::new(store.clone(), gateway.clone(), credit_service.clone());
    let billing_service = BillingService::new(store.clone(), gateway.clone());
    let checkout_service = CheckoutService::new(
        store.clone(),
        gateway.clone(),
        discount_service.clone(),
        credit_service.clone(),
        fulfillment_service.clone(),
        billing_service.clone(),
        config.checkout_success_url.clone(),
        config.checkout_cancel_url.clone(),
    );

    billing_service.start_daily_sweep();

    let bind_address = format!("{}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(cart_service.clone()))
            .app_data(web::Data::new(credit_service.clone()))
            .app_data(web::Data::new(discount_service.clone()))
            .app_data(web::Data::new(checkout_service.clone()))
            .app_data(web::Data::new(fulfillment_service.clone()))
            .app_data(web::Data::new(billing_service.clone()))
            .service(
                web::scope("/api/v1")
                    .service(handlers::health::health_check)
                    .service(handlers::cart::get_cart)
                    .service(handlers::cart::add_to_cart)
                    .service(handlers::cart::update_cart_item)
                    .service(handlers::cart::remove_cart_item)
                    .service(handlers::checkout::create_checkout_session)
                    .service(handlers::checkout::create_payment_intent)
                    .service(handlers::checkout::confirm_payment)
                    .service(handlers::checkout::plan_options)
                    .service(handlers::checkout::discount_preview)
                    .service(handlers::credits::get_balance)
                    .service(handlers::credits::get_history)
                    .service(handlers::credits::redeem_gift_card)
                    .service(handlers::credits::admin_adjust)
                    .service(handlers::orders::get_order)
                    .service(handlers::orders::refund_order),
            )
            .service(handlers::webhooks::stripe_webhook)
    })
    .bind(bind_address)?
    .run()
    .await
    .map_err(AppError::from)
}
