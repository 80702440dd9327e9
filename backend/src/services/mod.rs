//! Business services for the studio commerce platform.
//!
//! Services own the money pipeline: cart mutation, discount application,
//! checkout orchestration, order fulfillment, the credit ledger and
//! installment billing. Persistence goes through the `Store` seam and
//! gateway calls through the `PaymentGateway` seam, never inside an open
//! unit of work.

pub mod billing_service;
pub mod cart_service;
pub mod checkout_service;
pub mod credit_service;
pub mod discount_service;
pub mod fulfillment_service;

#[cfg(test)]
pub mod test_support;

pub use billing_service::BillingService;
pub use cart_service::CartService;
pub use checkout_service::CheckoutService;
pub use credit_service::CreditService;
pub use discount_service::DiscountService;
pub use fulfillment_service::FulfillmentService;
