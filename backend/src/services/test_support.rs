//! Builders and wiring shared by the service test suites.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    Course, DiscountCode, GiftCard, GiftCardType, PaymentPlanTemplate, Product, ProductKind, User,
};
use crate::payment::mock::MockGateway;
use crate::payment::PaymentGateway;
use crate::repositories::memory::MemoryStore;
use crate::repositories::Store;
use crate::services::{
    BillingService, CartService, CheckoutService, CreditService, DiscountService,
    FulfillmentService,
};
use studio_platform_shared::{DiscountType, InstallmentFrequency};

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<MockGateway>,
    pub cart: CartService,
    pub credit: CreditService,
    pub discount: DiscountService,
    pub fulfillment: FulfillmentService,
    pub billing: BillingService,
    pub checkout: CheckoutService,
}

pub fn harness() -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::new());

    let dyn_store: Arc<dyn Store> = store.clone();
    let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();

    let credit = CreditService::new(dyn_store.clone());
    let discount = DiscountService::new(dyn_store.clone());
    let fulfillment = FulfillmentService::new(dyn_store.clone(), dyn_gateway.clone(), credit.clone());
    let billing = BillingService::new(dyn_store.clone(), dyn_gateway.clone());
    let cart = CartService::new(dyn_store.clone());
    let checkout = CheckoutService::new(
        dyn_store,
        dyn_gateway,
        discount.clone(),
        credit.clone(),
        fulfillment.clone(),
        billing.clone(),
        "https://studio.example/checkout/success".to_string(),
        "https://studio.example/checkout/cancel".to_string(),
    );

    TestHarness {
        store,
        gateway,
        cart,
        credit,
        discount,
        fulfillment,
        billing,
        checkout,
    }
}

pub fn user(credit_balance: i64) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        email: format!("{}@example.com", id.simple()),
        name: "Test Dancer".to_string(),
        credit_balance,
        stripe_customer_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn course(capacity: i32) -> Course {
    Course {
        id: Uuid::new_v4(),
        name: "Ballet I".to_string(),
        capacity,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn product(price: i64, kind: ProductKind) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: match kind {
            ProductKind::Course(_) => "Ballet I enrollment".to_string(),
            ProductKind::GiftCardType(_) => "Gift card".to_string(),
            ProductKind::Costume(_) => "Recital costume".to_string(),
            ProductKind::Standalone => "Studio water bottle".to_string(),
        },
        description: None,
        price,
        active: true,
        kind,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn gift_card_type(denomination: i64) -> GiftCardType {
    GiftCardType {
        id: Uuid::new_v4(),
        name: "Studio gift card".to_string(),
        denomination,
        active: true,
        created_at: Utc::now(),
    }
}

pub fn gift_card(card_type: &GiftCardType, amount: i64, purchaser: Uuid) -> GiftCard {
    let code = GiftCard::generate_code(&mut rand::thread_rng());
    GiftCard::new(card_type.id, code, amount, purchaser, None)
}

pub fn percentage_code(code: &str, percent: i64) -> DiscountCode {
    discount_code(code, DiscountType::Percentage, percent)
}

pub fn fixed_code(code: &str, cents: i64) -> DiscountCode {
    discount_code(code, DiscountType::FixedAmount, cents)
}

fn discount_code(code: &str, discount_type: DiscountType, value: i64) -> DiscountCode {
    DiscountCode {
        id: Uuid::new_v4(),
        code: code.to_string(),
        discount_type,
        value,
        min_order_amount: None,
        max_uses: None,
        max_uses_per_user: None,
        expires_at: None,
        active: true,
        times_used: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn template(number_of_installments: i32, frequency: InstallmentFrequency) -> PaymentPlanTemplate {
    PaymentPlanTemplate {
        id: Uuid::new_v4(),
        name: format!("{} installments", number_of_installments),
        applies_to: None,
        min_price: 0,
        max_price: 1_000_000,
        number_of_installments,
        frequency,
        active: true,
        created_at: Utc::now(),
    }
}
