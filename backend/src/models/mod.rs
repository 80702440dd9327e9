//! Domain models for the studio commerce platform.
//!
//! Each model corresponds to a database table. Pure pricing and state
//! machine logic lives here; persistence goes through the repository
//! layer.

pub mod cart_item;
pub mod course;
pub mod credit;
pub mod discount_code;
pub mod gift_card;
pub mod order;
pub mod payment_plan;
pub mod product;
pub mod user;

pub use cart_item::CartItem;
pub use course::{Course, Enrollment};
pub use credit::{CreditReference, CreditTransaction};
pub use discount_code::DiscountCode;
pub use gift_card::{GiftCard, GiftCardType};
pub use order::{Order, OrderItem};
pub use payment_plan::{Installment, InstallmentSplit, PaymentPlan, PaymentPlanTemplate};
pub use product::{Product, ProductKind};
pub use user::User;
