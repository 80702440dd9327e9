use std::sync::Arc;

use studio_platform_shared::constants::ERROR_PRODUCT_UNAVAILABLE;
use studio_platform_shared::{CartLineResponse, CartResponse};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CartItem, ProductKind};
use crate::repositories::{Store, StoreTx};


/// Cart mutation with live capacity checks.
///
/// The capacity checks here are a best-effort convenience for the shopper;
/// the authoritative check runs under a row lock when the order completes.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Adds a product to the cart. Adding a product that is already in the
    /// cart increments its quantity instead of inserting a second row.
    pub async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, AppError> {
        if quantity < 1 {
            return Err(AppError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;

        tx.user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let product = tx
            .product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        if !product.is_purchasable() {
            return Err(AppError::Validation(ERROR_PRODUCT_UNAVAILABLE.to_string()));
        }

        let existing = tx.cart_item_for_product(user_id, product_id).await?;
        let new_quantity = existing.as_ref().map(|i| i.quantity).unwrap_or(0) + quantity;

        // Requested plus already-cart-held quantity must fit the seats left.
        self.check_course_capacity(&mut *tx, &product.kind, &product.name, new_quantity)
            .await?;

        let item = match existing {
            Some(mut item) => {
                tx.set_cart_item_quantity(item.id, new_quantity).await?;
                item.quantity = new_quantity;
                item
            }
            None => {
                let item = CartItem::new(user_id, product_id, quantity);
                tx.insert_cart_item(&item).await?;
                item
            }
        };

        tx.commit().await?;

        info!(
            "User {} cart: {} x{} (now {})",
            user_id, product.name, quantity, new_quantity
        );

        Ok(item)
    }

    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        cart_item_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, AppError> {
        if quantity < 1 {
            return Err(AppError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;

        let mut item = tx
            .cart_item(user_id, cart_item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

        let product = tx.product(item.product_id).await?.ok_or_else(|| {
            AppError::Internal(format!("cart references missing product {}", item.product_id))
        })?;

        self.check_course_capacity(&mut *tx, &product.kind, &product.name, quantity)
            .await?;

        tx.set_cart_item_quantity(item.id, quantity).await?;
        item.quantity = quantity;
        tx.commit().await?;

        Ok(item)
    }

    /// Removes a cart line. Ownership is enforced by the delete predicate
    /// itself: a row that exists but belongs to someone else reads as not
    /// found.
    pub async fn remove(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let deleted = tx.delete_cart_item(user_id, cart_item_id).await?;
        if deleted == 0 {
            return Err(AppError::NotFound("Cart item not found".to_string()));
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn cart(&self, user_id: Uuid) -> Result<CartResponse, AppError> {
        let mut tx = self.store.begin().await?;
        let lines = tx.cart_lines(user_id).await?;

        let lines: Vec<CartLineResponse> = lines
            .into_iter()
            .map(|(item, product)| CartLineResponse {
                cart_item_id: item.id,
                product_id: product.id,
                product_name: product.name,
                quantity: item.quantity,
                unit_price: product.price,
                line_total: product.price * item.quantity as i64,
            })
            .collect();

        let subtotal = lines.iter().map(|l| l.line_total).sum();

        Ok(CartResponse { lines, subtotal })
    }

    async fn check_course_capacity(
        &self,
        tx: &mut dyn StoreTx,
        kind: &ProductKind,
        product_name: &str,
        wanted: i32,
    ) -> Result<(), AppError> {
        let Some(course_id) = kind.course_id() else {
            return Ok(());
        };

        let course = tx.course(course_id).await?.ok_or_else(|| {
            AppError::Internal(format!("product references missing course {}", course_id))
        })?;

        if !course.active {
            return Err(AppError::Validation(ERROR_PRODUCT_UNAVAILABLE.to_string()));
        }

        let enrolled = tx.confirmed_enrollment_count(course_id).await?;
        let available = course.available_capacity(enrolled);
        if wanted as i64 > available {
            return Err(AppError::Validation(format!(
                "Only {} spots left in {}",
                available, product_name
            )));
        }

        Ok(())
    }
}
