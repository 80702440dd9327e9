use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studio_platform_shared::ProductableType;
use uuid::Uuid;

use crate::error::AppError;

/// The catalog entity a product is backed by, resolved once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ProductKind {
    Course(Uuid),
    GiftCardType(Uuid),
    Costume(Uuid),
    Standalone,
}

impl ProductKind {
    /// Rebuilds the kind from the polymorphic column pair. A type without
    /// an id (or the reverse) is a data-integrity failure, not a fallthrough.
    pub fn from_columns(
        productable_type: Option<ProductableType>,
        productable_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        match (productable_type, productable_id) {
            (None, None) => Ok(ProductKind::Standalone),
            (Some(ProductableType::Course), Some(id)) => Ok(ProductKind::Course(id)),
            (Some(ProductableType::GiftCardType), Some(id)) => Ok(ProductKind::GiftCardType(id)),
            (Some(ProductableType::Costume), Some(id)) => Ok(ProductKind::Costume(id)),
            (t, id) => Err(AppError::Internal(format!(
                "inconsistent productable columns: type={:?} id={:?}",
                t, id
            ))),
        }
    }

    pub fn to_columns(self) -> (Option<ProductableType>, Option<Uuid>) {
        match self {
            ProductKind::Course(id) => (Some(ProductableType::Course), Some(id)),
            ProductKind::GiftCardType(id) => (Some(ProductableType::GiftCardType), Some(id)),
            ProductKind::Costume(id) => (Some(ProductableType::Costume), Some(id)),
            ProductKind::Standalone => (None, None),
        }
    }

    pub fn productable_type(&self) -> Option<ProductableType> {
        self.to_columns().0
    }

    pub fn course_id(&self) -> Option<Uuid> {
        match self {
            ProductKind::Course(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Price in cents. Must be positive for the product to be purchasable.
    pub price: i64,
    pub active: bool,
    pub kind: ProductKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_purchasable(&self) -> bool {
        self.active && self.price > 0
    }
}

/// Raw row used for queries. The polymorphic column pair is resolved into
/// a [`ProductKind`] when converting to [`Product`].
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub active: bool,
    pub productable_type: Option<ProductableType>,
    pub productable_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let kind = ProductKind::from_columns(row.productable_type, row.productable_id)?;
        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            active: row.active,
            kind,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
