use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studio_platform_shared::CreditTransactionType;
use uuid::Uuid;

use crate::error::AppError;

/// The entity that caused a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum CreditReference {
    GiftCard(Uuid),
    Order(Uuid),
    Installment(Uuid),
}

impl CreditReference {
    pub fn from_columns(
        reference_type: Option<String>,
        reference_id: Option<Uuid>,
    ) -> Result<Option<Self>, AppError> {
        match (reference_type.as_deref(), reference_id) {
            (None, None) => Ok(None),
            (Some("gift_card"), Some(id)) => Ok(Some(CreditReference::GiftCard(id))),
            (Some("order"), Some(id)) => Ok(Some(CreditReference::Order(id))),
            (Some("installment"), Some(id)) => Ok(Some(CreditReference::Installment(id))),
            (t, id) => Err(AppError::Internal(format!(
                "inconsistent ledger reference columns: type={:?} id={:?}",
                t, id
            ))),
        }
    }

    pub fn to_columns(self) -> (&'static str, Uuid) {
        match self {
            CreditReference::GiftCard(id) => ("gift_card", id),
            CreditReference::Order(id) => ("order", id),
            CreditReference::Installment(id) => ("installment", id),
        }
    }
}

/// Append-only ledger row. Positive amounts credit the balance, negative
/// amounts debit it; the user's `credit_balance` must be updated in the
/// same unit of work as the insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub transaction_type: CreditTransactionType,
    pub reference: Option<CreditReference>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    pub fn new(
        user_id: Uuid,
        amount: i64,
        transaction_type: CreditTransactionType,
        reference: Option<CreditReference>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            transaction_type,
            reference,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Raw row used for queries; the reference column pair is resolved into a
/// [`CreditReference`] when converting.
#[derive(Debug, Clone, FromRow)]
pub struct CreditTransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub transaction_type: CreditTransactionType,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CreditTransactionRow> for CreditTransaction {
    type Error = AppError;

    fn try_from(row: CreditTransactionRow) -> Result<Self, Self::Error> {
        let reference = CreditReference::from_columns(row.reference_type, row.reference_id)?;
        Ok(CreditTransaction {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            transaction_type: row.transaction_type,
            reference,
            description: row.description,
            created_at: row.created_at,
        })
    }
}
