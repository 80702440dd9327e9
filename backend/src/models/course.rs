use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Seats left given the current confirmed enrollment count.
    pub fn available_capacity(&self, enrolled: i64) -> i64 {
        (self.capacity as i64 - enrolled).max(0)
    }
}

/// A purchased seat in a course. Created unassigned; the purchaser names
/// the student later.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub order_item_id: Option<Uuid>,
    pub purchaser_id: Uuid,
    pub student_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(course_id: Uuid, order_item_id: Option<Uuid>, purchaser_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_id,
            order_item_id,
            purchaser_id,
            student_name: None,
            created_at: Utc::now(),
        }
    }
}
