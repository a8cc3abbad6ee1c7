use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Routine {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub days_of_week: Vec<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoutineItem {
    pub id: Uuid,
    pub routine_id: Uuid,
    pub label: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoutineCompletion {
    pub routine_id: Uuid,
    pub completion_date: NaiveDate,
    pub completed_item_ids: Vec<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutineWithItems {
    #[serde(flatten)]
    pub routine: Routine,
    pub items: Vec<RoutineItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoutine {
    pub name: String,
    #[serde(default)]
    pub days_of_week: Vec<i32>,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoutine {
    pub name: Option<String>,
    pub days_of_week: Option<Vec<i32>>,
    /// Replaces every item when present
    pub items: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRoutineItem {
    pub date: NaiveDate,
    pub item_id: Uuid,
}
