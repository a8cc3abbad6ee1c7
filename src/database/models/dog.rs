use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Dog {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub meals_per_day: i32,
    pub meal_labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DogMeal {
    pub dog_id: Uuid,
    pub meal_date: NaiveDate,
    pub meal_index: i32,
    pub completed_by: Uuid,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDog {
    pub name: String,
    #[serde(default = "default_meals")]
    pub meals_per_day: i32,
    #[serde(default)]
    pub meal_labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDog {
    pub name: Option<String>,
    pub meals_per_day: Option<i32>,
    pub meal_labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleMeal {
    pub date: NaiveDate,
    pub meal_index: i32,
}

fn default_meals() -> i32 {
    2
}
