use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShoppingItem {
    pub id: Uuid,
    pub name: String,
    pub quantity: Option<String>,
    pub checked: bool,
    pub created_by: Uuid,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

super::impl_shared!(ShoppingItem);

#[derive(Debug, Deserialize)]
pub struct CreateShoppingItem {
    pub name: String,
    pub quantity: Option<String>,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateShoppingItem {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub checked: Option<bool>,
}
