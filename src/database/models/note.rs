use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: Uuid,
    pub topic_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub created_by: Uuid,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

super::impl_shared!(Note, topic);

#[derive(Debug, Deserialize)]
pub struct CreateNote {
    pub topic_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub content: Option<String>,
    pub topic_id: Option<Uuid>,
}
