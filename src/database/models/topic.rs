use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::visibility::TopicRef;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

super::impl_shared!(Topic);

impl From<&Topic> for TopicRef {
    fn from(topic: &Topic) -> Self {
        TopicRef {
            id: topic.id,
            name: topic.name.clone(),
            created_by: topic.created_by,
            partner_id: topic.partner_id,
            group_id: topic.group_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTopic {
    pub name: String,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RenameTopic {
    pub name: String,
}
