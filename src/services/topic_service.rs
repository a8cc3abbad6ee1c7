use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::topic::{CreateTopic, Topic};
use crate::database::DatabaseError;
use crate::visibility::{partner_topic_name, ShareScope};

use super::{load_viewer, requested_scope, required_text, ServiceError, ServiceResult};

const TOPIC_COLUMNS: &str = "id, name, created_by, partner_id, group_id, created_at";

/// Rename and delete belong to the creator. Others who can file notes under the topic are
/// refused; everyone else is told it does not exist.
fn creator_only(user_id: Uuid, creator: Option<Uuid>, can_use: bool) -> ServiceResult<()> {
    match creator {
        Some(c) if c == user_id => Ok(()),
        Some(_) if can_use => Err(ServiceError::Forbidden("Only the topic creator can do that".to_string())),
        _ => Err(ServiceError::NotFound("Topic not found".to_string())),
    }
}

pub struct TopicService {
    pool: PgPool,
}

impl TopicService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Topics the user may file notes under, by name
    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<Topic>> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let sql = format!(
            "SELECT {} FROM topics WHERE created_by = ANY($1) OR group_id = ANY($2) ORDER BY lower(name)",
            TOPIC_COLUMNS
        );
        let topics = sqlx::query_as::<_, Topic>(&sql)
            .bind(viewer.circle())
            .bind(viewer.group_ids())
            .fetch_all(&self.pool)
            .await?;
        Ok(topics.into_iter().filter(|t| viewer.can_use_topic(t.id)).collect())
    }

    /// A blank name on a partner topic falls back to "Notes with <partner>"
    pub async fn create(&self, user_id: Uuid, input: CreateTopic) -> ServiceResult<Topic> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let scope = requested_scope(&viewer, input.partner_id, input.group_id)?;

        let name = match (input.name.trim().is_empty(), scope) {
            (true, ShareScope::Partner(partner)) => partner_topic_name(&self.partner_label(partner).await?),
            _ => required_text("name", &input.name, 100)?,
        };

        let sql = format!(
            "INSERT INTO topics (id, name, created_by, partner_id, group_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            TOPIC_COLUMNS
        );
        let topic = sqlx::query_as::<_, Topic>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(user_id)
            .bind(scope.partner_id())
            .bind(scope.group_id())
            .fetch_one(&self.pool)
            .await?;
        info!("Created topic {} ({})", topic.name, topic.id);
        Ok(topic)
    }

    pub async fn rename(&self, user_id: Uuid, topic_id: Uuid, name: &str) -> ServiceResult<Topic> {
        let name = required_text("name", name, 100)?;
        self.require_creator(user_id, topic_id).await?;
        let sql = format!("UPDATE topics SET name = $2 WHERE id = $1 RETURNING {}", TOPIC_COLUMNS);
        let topic = sqlx::query_as::<_, Topic>(&sql)
            .bind(topic_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(topic)
    }

    /// Deleting a topic removes the notes filed under it
    pub async fn delete(&self, user_id: Uuid, topic_id: Uuid) -> ServiceResult<()> {
        self.require_creator(user_id, topic_id).await?;
        sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(topic_id)
            .execute(&self.pool)
            .await?;
        info!("Deleted topic {}", topic_id);
        Ok(())
    }

    async fn require_creator(&self, user_id: Uuid, topic_id: Uuid) -> ServiceResult<()> {
        let creator: Option<Uuid> = sqlx::query_scalar("SELECT created_by FROM topics WHERE id = $1")
            .bind(topic_id)
            .fetch_optional(&self.pool)
            .await?;
        let can_use = match creator {
            Some(c) if c != user_id => load_viewer(&self.pool, user_id).await?.can_use_topic(topic_id),
            _ => false,
        };
        creator_only(user_id, creator, can_use)
    }

    async fn partner_label(&self, partner: Uuid) -> ServiceResult<String> {
        let row: Option<(Option<String>, Option<String>)> =
            sqlx::query_as("SELECT username, email FROM profiles WHERE id = $1")
                .bind(partner)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row
            .and_then(|(username, email)| username.or(email))
            .unwrap_or_else(|| partner.to_string()))
    }
}
