use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::partner::{PartnerLink, PartnerSummary};
use crate::database::DatabaseError;
use crate::visibility::partner_topic_name;

use super::{ServiceError, ServiceResult};

pub struct PartnerService {
    pool: PgPool,
}

fn normalize_email(email: &str) -> ServiceResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ServiceError::invalid("email", "must be a valid email address")),
    }
}

/// Topic name for a partner, by username when they have one
fn display_name(partner: &PartnerSummary) -> String {
    partner
        .username
        .clone()
        .or_else(|| partner.email.clone())
        .unwrap_or_else(|| partner.id.to_string())
}

impl PartnerService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find another user by email (lookup before linking)
    pub async fn lookup_by_email(&self, user_id: Uuid, email: &str) -> ServiceResult<PartnerSummary> {
        let email = normalize_email(email)?;
        let found = sqlx::query_as::<_, PartnerSummary>(
            "SELECT id, email, username, avatar_path FROM profiles WHERE lower(email) = $1",
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;

        match found {
            Some(p) if p.id == user_id => Err(ServiceError::invalid("email", "You cannot partner with yourself")),
            Some(p) => Ok(p),
            None => Err(ServiceError::NotFound(format!("No user with email {}", email))),
        }
    }

    /// Link with the user owning `email` and file a shared "Notes with ..." topic for the pair
    pub async fn link(&self, user_id: Uuid, email: &str) -> ServiceResult<PartnerSummary> {
        let partner = self.lookup_by_email(user_id, email).await?;
        let (user_a, user_b) = PartnerLink::ordered(user_id, partner.id);

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO partner_links (user_a, user_b) VALUES ($1, $2)")
            .bind(user_a)
            .bind(user_b)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::on_unique(e, "You are already partners"))?;

        sqlx::query("INSERT INTO topics (id, name, created_by, partner_id) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(partner_topic_name(&display_name(&partner)))
            .bind(user_id)
            .bind(partner.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Linked partners {} and {}", user_id, partner.id);
        Ok(partner)
    }

    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<PartnerSummary>> {
        let partners = sqlx::query_as::<_, PartnerSummary>(
            "SELECT p.id, p.email, p.username, p.avatar_path
             FROM partner_links l
             JOIN profiles p ON p.id = CASE WHEN l.user_a = $1 THEN l.user_b ELSE l.user_a END
             WHERE l.user_a = $1 OR l.user_b = $1
             ORDER BY l.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(partners)
    }

    /// Remove the link. Rows already shared keep their `partner_id` but stop being visible.
    pub async fn unlink(&self, user_id: Uuid, partner_id: Uuid) -> ServiceResult<()> {
        let (user_a, user_b) = PartnerLink::ordered(user_id, partner_id);
        let result = sqlx::query("DELETE FROM partner_links WHERE user_a = $1 AND user_b = $2")
            .bind(user_a)
            .bind(user_b)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Partner link not found".to_string()));
        }
        info!("Unlinked partners {} and {}", user_id, partner_id);
        Ok(())
    }
}
