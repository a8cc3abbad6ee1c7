use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Public view of another user, as returned by partner lookup
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PartnerSummary {
    pub id: Uuid,
    pub email: Option<String>,
    pub username: Option<String>,
    pub avatar_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PartnerLink {
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
}

impl PartnerLink {
    /// Canonical (smaller, larger) ordering used for storage
    pub fn ordered(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user_a == user_id {
            Some(self.user_b)
        } else if self.user_b == user_id {
            Some(self.user_a)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PartnerEmail {
    pub email: String,
}
