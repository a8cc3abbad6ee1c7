use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Admin => "admin",
            GroupRole::Member => "member",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown group role '{0}'")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for GroupRole {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let role = match value.as_str() {
            "admin" => Some(GroupRole::Admin),
            "member" => Some(GroupRole::Member),
            _ => None,
        };
        role.ok_or(UnknownRole(value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupMember {
    pub group_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroup {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMember {
    pub email: String,
    #[serde(default = "default_role")]
    pub role: GroupRole,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRole {
    pub role: GroupRole,
}

fn default_role() -> GroupRole {
    GroupRole::Member
}
