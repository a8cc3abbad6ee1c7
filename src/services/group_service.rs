use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::group::{Group, GroupMember, GroupRole};
use crate::database::DatabaseError;

use super::{required_text, ServiceError, ServiceResult};

const MEMBER_COLUMNS: &str = "m.group_id, m.user_id, m.role, m.joined_at, p.email, p.username";

/// Admin-only actions: non-members do not learn the group exists, plain members are refused
fn admin_only(role: Option<GroupRole>) -> ServiceResult<()> {
    match role {
        Some(GroupRole::Admin) => Ok(()),
        Some(GroupRole::Member) => Err(ServiceError::Forbidden("Only group admins can do that".to_string())),
        None => Err(ServiceError::NotFound("Group not found".to_string())),
    }
}

/// Whether moving a member from `current` to `next` (None = leaving) takes away an admin
fn drops_admin(current: Option<GroupRole>, next: Option<GroupRole>) -> bool {
    current == Some(GroupRole::Admin) && next != Some(GroupRole::Admin)
}

fn keep_an_admin(other_admins: i64) -> ServiceResult<()> {
    if other_admins == 0 {
        return Err(ServiceError::invalid("role", "A group needs at least one admin"));
    }
    Ok(())
}

pub struct GroupService {
    pool: PgPool,
}

impl GroupService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Groups the user belongs to
    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT g.id, g.name, g.created_by, g.created_at, g.updated_at
             FROM groups g
             JOIN group_members m ON m.group_id = g.id
             WHERE m.user_id = $1
             ORDER BY g.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    /// Create a group; the creator becomes its first admin and a group topic is filed
    pub async fn create(&self, user_id: Uuid, name: &str) -> ServiceResult<Group> {
        let name = required_text("name", name, 100)?;
        let mut tx = self.pool.begin().await?;

        let group = sqlx::query_as::<_, Group>(
            "INSERT INTO groups (id, name, created_by) VALUES ($1, $2, $3)
             RETURNING id, name, created_by, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&name)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(group.id)
            .bind(user_id)
            .bind(GroupRole::Admin.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO topics (id, name, created_by, group_id) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(&name)
            .bind(user_id)
            .bind(group.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Created group {} ({})", group.name, group.id);
        Ok(group)
    }

    pub async fn rename(&self, user_id: Uuid, group_id: Uuid, name: &str) -> ServiceResult<Group> {
        let name = required_text("name", name, 100)?;
        self.require_admin(user_id, group_id).await?;
        let group = sqlx::query_as::<_, Group>(
            "UPDATE groups SET name = $2, updated_at = now() WHERE id = $1
             RETURNING id, name, created_by, created_at, updated_at",
        )
        .bind(group_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::on_missing(e, "Group not found"))?;
        Ok(group)
    }

    pub async fn delete(&self, user_id: Uuid, group_id: Uuid) -> ServiceResult<()> {
        self.require_admin(user_id, group_id).await?;
        sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;
        info!("Deleted group {}", group_id);
        Ok(())
    }

    pub async fn members(&self, user_id: Uuid, group_id: Uuid) -> ServiceResult<Vec<GroupMember>> {
        self.role_of(user_id, group_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Group not found".to_string()))?;
        let sql = format!(
            "SELECT {} FROM group_members m JOIN profiles p ON p.id = m.user_id
             WHERE m.group_id = $1 ORDER BY m.joined_at",
            MEMBER_COLUMNS
        );
        let members = sqlx::query_as::<_, GroupMember>(&sql)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }

    /// Admins add members by email
    pub async fn add_member(&self, user_id: Uuid, group_id: Uuid, email: &str, role: GroupRole) -> ServiceResult<GroupMember> {
        self.require_admin(user_id, group_id).await?;
        let email = email.trim().to_lowercase();
        let member_id: Uuid = sqlx::query_scalar("SELECT id FROM profiles WHERE lower(email) = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No user with email {}", email)))?;

        sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(group_id)
            .bind(member_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::on_unique(e, "User is already a member of this group"))?;

        self.member(group_id, member_id).await
    }

    pub async fn change_role(&self, user_id: Uuid, group_id: Uuid, member_id: Uuid, role: GroupRole) -> ServiceResult<GroupMember> {
        self.require_admin(user_id, group_id).await?;
        let current = self.role_of(member_id, group_id).await?;
        if drops_admin(current, Some(role)) {
            self.ensure_other_admin(group_id, member_id).await?;
        }
        let result = sqlx::query("UPDATE group_members SET role = $3 WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(member_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Member not found".to_string()));
        }
        self.member(group_id, member_id).await
    }

    /// Admins remove anyone; members may remove themselves. The last admin cannot leave.
    pub async fn remove_member(&self, user_id: Uuid, group_id: Uuid, member_id: Uuid) -> ServiceResult<()> {
        if user_id != member_id {
            self.require_admin(user_id, group_id).await?;
        }
        if drops_admin(self.role_of(member_id, group_id).await?, None) {
            self.ensure_other_admin(group_id, member_id).await?;
        }
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(member_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Member not found".to_string()));
        }
        Ok(())
    }

    async fn member(&self, group_id: Uuid, member_id: Uuid) -> ServiceResult<GroupMember> {
        let sql = format!(
            "SELECT {} FROM group_members m JOIN profiles p ON p.id = m.user_id
             WHERE m.group_id = $1 AND m.user_id = $2",
            MEMBER_COLUMNS
        );
        let member = sqlx::query_as::<_, GroupMember>(&sql)
            .bind(group_id)
            .bind(member_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::on_missing(e, "Member not found"))?;
        Ok(member)
    }

    async fn role_of(&self, user_id: Uuid, group_id: Uuid) -> ServiceResult<Option<GroupRole>> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role.and_then(|r| GroupRole::try_from(r).ok()))
    }

    async fn require_admin(&self, user_id: Uuid, group_id: Uuid) -> ServiceResult<()> {
        admin_only(self.role_of(user_id, group_id).await?)
    }

    async fn ensure_other_admin(&self, group_id: Uuid, leaving: Uuid) -> ServiceResult<()> {
        let others: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_members WHERE group_id = $1 AND role = 'admin' AND user_id <> $2",
        )
        .bind(group_id)
        .bind(leaving)
        .fetch_one(&self.pool)
        .await?;
        keep_an_admin(others)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admins_pass_the_admin_gate() {
        assert!(admin_only(Some(GroupRole::Admin)).is_ok());
        assert!(matches!(admin_only(Some(GroupRole::Member)), Err(ServiceError::Forbidden(_))));
        assert!(matches!(admin_only(None), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn demoting_or_removing_an_admin_drops_one() {
        use GroupRole::{Admin, Member};

        assert!(drops_admin(Some(Admin), Some(Member)));
        assert!(drops_admin(Some(Admin), None));
        assert!(!drops_admin(Some(Admin), Some(Admin)));
        assert!(!drops_admin(Some(Member), None));
        assert!(!drops_admin(Some(Member), Some(Admin)));
        assert!(!drops_admin(None, Some(Member)));
    }

    #[test]
    fn last_admin_cannot_go() {
        assert!(matches!(
            keep_an_admin(0),
            Err(ServiceError::Invalid { field: "role", .. })
        ));
        assert!(keep_an_admin(1).is_ok());
    }

    #[test]
    fn roles_parse_from_storage() {
        assert_eq!(GroupRole::try_from("admin".to_string()).unwrap(), GroupRole::Admin);
        assert_eq!(GroupRole::try_from("member".to_string()).unwrap(), GroupRole::Member);
        assert!(GroupRole::try_from("owner".to_string()).is_err());
    }
}
