use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::shopping::{CreateShoppingItem, ShoppingItem, UpdateShoppingItem};
use crate::database::DatabaseError;
use crate::visibility::{ViewFilter, Viewer};

use super::{find_visible, load_viewer, optional_text, requested_scope, required_text, ServiceResult};

const ITEM_COLUMNS: &str = "id, name, quantity, checked, created_by, partner_id, group_id, created_at, updated_at";

/// New quantity from an update: `None` keeps the current value, `Some(None)` clears it
fn quantity_change(input: Option<&str>) -> ServiceResult<Option<Option<String>>> {
    input
        .map(|q| optional_text("quantity", Some(q), 50))
        .transpose()
}

/// Ids of the checked items among `items`
fn checked_ids(items: &[ShoppingItem]) -> Vec<Uuid> {
    items.iter().filter(|item| item.checked).map(|item| item.id).collect()
}

pub struct ShoppingService {
    pool: PgPool,
}

impl ShoppingService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unchecked items first, oldest first within each half
    pub async fn list(&self, user_id: Uuid, filter: ViewFilter) -> ServiceResult<Vec<ShoppingItem>> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        self.visible(&viewer, filter, false).await
    }

    pub async fn create(&self, user_id: Uuid, input: CreateShoppingItem) -> ServiceResult<ShoppingItem> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let name = required_text("name", &input.name, 200)?;
        let quantity = optional_text("quantity", input.quantity.as_deref(), 50)?;
        let scope = requested_scope(&viewer, input.partner_id, input.group_id)?;

        let sql = format!(
            "INSERT INTO shopping_items (id, name, quantity, created_by, partner_id, group_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, ShoppingItem>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(quantity)
            .bind(user_id)
            .bind(scope.partner_id())
            .bind(scope.group_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn update(&self, user_id: Uuid, item_id: Uuid, input: UpdateShoppingItem) -> ServiceResult<ShoppingItem> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        self.find(&viewer, item_id).await?;
        let name = input.name.as_deref().map(|n| required_text("name", n, 200)).transpose()?;
        let quantity = quantity_change(input.quantity.as_deref())?;

        let sql = format!(
            "UPDATE shopping_items
             SET name = COALESCE($2, name),
                 quantity = CASE WHEN $3 THEN $4 ELSE quantity END,
                 checked = COALESCE($5, checked),
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, ShoppingItem>(&sql)
            .bind(item_id)
            .bind(name)
            .bind(quantity.is_some())
            .bind(quantity.flatten())
            .bind(input.checked)
            .fetch_one(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn delete(&self, user_id: Uuid, item_id: Uuid) -> ServiceResult<()> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        self.find(&viewer, item_id).await?;
        sqlx::query("DELETE FROM shopping_items WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every checked item in the current view, returning how many went
    pub async fn clear_checked(&self, user_id: Uuid, filter: ViewFilter) -> ServiceResult<u64> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let ids = checked_ids(&self.visible(&viewer, filter, true).await?);
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM shopping_items WHERE id = ANY($1) AND checked")
            .bind(&ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn visible(&self, viewer: &Viewer, filter: ViewFilter, only_checked: bool) -> ServiceResult<Vec<ShoppingItem>> {
        let sql = format!(
            "SELECT {} FROM shopping_items
             WHERE (created_by = ANY($1) OR group_id = ANY($2))
               AND (NOT $3 OR checked)
             ORDER BY checked, created_at",
            ITEM_COLUMNS
        );
        let candidates = sqlx::query_as::<_, ShoppingItem>(&sql)
            .bind(viewer.circle())
            .bind(viewer.group_ids())
            .bind(only_checked)
            .fetch_all(&self.pool)
            .await?;
        Ok(viewer.retain(candidates, filter))
    }

    async fn find(&self, viewer: &Viewer, item_id: Uuid) -> ServiceResult<ShoppingItem> {
        let sql = format!("SELECT {} FROM shopping_items WHERE id = $1", ITEM_COLUMNS);
        find_visible(&self.pool, viewer, &sql, item_id, "Shopping item not found").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use chrono::Utc;

    fn item(name: &str, checked: bool, created_by: Uuid, partner_id: Option<Uuid>) -> ShoppingItem {
        ShoppingItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            quantity: None,
            checked,
            created_by,
            partner_id,
            group_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn quantity_is_kept_cleared_or_replaced() {
        assert_eq!(quantity_change(None).unwrap(), None);
        assert_eq!(quantity_change(Some("  ")).unwrap(), Some(None));
        assert_eq!(quantity_change(Some(" 2 kg ")).unwrap(), Some(Some("2 kg".to_string())));
        assert!(matches!(
            quantity_change(Some("x".repeat(51).as_str())),
            Err(ServiceError::Invalid { field: "quantity", .. })
        ));
    }

    #[test]
    fn clearing_takes_only_checked_items_in_view() {
        let me = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let viewer = Viewer::new(me).with_partners([partner]);

        let milk = item("milk", true, me, Some(partner));
        let eggs = item("eggs", false, me, Some(partner));
        let soap = item("soap", true, me, None);
        let in_view = viewer.retain(vec![milk.clone(), eggs, soap], ViewFilter::Partner(partner));

        assert_eq!(checked_ids(&in_view), vec![milk.id]);
        assert!(checked_ids(&[]).is_empty());
    }
}
