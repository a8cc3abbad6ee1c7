use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::todo::{CreateTodo, Todo, UpdateTodo};
use crate::database::DatabaseError;
use crate::visibility::{ViewFilter, Viewer};

use super::{find_visible, load_viewer, requested_scope, required_text, ServiceError, ServiceResult};

const TODO_COLUMNS: &str = "id, title, completed, due_date, created_by, partner_id, group_id, created_at, updated_at";

/// Due date after applying `input`: cleared, replaced, or kept
fn next_due_date(current: Option<NaiveDate>, input: &UpdateTodo) -> ServiceResult<Option<NaiveDate>> {
    match (input.clear_due_date, input.due_date) {
        (true, Some(_)) => Err(ServiceError::invalid(
            "due_date",
            "cannot set and clear the due date at once",
        )),
        (true, None) => Ok(None),
        (false, Some(date)) => Ok(Some(date)),
        (false, None) => Ok(current),
    }
}

pub struct TodoService {
    pool: PgPool,
}

impl TodoService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open todos first, then by due date
    pub async fn list(&self, user_id: Uuid, filter: ViewFilter) -> ServiceResult<Vec<Todo>> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let sql = format!(
            "SELECT {} FROM todos
             WHERE created_by = ANY($1) OR group_id = ANY($2)
             ORDER BY completed, due_date NULLS LAST, created_at DESC",
            TODO_COLUMNS
        );
        let candidates = sqlx::query_as::<_, Todo>(&sql)
            .bind(viewer.circle())
            .bind(viewer.group_ids())
            .fetch_all(&self.pool)
            .await?;
        Ok(viewer.retain(candidates, filter))
    }

    pub async fn create(&self, user_id: Uuid, input: CreateTodo) -> ServiceResult<Todo> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let title = required_text("title", &input.title, 200)?;
        let scope = requested_scope(&viewer, input.partner_id, input.group_id)?;

        let sql = format!(
            "INSERT INTO todos (id, title, due_date, created_by, partner_id, group_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            TODO_COLUMNS
        );
        let todo = sqlx::query_as::<_, Todo>(&sql)
            .bind(Uuid::new_v4())
            .bind(title)
            .bind(input.due_date)
            .bind(user_id)
            .bind(scope.partner_id())
            .bind(scope.group_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(todo)
    }

    pub async fn update(&self, user_id: Uuid, todo_id: Uuid, input: UpdateTodo) -> ServiceResult<Todo> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let current = self.find(&viewer, todo_id).await?;
        let title = input.title.as_deref().map(|t| required_text("title", t, 200)).transpose()?;
        let due_date = next_due_date(current.due_date, &input)?;

        let sql = format!(
            "UPDATE todos
             SET title = COALESCE($2, title),
                 completed = COALESCE($3, completed),
                 due_date = $4,
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            TODO_COLUMNS
        );
        let todo = sqlx::query_as::<_, Todo>(&sql)
            .bind(todo_id)
            .bind(title)
            .bind(input.completed)
            .bind(due_date)
            .fetch_one(&self.pool)
            .await?;
        Ok(todo)
    }

    pub async fn delete(&self, user_id: Uuid, todo_id: Uuid) -> ServiceResult<()> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        self.find(&viewer, todo_id).await?;
        sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(todo_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find(&self, viewer: &Viewer, todo_id: Uuid) -> ServiceResult<Todo> {
        let sql = format!("SELECT {} FROM todos WHERE id = $1", TODO_COLUMNS);
        find_visible(&self.pool, viewer, &sql, todo_id, "Todo not found").await
    }
}
