use sqlx::PgPool;
use tracing::info;

use super::manager::DatabaseError;

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Split a migration script into executable statements, dropping `--` comment lines.
/// The schema uses no dollar-quoted bodies, so `;` always ends a statement.
pub fn statements(script: &str) -> Vec<String> {
    let without_comments: String = script
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply the bundled schema. Every statement is idempotent (`IF NOT EXISTS`).
pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
    let stmts = statements(INIT_SQL);
    let mut tx = pool.begin().await?;
    for stmt in &stmts {
        sqlx::query(stmt)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::Migration(format!("{}: {}", first_line(stmt), e)))?;
    }
    tx.commit().await?;
    info!("Applied schema ({} statements)", stmts.len());
    Ok(())
}

fn first_line(stmt: &str) -> &str {
    stmt.lines().next().unwrap_or(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_bundled_schema() {
        let stmts = statements(INIT_SQL);
        assert!(stmts.iter().all(|s| !s.starts_with("--")));
        assert!(stmts.iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS profiles")));
        assert!(stmts.iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS push_subscriptions")));
    }

    #[test]
    fn ignores_comments_and_blank_statements() {
        let stmts = statements("-- header\nCREATE TABLE a (id INT);\n\n;\nCREATE TABLE b (id INT);");
        assert_eq!(stmts, vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]);
    }
}
