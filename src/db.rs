//! SQLite helpers: the migration runner shared by the binary and the
//! integration tests.

use anyhow::Result;
use sqlx::SqlitePool;

const INIT_SQL: &str = include_str!("../migrations/0001_init.sql");

/// Apply the embedded schema, statement by statement. Every statement is
/// `IF NOT EXISTS`-guarded, so reruns are harmless.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements: Vec<&str> = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .collect();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
