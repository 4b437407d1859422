use crate::pool::DbPool;
use anyhow::{Context, Result};
use refinery::load_sql_migrations;
use tracing::info;

/// Apply any pending SQL migrations from `migrations/sql`.
///
/// Migrations are plain versioned SQL files loaded at runtime relative to the
/// working directory, so the binary must be started from the workspace root.
pub async fn run(pool: &DbPool) -> Result<()> {
    let mut client = pool
        .get()
        .await
        .context("Failed to acquire a connection for migrations")?;

    let sql_dir = std::env::current_dir()
        .context("Failed to resolve the working directory")?
        .join("crates/database/src/migrations/sql");
    let migrations = load_sql_migrations(&sql_dir)
        .with_context(|| format!("Failed to load migrations from {sql_dir:?}"))?;

    let report = refinery::Runner::new(&migrations)
        .run_async(&mut **client)
        .await
        .context("Migration run failed")?;

    for applied in report.applied_migrations() {
        info!(migration = %applied.name(), "Applied migration");
    }
    info!("Database schema is up to date");
    Ok(())
}
