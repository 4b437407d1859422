use anyhow::Context;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

pub type DbPool = Pool;

/// Build the connection pool and verify it can actually reach the database
/// before the service starts accepting requests.
pub async fn create_pool(config: &config::DatabaseConfig) -> anyhow::Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.database.clone());
    cfg.user = Some(config.username.clone());
    cfg.password = Some(config.password.clone());
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(config.max_connections));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .context("Failed to create the connection pool")?;

    let client = pool
        .get()
        .await
        .context("Failed to check out a connection from the new pool")?;
    client
        .simple_query("SELECT 1")
        .await
        .context("Database connectivity probe failed")?;

    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "Database connection pool ready"
    );
    Ok(pool)
}
