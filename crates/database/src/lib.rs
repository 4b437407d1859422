pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::{
    PgInvitationRepository, PgMemberRepository, PgOrganisationRepository, PgPositionRepository,
};

use anyhow::Result;
use services::Permission;
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Database service combining all repositories
pub struct Database {
    pub organisations: PgOrganisationRepository,
    pub positions: PgPositionRepository,
    pub members: PgMemberRepository,
    pub invitations: PgInvitationRepository,
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            organisations: PgOrganisationRepository::new(pool.clone()),
            positions: PgPositionRepository::new(pool.clone()),
            members: PgMemberRepository::new(pool.clone()),
            invitations: PgInvitationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new database service from configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Check that the permission lookup table matches the enum catalogue the
    /// service compiles against. A mismatch means a migration is missing or a
    /// permission was renumbered; startup proceeds but the drift is logged.
    pub async fn validate_permission_catalogue(&self) -> Result<()> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT id FROM lkp_org_permission", &[])
            .await?;

        let stored: HashSet<i32> = rows.iter().map(|row| row.get::<_, i32>("id")).collect();
        let compiled: HashSet<i32> = Permission::ALL.iter().map(|p| p.code()).collect();

        let missing: Vec<i32> = compiled.difference(&stored).copied().collect();
        let extra: Vec<i32> = stored.difference(&compiled).copied().collect();

        if !missing.is_empty() {
            error!(?missing, "Permissions missing from the lookup table");
        }
        if !extra.is_empty() {
            warn!(?extra, "Lookup table carries permissions unknown to this build");
        }
        if missing.is_empty() && extra.is_empty() {
            info!("Permission catalogue in sync with the lookup table");
        }
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
