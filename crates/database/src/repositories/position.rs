use crate::pool::DbPool;
use crate::repositories::utils::{decode_permissions, map_db_error, row_to_member};
use anyhow::{Context, Result};
use async_trait::async_trait;
use services::common::RepositoryError;
use services::member::ports::Member;
use services::organisation::ports::OrganisationId;
use services::position::ports::{NewPosition, Position, PositionRepository, PositionUpdate};
use tracing::debug;
use uuid::Uuid;

/// Positions are always loaded with their permission sets aggregated from the
/// join table; callers never see a half-populated snapshot.
const SELECT_POSITION: &str = "
    SELECT p.id, p.organisation_id, p.name, p.rank, p.is_default,
           COALESCE(array_agg(pp.permission_id)
                    FILTER (WHERE pp.permission_id IS NOT NULL), '{}') AS permission_ids
    FROM org_position p
    LEFT JOIN org_position_permission pp ON pp.position_id = p.id";

const GROUP_POSITION: &str = "GROUP BY p.id, p.organisation_id, p.name, p.rank, p.is_default";

pub struct PgPositionRepository {
    pool: DbPool,
}

impl PgPositionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_position(row: &tokio_postgres::Row) -> Result<Position, RepositoryError> {
        Ok(Position {
            id: row.get("id"),
            organisation_id: OrganisationId(row.get("organisation_id")),
            name: row.get("name"),
            rank: row.get("rank"),
            is_default: row.get("is_default"),
            permissions: decode_permissions(row.get("permission_ids"))?,
        })
    }
}

#[async_trait]
impl PositionRepository for PgPositionRepository {
    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Position>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows = client
            .query(
                &format!(
                    "{SELECT_POSITION} WHERE p.organisation_id = $1 {GROUP_POSITION}
                     ORDER BY p.rank DESC"
                ),
                &[&organisation_id],
            )
            .await
            .map_err(map_db_error)?;

        rows.iter()
            .map(|row| Ok(Self::row_to_position(row)?))
            .collect()
    }

    async fn get_by_id(&self, position_id: Uuid) -> Result<Option<Position>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                &format!("{SELECT_POSITION} WHERE p.id = $1 {GROUP_POSITION}"),
                &[&position_id],
            )
            .await
            .map_err(map_db_error)?;

        row.as_ref().map(Self::row_to_position).transpose().map_err(Into::into)
    }

    async fn find_default(&self, organisation_id: Uuid) -> Result<Option<Position>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                &format!(
                    "{SELECT_POSITION} WHERE p.organisation_id = $1 AND p.is_default
                     {GROUP_POSITION}"
                ),
                &[&organisation_id],
            )
            .await
            .map_err(map_db_error)?;

        row.as_ref().map(Self::row_to_position).transpose().map_err(Into::into)
    }

    async fn find_member_position(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Position>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                "SELECT p.id, p.organisation_id, p.name, p.rank, p.is_default,
                        COALESCE(array_agg(pp.permission_id)
                                 FILTER (WHERE pp.permission_id IS NOT NULL), '{}') AS permission_ids
                 FROM org_member m
                 JOIN org_position p ON p.id = m.position_id
                 LEFT JOIN org_position_permission pp ON pp.position_id = p.id
                 WHERE m.organisation_id = $1 AND m.user_id = $2
                 GROUP BY p.id, p.organisation_id, p.name, p.rank, p.is_default",
                &[&organisation_id, &user_id],
            )
            .await
            .map_err(map_db_error)?;

        row.as_ref().map(Self::row_to_position).transpose().map_err(Into::into)
    }

    async fn create(&self, position: NewPosition) -> Result<Position> {
        let mut client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;
        let transaction = client
            .transaction()
            .await
            .context("Failed to start transaction")?;

        // Clear-then-set inside one transaction: concurrent readers never
        // observe zero or two defaults.
        if position.is_default {
            transaction
                .execute(
                    "UPDATE org_position SET is_default = FALSE
                     WHERE organisation_id = $1 AND is_default",
                    &[&position.organisation_id],
                )
                .await
                .map_err(map_db_error)?;
        }

        transaction
            .execute(
                "INSERT INTO org_position (id, organisation_id, name, rank, is_default)
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    &position.id,
                    &position.organisation_id,
                    &position.name,
                    &position.rank,
                    &position.is_default,
                ],
            )
            .await
            .map_err(map_db_error)?;

        for permission in &position.permissions {
            transaction
                .execute(
                    "INSERT INTO org_position_permission (position_id, permission_id)
                     VALUES ($1, $2)",
                    &[&position.id, &permission.code()],
                )
                .await
                .map_err(map_db_error)?;
        }

        transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;

        debug!("Created position {} in organisation {}", position.id, position.organisation_id);
        Ok(Position {
            id: position.id,
            organisation_id: OrganisationId(position.organisation_id),
            name: position.name,
            rank: position.rank,
            is_default: position.is_default,
            permissions: position.permissions,
        })
    }

    async fn update(&self, position_id: Uuid, update: PositionUpdate) -> Result<Position> {
        let mut client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;
        let transaction = client
            .transaction()
            .await
            .context("Failed to start transaction")?;

        let row = transaction
            .query_opt(
                "SELECT organisation_id FROM org_position WHERE id = $1 FOR UPDATE",
                &[&position_id],
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::NotFound("position".to_string()))?;
        let organisation_id: Uuid = row.get("organisation_id");

        if update.set_default {
            transaction
                .execute(
                    "UPDATE org_position SET is_default = FALSE
                     WHERE organisation_id = $1 AND is_default AND id <> $2",
                    &[&organisation_id, &position_id],
                )
                .await
                .map_err(map_db_error)?;
        }

        transaction
            .execute(
                "UPDATE org_position
                 SET name = $2, rank = $3, is_default = is_default OR $4
                 WHERE id = $1",
                &[&position_id, &update.name, &update.rank, &update.set_default],
            )
            .await
            .map_err(map_db_error)?;

        // Permission diff as two set operations against the join table
        if !update.removed.is_empty() {
            let removed: Vec<i32> = update.removed.iter().map(|p| p.code()).collect();
            transaction
                .execute(
                    "DELETE FROM org_position_permission
                     WHERE position_id = $1 AND permission_id = ANY($2)",
                    &[&position_id, &removed],
                )
                .await
                .map_err(map_db_error)?;
        }
        for permission in &update.added {
            transaction
                .execute(
                    "INSERT INTO org_position_permission (position_id, permission_id)
                     VALUES ($1, $2)
                     ON CONFLICT DO NOTHING",
                    &[&position_id, &permission.code()],
                )
                .await
                .map_err(map_db_error)?;
        }

        let row = transaction
            .query_one(
                &format!("{SELECT_POSITION} WHERE p.id = $1 {GROUP_POSITION}"),
                &[&position_id],
            )
            .await
            .map_err(map_db_error)?;
        let position = Self::row_to_position(&row)?;

        transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;

        debug!("Updated position {}", position_id);
        Ok(position)
    }

    async fn delete_with_migration(
        &self,
        position_id: Uuid,
        replacement_id: Uuid,
    ) -> Result<Vec<Member>> {
        let mut client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;
        let transaction = client
            .transaction()
            .await
            .context("Failed to start transaction")?;

        // Migrate every member in one statement, then drop the row; partial
        // application is impossible from a reader's perspective.
        let rows = transaction
            .query(
                "UPDATE org_member SET position_id = $2
                 WHERE position_id = $1
                 RETURNING organisation_id, user_id, position_id, member_since",
                &[&position_id, &replacement_id],
            )
            .await
            .map_err(map_db_error)?;

        transaction
            .execute("DELETE FROM org_position WHERE id = $1", &[&position_id])
            .await
            .map_err(map_db_error)?;

        transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;

        debug!(
            "Removed position {}, migrated {} members to {}",
            position_id,
            rows.len(),
            replacement_id
        );
        Ok(rows.iter().map(row_to_member).collect())
    }
}
