use crate::pool::DbPool;
use crate::repositories::utils::map_db_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use services::common::RepositoryError;
use services::directory::ports::UserId;
use services::organisation::ports::{
    NewOrganisation, Organisation, OrganisationId, OrganisationRepository, OrganisationUpdate,
};
use services::position::ports::NewPosition;
use tracing::debug;
use uuid::Uuid;

const SELECT_ORGANISATION: &str = "
    SELECT o.id, o.org_name, o.org_email, o.org_desc, o.org_avatar_url,
           o.org_public_status, o.org_creator_id, o.created_at, o.updated_at,
           (SELECT COUNT(*) FROM org_member m WHERE m.organisation_id = o.id) AS member_count
    FROM organisation o";

pub struct PgOrganisationRepository {
    pool: DbPool,
}

impl PgOrganisationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_organisation(row: &tokio_postgres::Row) -> Organisation {
        Organisation {
            id: OrganisationId(row.get("id")),
            name: row.get("org_name"),
            email: row.get("org_email"),
            description: row.get("org_desc"),
            avatar_url: row.get("org_avatar_url"),
            public: row.get("org_public_status"),
            creator_id: UserId(row.get("org_creator_id")),
            member_count: row.get("member_count"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl OrganisationRepository for PgOrganisationRepository {
    async fn create(
        &self,
        organisation: NewOrganisation,
        creator_id: Uuid,
        creator_position: NewPosition,
        default_position: NewPosition,
    ) -> Result<Organisation> {
        let mut client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;
        let transaction = client
            .transaction()
            .await
            .context("Failed to start transaction")?;

        let now = Utc::now();
        let row = transaction
            .query_one(
                "INSERT INTO organisation
                     (id, org_name, org_email, org_desc, org_avatar_url, org_public_status,
                      org_creator_id, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                 RETURNING id, org_name, org_email, org_desc, org_avatar_url,
                           org_public_status, org_creator_id, created_at, updated_at,
                           1::bigint AS member_count",
                &[
                    &organisation.id,
                    &organisation.name,
                    &organisation.email,
                    &organisation.description,
                    &organisation.avatar_url,
                    &organisation.public,
                    &creator_id,
                    &now,
                ],
            )
            .await
            .map_err(map_db_error)?;

        for position in [&creator_position, &default_position] {
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
        }

        transaction
            .execute(
                "INSERT INTO org_member (organisation_id, user_id, position_id, member_since)
                 VALUES ($1, $2, $3, $4)",
                &[&organisation.id, &creator_id, &creator_position.id, &now],
            )
            .await
            .map_err(map_db_error)?;

        transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;

        debug!("Created organisation {} with creator {}", organisation.id, creator_id);
        Ok(Self::row_to_organisation(&row))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Organisation>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(&format!("{SELECT_ORGANISATION} WHERE o.id = $1"), &[&id])
            .await
            .map_err(map_db_error)?;

        Ok(row.as_ref().map(Self::row_to_organisation))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Organisation>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                &format!("{SELECT_ORGANISATION} WHERE o.org_name = $1"),
                &[&name],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.as_ref().map(Self::row_to_organisation))
    }

    async fn update(&self, id: Uuid, update: OrganisationUpdate) -> Result<Option<Organisation>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                "UPDATE organisation o
                 SET org_name = COALESCE($2, org_name),
                     org_email = COALESCE($3, org_email),
                     org_desc = COALESCE($4, org_desc),
                     org_avatar_url = COALESCE($5, org_avatar_url),
                     org_public_status = COALESCE($6, org_public_status),
                     updated_at = NOW()
                 WHERE id = $1
                 RETURNING id, org_name, org_email, org_desc, org_avatar_url,
                           org_public_status, org_creator_id, created_at, updated_at,
                           (SELECT COUNT(*) FROM org_member m
                            WHERE m.organisation_id = o.id) AS member_count",
                &[
                    &id,
                    &update.name,
                    &update.email,
                    &update.description,
                    &update.avatar_url,
                    &update.public,
                ],
            )
            .await
            .map_err(map_db_error)?;

        debug!("Updated organisation {}", id);
        Ok(row.as_ref().map(Self::row_to_organisation))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows_affected = client
            .execute("DELETE FROM organisation WHERE id = $1", &[&id])
            .await
            .map_err(map_db_error)?;

        Ok(rows_affected > 0)
    }
}
