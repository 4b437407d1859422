use crate::pool::DbPool;
use crate::repositories::utils::map_db_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use services::common::RepositoryError;
use services::directory::ports::UserId;
use services::invitation::ports::{
    Invitation, InvitationRepository, InvitationStatus, NewInvitation,
};
use services::organisation::ports::OrganisationId;
use tracing::debug;
use uuid::Uuid;

const SELECT_INVITE: &str = "
    SELECT id, organisation_id, user_id, email, invite_code, status, created_at, expires_at
    FROM org_user_invite";

pub struct PgInvitationRepository {
    pool: DbPool,
}

impl PgInvitationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_invitation(row: &tokio_postgres::Row) -> Result<Invitation, RepositoryError> {
        let status: String = row.get("status");
        let status = InvitationStatus::parse(&status).ok_or_else(|| {
            RepositoryError::DataConversionError(anyhow::anyhow!(
                "Unknown invitation status '{status}'"
            ))
        })?;

        Ok(Invitation {
            id: row.get("id"),
            organisation_id: OrganisationId(row.get("organisation_id")),
            user_id: row.get::<_, Option<Uuid>>("user_id").map(UserId),
            email: row.get("email"),
            token: row.get("invite_code"),
            status,
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        })
    }
}

#[async_trait]
impl InvitationRepository for PgInvitationRepository {
    async fn insert(&self, invitation: NewInvitation) -> Result<Invitation> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        debug!(
            "Creating invitation for {} to organisation {}",
            invitation.email, invitation.organisation_id
        );

        // The partial unique index on (organisation_id, email) WHERE pending
        // turns a concurrent duplicate into a unique violation here.
        let row = client
            .query_one(
                "INSERT INTO org_user_invite
                     (id, organisation_id, user_id, email, invite_code, status, expires_at)
                 VALUES ($1, $2, $3, $4, $5, 'pending', $6)
                 RETURNING id, organisation_id, user_id, email, invite_code, status,
                           created_at, expires_at",
                &[
                    &invitation.id,
                    &invitation.organisation_id,
                    &invitation.user_id,
                    &invitation.email,
                    &invitation.token,
                    &invitation.expires_at,
                ],
            )
            .await
            .map_err(map_db_error)?;

        Ok(Self::row_to_invitation(&row)?)
    }

    async fn find_pending_by_token(&self, token: &str) -> Result<Option<Invitation>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                &format!("{SELECT_INVITE} WHERE invite_code = $1 AND status = 'pending'"),
                &[&token],
            )
            .await
            .map_err(map_db_error)?;

        row.as_ref()
            .map(Self::row_to_invitation)
            .transpose()
            .map_err(Into::into)
    }

    async fn find_pending(
        &self,
        organisation_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                &format!(
                    "{SELECT_INVITE}
                     WHERE organisation_id = $1 AND email = $2 AND status = 'pending'"
                ),
                &[&organisation_id, &email],
            )
            .await
            .map_err(map_db_error)?;

        row.as_ref()
            .map(Self::row_to_invitation)
            .transpose()
            .map_err(Into::into)
    }

    async fn list_by_organisation(
        &self,
        organisation_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows = if let Some(status) = status {
            client
                .query(
                    &format!(
                        "{SELECT_INVITE}
                         WHERE organisation_id = $1 AND status = $2
                         ORDER BY created_at DESC"
                    ),
                    &[&organisation_id, &status.as_str()],
                )
                .await
                .map_err(map_db_error)?
        } else {
            client
                .query(
                    &format!(
                        "{SELECT_INVITE} WHERE organisation_id = $1 ORDER BY created_at DESC"
                    ),
                    &[&organisation_id],
                )
                .await
                .map_err(map_db_error)?
        };

        rows.iter()
            .map(|row| Ok(Self::row_to_invitation(row)?))
            .collect()
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows = if let Some(status) = status {
            client
                .query(
                    &format!(
                        "{SELECT_INVITE}
                         WHERE user_id = $1 AND status = $2
                         ORDER BY created_at DESC"
                    ),
                    &[&user_id, &status.as_str()],
                )
                .await
                .map_err(map_db_error)?
        } else {
            client
                .query(
                    &format!("{SELECT_INVITE} WHERE user_id = $1 ORDER BY created_at DESC"),
                    &[&user_id],
                )
                .await
                .map_err(map_db_error)?
        };

        rows.iter()
            .map(|row| Ok(Self::row_to_invitation(row)?))
            .collect()
    }

    async fn update_status(&self, id: Uuid, status: InvitationStatus) -> Result<Invitation> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                "UPDATE org_user_invite SET status = $2
                 WHERE id = $1
                 RETURNING id, organisation_id, user_id, email, invite_code, status,
                           created_at, expires_at",
                &[&id, &status.as_str()],
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::NotFound("invitation".to_string()))?;

        Ok(Self::row_to_invitation(&row)?)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows_affected = client
            .execute("DELETE FROM org_user_invite WHERE id = $1", &[&id])
            .await
            .map_err(map_db_error)?;

        Ok(rows_affected > 0)
    }

    async fn expire_stale(&self) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows_affected = client
            .execute(
                "UPDATE org_user_invite SET status = 'expired'
                 WHERE status = 'pending' AND expires_at < NOW()",
                &[],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows_affected)
    }
}
