use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, row_to_member};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use services::common::RepositoryError;
use services::member::ports::{Member, MemberRepository};
use tracing::debug;
use uuid::Uuid;

const SELECT_MEMBER: &str =
    "SELECT organisation_id, user_id, position_id, member_since FROM org_member";

pub struct PgMemberRepository {
    pool: DbPool,
}

impl PgMemberRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn get(&self, organisation_id: Uuid, user_id: Uuid) -> Result<Option<Member>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                &format!("{SELECT_MEMBER} WHERE organisation_id = $1 AND user_id = $2"),
                &[&organisation_id, &user_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.as_ref().map(row_to_member))
    }

    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Member>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows = client
            .query(
                &format!(
                    "{SELECT_MEMBER} WHERE organisation_id = $1 ORDER BY member_since DESC"
                ),
                &[&organisation_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows.iter().map(row_to_member).collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Member>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows = client
            .query(
                &format!("{SELECT_MEMBER} WHERE user_id = $1 ORDER BY member_since DESC"),
                &[&user_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows.iter().map(row_to_member).collect())
    }

    async fn list_by_position(&self, position_id: Uuid) -> Result<Vec<Member>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows = client
            .query(
                &format!("{SELECT_MEMBER} WHERE position_id = $1"),
                &[&position_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows.iter().map(row_to_member).collect())
    }

    async fn find_by_position_and_user(
        &self,
        position_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Member>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                &format!("{SELECT_MEMBER} WHERE position_id = $1 AND user_id = $2"),
                &[&position_id, &user_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.as_ref().map(row_to_member))
    }

    async fn create_from_invitation(
        &self,
        invitation_id: Uuid,
        organisation_id: Uuid,
        user_id: Uuid,
        position_id: Uuid,
    ) -> Result<Member> {
        let mut client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;
        let transaction = client
            .transaction()
            .await
            .context("Failed to start transaction")?;

        // Consuming the invitation and creating the membership commit
        // together; a failure on either side rolls back both.
        transaction
            .execute(
                "UPDATE org_user_invite SET status = 'accepted'
                 WHERE id = $1 AND status = 'pending'",
                &[&invitation_id],
            )
            .await
            .map_err(map_db_error)?;

        let row = transaction
            .query_one(
                "INSERT INTO org_member (organisation_id, user_id, position_id, member_since)
                 VALUES ($1, $2, $3, $4)
                 RETURNING organisation_id, user_id, position_id, member_since",
                &[&organisation_id, &user_id, &position_id, &Utc::now()],
            )
            .await
            .map_err(map_db_error)?;

        transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;

        debug!("Added member {} to organisation {}", user_id, organisation_id);
        Ok(row_to_member(&row))
    }

    async fn update_position(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
        position_id: Uuid,
    ) -> Result<Member> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let row = client
            .query_opt(
                "UPDATE org_member SET position_id = $3
                 WHERE organisation_id = $1 AND user_id = $2
                 RETURNING organisation_id, user_id, position_id, member_since",
                &[&organisation_id, &user_id, &position_id],
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::NotFound("member".to_string()))?;

        Ok(row_to_member(&row))
    }

    async fn delete(&self, organisation_id: Uuid, user_id: Uuid) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)?;

        let rows_affected = client
            .execute(
                "DELETE FROM org_member WHERE organisation_id = $1 AND user_id = $2",
                &[&organisation_id, &user_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows_affected > 0)
    }
}
