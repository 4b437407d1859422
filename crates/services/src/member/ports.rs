use crate::directory::ports::{PartialUser, UserId};
use crate::organisation::ports::{Organisation, OrganisationId};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Binding of a user to an organisation and exactly one position.
/// Keyed by the composite (organisation_id, user_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub organisation_id: OrganisationId,
    pub user_id: UserId,
    pub position_id: Uuid,
    pub member_since: DateTime<Utc>,
}

/// Position identity as attached to member projections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSummary {
    pub id: Uuid,
    pub name: String,
}

/// Member enriched with the display profile from the user directory
/// (absent when the directory is unavailable) and the position summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    pub organisation_id: OrganisationId,
    pub user_id: UserId,
    pub member_since: DateTime<Utc>,
    pub position: PositionSummary,
    pub user: Option<PartialUser>,
}

/// A user's membership with the owning organisation attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberWithOrganisation {
    pub member: Member,
    pub organisation: Organisation,
}

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn get(&self, organisation_id: Uuid, user_id: Uuid) -> Result<Option<Member>>;

    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Member>>;

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Member>>;

    async fn list_by_position(&self, position_id: Uuid) -> Result<Vec<Member>>;

    async fn find_by_position_and_user(
        &self,
        position_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Member>>;

    /// Consume an accepted invitation: flip its status to ACCEPTED and insert
    /// the member, in one transaction. The invitation must already have been
    /// validated by the caller.
    async fn create_from_invitation(
        &self,
        invitation_id: Uuid,
        organisation_id: Uuid,
        user_id: Uuid,
        position_id: Uuid,
    ) -> Result<Member>;

    async fn update_position(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
        position_id: Uuid,
    ) -> Result<Member>;

    async fn delete(&self, organisation_id: Uuid, user_id: Uuid) -> Result<bool>;
}
