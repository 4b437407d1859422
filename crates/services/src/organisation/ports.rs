use crate::directory::ports::UserId;
use crate::position::ports::NewPosition;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OrganisationId(pub Uuid);

impl From<Uuid> for OrganisationId {
    fn from(uuid: Uuid) -> Self {
        OrganisationId(uuid)
    }
}

impl std::fmt::Display for OrganisationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully-populated organisation snapshot as returned from the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organisation {
    pub id: OrganisationId,
    pub name: String,
    pub email: String,
    pub description: String,
    pub avatar_url: Option<String>,
    pub public: bool,
    pub creator_id: UserId,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrganisation {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub description: String,
    pub avatar_url: Option<String>,
    pub public: bool,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct OrganisationUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub public: Option<bool>,
}

#[async_trait]
pub trait OrganisationRepository: Send + Sync {
    /// Create the organisation together with its bootstrap positions and the
    /// creator's membership, in a single transaction.
    async fn create(
        &self,
        organisation: NewOrganisation,
        creator_id: Uuid,
        creator_position: NewPosition,
        default_position: NewPosition,
    ) -> Result<Organisation>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Organisation>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Organisation>>;

    async fn update(&self, id: Uuid, update: OrganisationUpdate) -> Result<Option<Organisation>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}
