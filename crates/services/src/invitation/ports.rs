use crate::directory::ports::{PartialUser, UserId};
use crate::organisation::ports::OrganisationId;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
            InvitationStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<InvitationStatus> {
        match value {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "rejected" => Some(InvitationStatus::Rejected),
            "expired" => Some(InvitationStatus::Expired),
            _ => None,
        }
    }
}

/// Time-boxed offer for an email address to join an organisation,
/// consumed via its token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub organisation_id: OrganisationId,
    /// Set when the invitee already has a directory profile
    pub user_id: Option<UserId>,
    pub email: String,
    pub token: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    /// Still awaiting action and within its validity window
    pub fn is_actionable(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Invitation enriched with the invitee's directory profile for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationView {
    pub invitation: Invitation,
    pub user: Option<PartialUser>,
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Insert a new PENDING invitation. The store enforces at most one
    /// pending invitation per (organisation, email); a violation surfaces as
    /// a uniqueness error.
    async fn insert(&self, invitation: NewInvitation) -> Result<Invitation>;

    /// Token lookup, restricted to PENDING invitations so terminal
    /// invitations can never be replayed.
    async fn find_pending_by_token(&self, token: &str) -> Result<Option<Invitation>>;

    async fn find_pending(
        &self,
        organisation_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>>;

    async fn list_by_organisation(
        &self,
        organisation_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>>;

    async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>>;

    async fn update_status(&self, id: Uuid, status: InvitationStatus) -> Result<Invitation>;

    /// Hard delete, used by revocation; distinct from a REJECTED transition
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Flip every PENDING invitation whose expiry has passed to EXPIRED.
    /// Idempotent; safe to re-run on a schedule.
    async fn expire_stale(&self) -> Result<u64>;
}
