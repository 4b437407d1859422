use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use services::Permission;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
}

impl ErrorResponse {
    pub fn new(message: String, r#type: String) -> Self {
        Self {
            error: ErrorDetail { message, r#type },
        }
    }
}

// ============================================
// Organisations
// ============================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrganisationRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub description: String,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrganisationRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub public: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganisationResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub description: String,
    pub avatar_url: Option<String>,
    pub public: bool,
    pub creator_id: Uuid,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================
// Positions
// ============================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePositionRequest {
    pub name: String,
    pub rank: i32,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    #[schema(value_type = Vec<String>, example = json!(["MEMBER_INVITE"]))]
    pub permissions: Vec<Permission>,
}

/// Full requested state of the position; the permission diff is computed
/// server-side.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePositionRequest {
    pub name: String,
    pub rank: i32,
    pub is_default: bool,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct RemovePositionParams {
    /// Position that the removed position's members are migrated onto
    pub replacement: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PositionResponse {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub name: String,
    pub rank: i32,
    pub is_default: bool,
    #[schema(value_type = Vec<String>)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PositionSummaryResponse {
    pub id: Uuid,
    pub name: String,
}

// ============================================
// Members
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    pub organisation_id: Uuid,
    pub user_id: Uuid,
    pub member_since: DateTime<Utc>,
    pub position: PositionSummaryResponse,
    /// Absent when the user directory could not be reached
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MembershipResponse {
    pub organisation: OrganisationResponse,
    pub position_id: Uuid,
    pub member_since: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MoveMemberRequest {
    /// The position the member currently holds
    pub from_position_id: Uuid,
}

// ============================================
// Invitations
// ============================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateInvitationRequest {
    pub email: String,
    /// The invitee's directory profile, when the front-end already has it
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InvitationActionRequest {
    /// Email of the user acting on the invitation; must match the invitation
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct InvitationStatusParams {
    /// Filter by status: pending, accepted, rejected or expired
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct RevokeInvitationParams {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub email: String,
    pub token: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcceptedInvitationResponse {
    pub member: MemberResponse,
    pub organisation: OrganisationResponse,
    pub position: PositionResponse,
}
