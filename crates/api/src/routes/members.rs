use crate::{
    conversions::{member_profile_to_api, membership_to_api},
    middleware::Requester,
    models::{ErrorResponse, MemberResponse, MembershipResponse},
    routes::common::error_response,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use services::{OrganisationId, UserId};
use tracing::debug;
use uuid::Uuid;

/// List an organisation's members
///
/// Display profiles are resolved from the user directory; entries degrade to
/// the bare membership when the directory is unavailable.
#[utoipa::path(
    get,
    path = "/v1/organisations/{id}/members",
    tag = "Members",
    params(("id" = Uuid, Path, description = "Organisation ID")),
    responses(
        (status = 200, description = "Organisation members", body = [MemberResponse])
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MemberResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let members = state
        .members
        .list_members(OrganisationId(id))
        .await
        .map_err(error_response)?;

    Ok(Json(members.into_iter().map(member_profile_to_api).collect()))
}

/// Remove a member from an organisation
///
/// Members may remove themselves freely. Removing someone else requires the
/// MEMBER_REMOVE permission and a strictly higher-ranked position than the
/// target. The organisation creator cannot be removed.
#[utoipa::path(
    delete,
    path = "/v1/organisations/{id}/members/{user_id}",
    tag = "Members",
    params(
        ("id" = Uuid, Path, description = "Organisation ID"),
        ("user_id" = Uuid, Path, description = "User ID of the member to remove")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Permission or rank insufficient, or target is the creator", body = ErrorResponse),
        (status = 404, description = "Organisation or member not found", body = ErrorResponse)
    )
)]
pub async fn remove_member(
    State(state): State<AppState>,
    requester: Requester,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "Removing member {} from organisation {} by user {}",
        user_id, id, requester.0
    );

    state
        .members
        .remove_member(OrganisationId(id), UserId(user_id), requester.0)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the organisations a user belongs to
#[utoipa::path(
    get,
    path = "/v1/users/{id}/memberships",
    tag = "Members",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "The user's memberships", body = [MembershipResponse])
    )
)]
pub async fn list_user_memberships(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MembershipResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let memberships = state
        .members
        .list_user_memberships(UserId(id))
        .await
        .map_err(error_response)?;

    Ok(Json(memberships.into_iter().map(membership_to_api).collect()))
}
