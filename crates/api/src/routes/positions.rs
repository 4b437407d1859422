use crate::{
    conversions::{member_profile_to_api, position_to_api},
    middleware::Requester,
    models::{
        CreatePositionRequest, ErrorResponse, MemberResponse, MoveMemberRequest, PositionResponse,
        RemovePositionParams, UpdatePositionRequest,
    },
    routes::common::error_response,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use services::position::PositionDraft;
use services::{OrganisationId, UserId};
use tracing::debug;
use uuid::Uuid;

/// List an organisation's positions with their permission sets
#[utoipa::path(
    get,
    path = "/v1/organisations/{id}/positions",
    tag = "Positions",
    params(("id" = Uuid, Path, description = "Organisation ID")),
    responses(
        (status = 200, description = "Positions, most senior first", body = [PositionResponse])
    )
)]
pub async fn list_positions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PositionResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let positions = state
        .positions
        .list_positions(OrganisationId(id))
        .await
        .map_err(error_response)?;

    Ok(Json(positions.iter().map(position_to_api).collect()))
}

/// Create a position
///
/// Requires the ROLE_CREATE permission. Marking the new position as default
/// atomically clears the organisation's previous default.
#[utoipa::path(
    post,
    path = "/v1/organisations/{id}/positions",
    tag = "Positions",
    params(("id" = Uuid, Path, description = "Organisation ID")),
    request_body = CreatePositionRequest,
    responses(
        (status = 200, description = "Position created", body = PositionResponse),
        (status = 403, description = "Missing ROLE_CREATE", body = ErrorResponse),
        (status = 409, description = "Position name already in use", body = ErrorResponse)
    )
)]
pub async fn create_position(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<CreatePositionRequest>,
) -> Result<Json<PositionResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Creating position {} in organisation {}", request.name, id);

    let position = state
        .positions
        .create_position(
            OrganisationId(id),
            PositionDraft {
                name: request.name,
                rank: request.rank,
                is_default: request.is_default,
                permissions: request.permissions,
            },
            requester.0,
        )
        .await
        .map_err(error_response)?;

    Ok(Json(position_to_api(&position)))
}

/// Update a position
///
/// Requires the ROLE_UPDATE permission. The permission set is applied as a
/// diff against the stored set. The default flag cannot be removed directly;
/// designate a different position as default instead.
#[utoipa::path(
    patch,
    path = "/v1/positions/{id}",
    tag = "Positions",
    params(("id" = Uuid, Path, description = "Position ID")),
    request_body = UpdatePositionRequest,
    responses(
        (status = 200, description = "Position updated", body = PositionResponse),
        (status = 400, description = "Attempt to unset the default flag", body = ErrorResponse),
        (status = 403, description = "Missing ROLE_UPDATE", body = ErrorResponse),
        (status = 404, description = "Position not found", body = ErrorResponse)
    )
)]
pub async fn update_position(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePositionRequest>,
) -> Result<Json<PositionResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Updating position {} by user {}", id, requester.0);

    let position = state
        .positions
        .update_position(
            id,
            PositionDraft {
                name: request.name,
                rank: request.rank,
                is_default: request.is_default,
                permissions: request.permissions,
            },
            requester.0,
        )
        .await
        .map_err(error_response)?;

    Ok(Json(position_to_api(&position)))
}

/// Remove a position
///
/// Requires the ROLE_DELETE permission. Every member still on the position is
/// migrated to the replacement position in the same transaction.
#[utoipa::path(
    delete,
    path = "/v1/positions/{id}",
    tag = "Positions",
    params(
        ("id" = Uuid, Path, description = "Position ID"),
        RemovePositionParams
    ),
    responses(
        (status = 204, description = "Position removed, members migrated"),
        (status = 400, description = "Invalid replacement or default position", body = ErrorResponse),
        (status = 403, description = "Missing ROLE_DELETE", body = ErrorResponse),
        (status = 404, description = "Position not found", body = ErrorResponse)
    )
)]
pub async fn remove_position(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Query(params): Query<RemovePositionParams>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    debug!("Removing position {} (replacement {})", id, params.replacement);

    state
        .positions
        .remove_position(id, params.replacement, requester.0)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the members currently holding a position
#[utoipa::path(
    get,
    path = "/v1/positions/{id}/members",
    tag = "Positions",
    params(("id" = Uuid, Path, description = "Position ID")),
    responses(
        (status = 200, description = "Members on this position", body = [MemberResponse]),
        (status = 404, description = "Position not found", body = ErrorResponse)
    )
)]
pub async fn list_position_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MemberResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let members = state
        .members
        .list_position_members(id)
        .await
        .map_err(error_response)?;

    Ok(Json(members.into_iter().map(member_profile_to_api).collect()))
}

/// Move a member into this position
///
/// Requires the MEMBER_UPDATE_ROLE permission in the position's organisation.
#[utoipa::path(
    post,
    path = "/v1/positions/{id}/members/{user_id}",
    tag = "Positions",
    params(
        ("id" = Uuid, Path, description = "Destination position ID"),
        ("user_id" = Uuid, Path, description = "User to move")
    ),
    request_body = MoveMemberRequest,
    responses(
        (status = 200, description = "Member moved", body = MemberResponse),
        (status = 400, description = "No-op move", body = ErrorResponse),
        (status = 403, description = "Missing MEMBER_UPDATE_ROLE", body = ErrorResponse),
        (status = 404, description = "Member not found in source position", body = ErrorResponse)
    )
)]
pub async fn move_member(
    State(state): State<AppState>,
    requester: Requester,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<MoveMemberRequest>,
) -> Result<Json<MemberResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Moving user {} to position {} by {}", user_id, id, requester.0);

    let member = state
        .members
        .move_member_to_position(UserId(user_id), request.from_position_id, id, requester.0)
        .await
        .map_err(error_response)?;

    // Re-read through the service to attach the position summary
    let position = state
        .positions
        .get_position(member.position_id)
        .await
        .map_err(error_response)?;

    Ok(Json(MemberResponse {
        organisation_id: member.organisation_id.0,
        user_id: member.user_id.0,
        member_since: member.member_since,
        position: crate::models::PositionSummaryResponse {
            id: position.id,
            name: position.name,
        },
        user: None,
    }))
}
