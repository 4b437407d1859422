use crate::{
    conversions::{accepted_invitation_to_api, api_user_to_partial, invitation_view_to_api},
    middleware::Requester,
    models::{
        AcceptedInvitationResponse, CreateInvitationRequest, ErrorResponse,
        InvitationActionRequest, InvitationResponse, InvitationStatusParams,
        RevokeInvitationParams,
    },
    routes::common::{error_response, parse_status_filter},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use services::{OrganisationId, UserId};
use tracing::debug;
use uuid::Uuid;

/// Invite an email address to an organisation
///
/// Requires the MEMBER_INVITE permission. At most one pending invitation may
/// exist per (organisation, email) at a time. Delivery of the invitation
/// email is handled by the messaging service.
#[utoipa::path(
    post,
    path = "/v1/organisations/{id}/invitations",
    tag = "Invitations",
    params(("id" = Uuid, Path, description = "Organisation ID")),
    request_body = CreateInvitationRequest,
    responses(
        (status = 200, description = "Invitation created", body = InvitationResponse),
        (status = 400, description = "Duplicate pending invitation or bad request", body = ErrorResponse),
        (status = 403, description = "Missing MEMBER_INVITE", body = ErrorResponse),
        (status = 404, description = "Organisation not found", body = ErrorResponse)
    )
)]
pub async fn create_invitation(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateInvitationRequest>,
) -> Result<Json<InvitationResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "Creating invitation for {} to organisation {} by user {}",
        request.email, id, requester.0
    );

    let view = state
        .invitations
        .create_invitation(
            OrganisationId(id),
            request.email,
            requester.0,
            request.user.map(api_user_to_partial),
        )
        .await
        .map_err(error_response)?;

    Ok(Json(invitation_view_to_api(view)))
}

/// List an organisation's invitations, optionally filtered by status
#[utoipa::path(
    get,
    path = "/v1/organisations/{id}/invitations",
    tag = "Invitations",
    params(
        ("id" = Uuid, Path, description = "Organisation ID"),
        InvitationStatusParams
    ),
    responses(
        (status = 200, description = "Invitations", body = [InvitationResponse]),
        (status = 400, description = "Unknown status filter", body = ErrorResponse)
    )
)]
pub async fn list_organisation_invites(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<InvitationStatusParams>,
) -> Result<Json<Vec<InvitationResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let status = parse_status_filter(params.status.as_deref())?;

    let invitations = state
        .invitations
        .list_organisation_invites(OrganisationId(id), status)
        .await
        .map_err(error_response)?;

    Ok(Json(
        invitations.into_iter().map(invitation_view_to_api).collect(),
    ))
}

/// Revoke a pending invitation
///
/// The invitation is deleted outright rather than transitioned; the token
/// stops working immediately.
#[utoipa::path(
    delete,
    path = "/v1/organisations/{id}/invitations",
    tag = "Invitations",
    params(
        ("id" = Uuid, Path, description = "Organisation ID"),
        RevokeInvitationParams
    ),
    responses(
        (status = 204, description = "Invitation revoked"),
        (status = 400, description = "No pending invitation for this email", body = ErrorResponse),
        (status = 404, description = "Organisation not found", body = ErrorResponse)
    )
)]
pub async fn revoke_invitation(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Query(params): Query<RevokeInvitationParams>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "Revoking invitation for {} in organisation {} by user {}",
        params.email, id, requester.0
    );

    state
        .invitations
        .revoke_invitation(OrganisationId(id), &params.email)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// List a user's invitations, optionally filtered by status
#[utoipa::path(
    get,
    path = "/v1/users/{id}/invitations",
    tag = "Invitations",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        InvitationStatusParams
    ),
    responses(
        (status = 200, description = "Invitations", body = [InvitationResponse]),
        (status = 400, description = "Unknown status filter", body = ErrorResponse)
    )
)]
pub async fn list_user_invites(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<InvitationStatusParams>,
) -> Result<Json<Vec<InvitationResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let status = parse_status_filter(params.status.as_deref())?;

    let invitations = state
        .invitations
        .list_user_invites(UserId(id), status)
        .await
        .map_err(error_response)?;

    Ok(Json(
        invitations.into_iter().map(invitation_view_to_api).collect(),
    ))
}

/// Accept an invitation by token
///
/// The acting user's email must match the invitation and the invitation must
/// still be pending and unexpired. On success the user becomes a member of
/// the organisation on its default position.
#[utoipa::path(
    post,
    path = "/v1/invitations/{token}/accept",
    tag = "Invitations",
    params(("token" = String, Path, description = "Invitation token")),
    request_body = InvitationActionRequest,
    responses(
        (status = 200, description = "Invitation accepted, member created", body = AcceptedInvitationResponse),
        (status = 400, description = "Invalid, expired or mismatched invitation", body = ErrorResponse),
        (status = 404, description = "Invitation not found", body = ErrorResponse)
    )
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<InvitationActionRequest>,
) -> Result<Json<AcceptedInvitationResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Accepting invitation for {}", request.email);

    let accepted = state
        .invitations
        .handle_invitation_accept(&token, &request.email)
        .await
        .map_err(error_response)?;

    Ok(Json(accepted_invitation_to_api(accepted)))
}

/// Reject an invitation by token
#[utoipa::path(
    post,
    path = "/v1/invitations/{token}/reject",
    tag = "Invitations",
    params(("token" = String, Path, description = "Invitation token")),
    request_body = InvitationActionRequest,
    responses(
        (status = 204, description = "Invitation rejected"),
        (status = 400, description = "Invalid, expired or mismatched invitation", body = ErrorResponse),
        (status = 404, description = "Invitation not found", body = ErrorResponse)
    )
)]
pub async fn reject_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<InvitationActionRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    debug!("Rejecting invitation for {}", request.email);

    state
        .invitations
        .handle_invitation_reject(&token, &request.email)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}
