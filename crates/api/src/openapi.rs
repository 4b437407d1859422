use crate::models;
use crate::routes;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Guildmaster API",
        description = "Organisation, position and invitation management service"
    ),
    paths(
        routes::health::health_check,
        routes::organisations::create_organisation,
        routes::organisations::get_organisation,
        routes::organisations::get_organisation_by_name,
        routes::organisations::update_organisation,
        routes::organisations::delete_organisation,
        routes::positions::list_positions,
        routes::positions::create_position,
        routes::positions::update_position,
        routes::positions::remove_position,
        routes::positions::list_position_members,
        routes::positions::move_member,
        routes::members::list_members,
        routes::members::remove_member,
        routes::members::list_user_memberships,
        routes::invitations::create_invitation,
        routes::invitations::list_organisation_invites,
        routes::invitations::revoke_invitation,
        routes::invitations::list_user_invites,
        routes::invitations::accept_invitation,
        routes::invitations::reject_invitation,
    ),
    components(schemas(
        models::ErrorResponse,
        models::ErrorDetail,
        models::CreateOrganisationRequest,
        models::UpdateOrganisationRequest,
        models::OrganisationResponse,
        models::CreatePositionRequest,
        models::UpdatePositionRequest,
        models::PositionResponse,
        models::PositionSummaryResponse,
        models::UserSummary,
        models::MemberResponse,
        models::MembershipResponse,
        models::MoveMemberRequest,
        models::CreateInvitationRequest,
        models::InvitationActionRequest,
        models::InvitationResponse,
        models::AcceptedInvitationResponse,
        routes::health::HealthResponse,
    )),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Organisations", description = "Organisation CRUD"),
        (name = "Positions", description = "Ranked positions and permission sets"),
        (name = "Members", description = "Organisation membership"),
        (name = "Invitations", description = "Invitation lifecycle"),
    )
)]
pub struct ApiDoc;
