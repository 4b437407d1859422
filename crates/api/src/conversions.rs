use crate::models::{
    AcceptedInvitationResponse, InvitationResponse, MemberResponse, MembershipResponse,
    OrganisationResponse, PositionResponse, PositionSummaryResponse, UserSummary,
};
use services::directory::ports::PartialUser;
use services::invitation::ports::InvitationView;
use services::invitation::AcceptedInvitation;
use services::member::ports::{MemberProfile, MemberWithOrganisation};
use services::organisation::ports::Organisation;
use services::position::ports::Position;

pub fn organisation_to_api(organisation: &Organisation) -> OrganisationResponse {
    OrganisationResponse {
        id: organisation.id.0,
        name: organisation.name.clone(),
        email: organisation.email.clone(),
        description: organisation.description.clone(),
        avatar_url: organisation.avatar_url.clone(),
        public: organisation.public,
        creator_id: organisation.creator_id.0,
        member_count: organisation.member_count,
        created_at: organisation.created_at,
        updated_at: organisation.updated_at,
    }
}

pub fn position_to_api(position: &Position) -> PositionResponse {
    PositionResponse {
        id: position.id,
        organisation_id: position.organisation_id.0,
        name: position.name.clone(),
        rank: position.rank,
        is_default: position.is_default,
        permissions: position.permissions.clone(),
    }
}

pub fn partial_user_to_api(user: &PartialUser) -> UserSummary {
    UserSummary {
        id: user.id.0,
        display_name: user.display_name.clone(),
        email: user.email.clone(),
        avatar_url: user.avatar_url.clone(),
    }
}

pub fn api_user_to_partial(user: UserSummary) -> PartialUser {
    PartialUser {
        id: services::UserId(user.id),
        display_name: user.display_name,
        email: user.email,
        avatar_url: user.avatar_url,
        last_seen: None,
    }
}

pub fn member_profile_to_api(profile: MemberProfile) -> MemberResponse {
    MemberResponse {
        organisation_id: profile.organisation_id.0,
        user_id: profile.user_id.0,
        member_since: profile.member_since,
        position: PositionSummaryResponse {
            id: profile.position.id,
            name: profile.position.name,
        },
        user: profile.user.as_ref().map(partial_user_to_api),
    }
}

pub fn membership_to_api(membership: MemberWithOrganisation) -> MembershipResponse {
    MembershipResponse {
        organisation: organisation_to_api(&membership.organisation),
        position_id: membership.member.position_id,
        member_since: membership.member.member_since,
    }
}

pub fn invitation_view_to_api(view: InvitationView) -> InvitationResponse {
    InvitationResponse {
        id: view.invitation.id,
        organisation_id: view.invitation.organisation_id.0,
        email: view.invitation.email,
        token: view.invitation.token,
        status: view.invitation.status.as_str().to_string(),
        created_at: view.invitation.created_at,
        expires_at: view.invitation.expires_at,
        user: view.user.as_ref().map(partial_user_to_api),
    }
}

pub fn accepted_invitation_to_api(accepted: AcceptedInvitation) -> AcceptedInvitationResponse {
    AcceptedInvitationResponse {
        member: MemberResponse {
            organisation_id: accepted.member.organisation_id.0,
            user_id: accepted.member.user_id.0,
            member_since: accepted.member.member_since,
            position: PositionSummaryResponse {
                id: accepted.position.id,
                name: accepted.position.name.clone(),
            },
            user: Some(partial_user_to_api(&accepted.user)),
        },
        organisation: organisation_to_api(&accepted.organisation),
        position: position_to_api(&accepted.position),
    }
}
