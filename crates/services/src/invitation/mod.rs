use crate::common::generate_invite_token;
use crate::directory::ports::{PartialUser, UserDirectory, UserId};
use crate::error::ServiceError;
use crate::member::ports::Member;
use crate::member::MemberService;
use crate::organisation::ports::Organisation;
use crate::organisation::{OrganisationId, OrganisationService};
use crate::permission::Permission;
use crate::position::ports::Position;
use crate::position::CachedPositionResolver;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub mod ports;
pub use ports::*;

/// Outcome of a successful invitation acceptance: the freshly created member
/// with its position and organisation context.
#[derive(Debug, Clone)]
pub struct AcceptedInvitation {
    pub member: Member,
    pub position: Position,
    pub organisation: Arc<Organisation>,
    pub user: PartialUser,
}

pub struct InvitationService {
    invitations: Arc<dyn InvitationRepository>,
    organisations: Arc<OrganisationService>,
    members: Arc<MemberService>,
    resolver: Arc<CachedPositionResolver>,
    directory: Arc<dyn UserDirectory>,
    settings: config::InvitationConfig,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationRepository>,
        organisations: Arc<OrganisationService>,
        members: Arc<MemberService>,
        resolver: Arc<CachedPositionResolver>,
        directory: Arc<dyn UserDirectory>,
        settings: config::InvitationConfig,
    ) -> Self {
        Self {
            invitations,
            organisations,
            members,
            resolver,
            directory,
            settings,
        }
    }

    /// Create an invitation for an email address to join an organisation;
    /// requires MEMBER_INVITE. At most one pending invitation may exist per
    /// (organisation, email): a pre-check catches the common case and the
    /// storage uniqueness constraint catches concurrent creations, both
    /// surfacing the same error.
    ///
    /// Dispatching the invitation email is the messaging service's concern,
    /// not handled here.
    pub async fn create_invitation(
        &self,
        organisation_id: OrganisationId,
        email: String,
        inviter_id: UserId,
        known_user: Option<PartialUser>,
    ) -> Result<InvitationView, ServiceError> {
        if let Some(ref user) = known_user {
            if user.email != email {
                return Err(ServiceError::InvalidArgument(
                    "Email does not match the provided user".to_string(),
                ));
            }
        }

        self.organisations.get_organisation(organisation_id).await?;

        let inviter_position = self.resolver.resolve(organisation_id, inviter_id).await?;
        if !inviter_position.holds(Permission::MemberInvite) {
            return Err(ServiceError::PermissionDenied(
                "User does not have permission to invite users".to_string(),
            ));
        }

        let existing = self
            .invitations
            .find_pending(organisation_id.0, &email)
            .await
            .map_err(|e| ServiceError::internal("Failed to check for existing invitation", e))?;
        if existing.is_some() {
            return Err(duplicate_invite_error());
        }

        debug!(organisation = %organisation_id, email = %email, "Creating invitation");

        let invitation = self
            .invitations
            .insert(NewInvitation {
                id: Uuid::new_v4(),
                organisation_id: organisation_id.0,
                user_id: known_user.as_ref().map(|u| u.id.0),
                email,
                token: generate_invite_token(),
                expires_at: Utc::now() + Duration::days(self.settings.expiry_days),
            })
            .await
            .map_err(|e| {
                // A concurrent creation that slipped past the pre-check lands
                // on the storage constraint; same outcome for the caller.
                if crate::common::is_unique_violation(&e) {
                    duplicate_invite_error()
                } else {
                    ServiceError::internal("Failed to create invitation", e)
                }
            })?;

        Ok(InvitationView {
            invitation,
            user: known_user,
        })
    }

    /// Accept an invitation: validates the token, the accepting user and the
    /// invitation's validity window, then consumes the invitation and adds
    /// the member on the organisation's default position in one transaction.
    pub async fn handle_invitation_accept(
        &self,
        token: &str,
        email: &str,
    ) -> Result<AcceptedInvitation, ServiceError> {
        let invitation = self.find_pending_by_token(token).await?;

        let user = self
            .directory
            .fetch_user_by_email(email)
            .await
            .ok_or_else(|| ServiceError::InvalidArgument("User not found".to_string()))?;

        validate_invite_ownership(&invitation, email)?;

        let (member, position) = self
            .members
            .add_member_from_invitation(&invitation, &user)
            .await?;
        let organisation = self
            .organisations
            .get_organisation(invitation.organisation_id)
            .await?;

        info!(
            organisation = %invitation.organisation_id,
            user = %user.id,
            "Invitation accepted"
        );

        Ok(AcceptedInvitation {
            member,
            position,
            organisation,
            user,
        })
    }

    /// Reject an invitation; no membership side effect
    pub async fn handle_invitation_reject(
        &self,
        token: &str,
        email: &str,
    ) -> Result<(), ServiceError> {
        let invitation = self.find_pending_by_token(token).await?;
        validate_invite_ownership(&invitation, email)?;

        self.invitations
            .update_status(invitation.id, InvitationStatus::Rejected)
            .await
            .map_err(|e| ServiceError::internal("Failed to reject invitation", e))?;
        Ok(())
    }

    /// Withdraw a pending invitation outright. A hard delete, not a status
    /// transition: a revoked invitation leaves no trace for the invitee.
    pub async fn revoke_invitation(
        &self,
        organisation_id: OrganisationId,
        email: &str,
    ) -> Result<(), ServiceError> {
        self.organisations.get_organisation(organisation_id).await?;

        let invitation = self
            .invitations
            .find_pending(organisation_id.0, email)
            .await
            .map_err(|e| ServiceError::internal("Failed to find invitation", e))?
            .ok_or_else(|| {
                ServiceError::InvalidArgument(
                    "No active invitation found for this user".to_string(),
                )
            })?;

        self.invitations
            .delete(invitation.id)
            .await
            .map_err(|e| ServiceError::internal("Failed to revoke invitation", e))?;
        Ok(())
    }

    /// All invitations extended by an organisation, optionally filtered by
    /// status and enriched with invitee profiles (best-effort).
    pub async fn list_organisation_invites(
        &self,
        organisation_id: OrganisationId,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<InvitationView>, ServiceError> {
        let invitations = self
            .invitations
            .list_by_organisation(organisation_id.0, status)
            .await
            .map_err(|e| ServiceError::internal("Failed to list invitations", e))?;

        let user_ids: Vec<UserId> = invitations.iter().filter_map(|i| i.user_id).collect();
        let mut profiles = self.directory.fetch_users_by_ids(&user_ids).await;

        Ok(invitations
            .into_iter()
            .map(|invitation| {
                let user = invitation.user_id.and_then(|id| profiles.remove(&id));
                InvitationView { invitation, user }
            })
            .collect())
    }

    /// A user's own invitations, optionally filtered by status
    pub async fn list_user_invites(
        &self,
        user_id: UserId,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<InvitationView>, ServiceError> {
        let invitations = self
            .invitations
            .list_by_user(user_id.0, status)
            .await
            .map_err(|e| ServiceError::internal("Failed to list user invitations", e))?;

        let user = self
            .directory
            .fetch_users_by_ids(&[user_id])
            .await
            .remove(&user_id);

        Ok(invitations
            .into_iter()
            .map(|invitation| InvitationView {
                invitation,
                user: user.clone(),
            })
            .collect())
    }

    /// Expire every pending invitation whose validity window has passed.
    /// Run on a schedule; idempotent.
    pub async fn expire_stale_pending(&self) -> Result<u64, ServiceError> {
        let expired = self
            .invitations
            .expire_stale()
            .await
            .map_err(|e| ServiceError::internal("Failed to expire invitations", e))?;
        if expired > 0 {
            info!(count = expired, "Expired stale pending invitations");
        }
        Ok(expired)
    }

    async fn find_pending_by_token(&self, token: &str) -> Result<Invitation, ServiceError> {
        self.invitations
            .find_pending_by_token(token)
            .await
            .map_err(|e| ServiceError::internal("Failed to look up invitation", e))?
            .ok_or(ServiceError::InvitationNotFound)
    }
}

fn duplicate_invite_error() -> ServiceError {
    ServiceError::InvalidArgument(
        "An active invitation already exists for this user; a user may only have one active \
         invite for any given organisation at a time"
            .to_string(),
    )
}

/// The invitation must still be actionable and belong to the acting user
fn validate_invite_ownership(invitation: &Invitation, email: &str) -> Result<(), ServiceError> {
    if !invitation.is_actionable(Utc::now()) {
        return Err(ServiceError::InvalidArgument(
            "Invitation is no longer valid".to_string(),
        ));
    }
    if invitation.email != email {
        return Err(ServiceError::InvalidArgument(
            "Email does not match the invitation".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::INVITE_TOKEN_LENGTH;
    use crate::mocks::{test_resolver, InMemoryStore, NullDirectory, OrganisationFixture, StubDirectory};

    struct Harness {
        store: Arc<InMemoryStore>,
        fixture: OrganisationFixture,
        directory: Arc<StubDirectory>,
        invitations: InvitationService,
    }

    fn harness() -> Harness {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let resolver = test_resolver(&store);
        let directory = Arc::new(StubDirectory::default());

        let organisations = Arc::new(OrganisationService::new(
            store.clone(),
            resolver.clone(),
            &config::CacheConfig::default(),
        ));
        let members = Arc::new(MemberService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            resolver.clone(),
            directory.clone(),
        ));
        let invitations = InvitationService::new(
            store.clone(),
            organisations,
            members,
            resolver,
            directory.clone(),
            config::InvitationConfig::default(),
        );

        Harness {
            store,
            fixture,
            directory,
            invitations,
        }
    }

    #[tokio::test]
    async fn invitation_lifecycle_scenario() {
        // Org with default position D (rank 1, no permissions); the creator
        // holds the owner position M (outranking, MEMBER_INVITE + MEMBER_REMOVE).
        let h = harness();
        let invitee_email = "a@example.com";
        let invitee = h.directory.add_user(invitee_email);

        let view = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                invitee_email.to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();
        assert_eq!(view.invitation.status, InvitationStatus::Pending);
        assert_eq!(view.invitation.token.len(), INVITE_TOKEN_LENGTH);
        let remaining = view.invitation.expires_at - Utc::now();
        assert!(remaining > Duration::days(6) && remaining <= Duration::days(7));

        // Second invite to the same email while the first is pending
        let err = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                invitee_email.to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("active invitation already exists")));

        // Accept with the correct email: member lands on the default position
        let accepted = h
            .invitations
            .handle_invitation_accept(&view.invitation.token, invitee_email)
            .await
            .unwrap();
        assert_eq!(accepted.member.user_id, invitee);
        assert_eq!(accepted.position.id, h.fixture.default_position_id);
        assert!(accepted.position.is_default);
        assert_eq!(
            h.store.invitation_status(view.invitation.id),
            Some(InvitationStatus::Accepted)
        );

        // A member holding only the default position cannot remove the newcomer
        let bystander = UserId(Uuid::new_v4());
        h.store
            .add_member_on_default(h.fixture.organisation_id.0, bystander.0);
        let members = MemberService::new(
            h.store.clone(),
            h.store.clone(),
            h.store.clone(),
            test_resolver(&h.store),
            Arc::new(NullDirectory),
        );
        let err = members
            .remove_member(h.fixture.organisation_id, invitee, bystander)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn accepting_twice_fails_with_not_found() {
        let h = harness();
        let email = "twice@example.com";
        h.directory.add_user(email);

        let view = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                email.to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();

        h.invitations
            .handle_invitation_accept(&view.invitation.token, email)
            .await
            .unwrap();

        // The token now points at a terminal invitation; the pending-filtered
        // lookup refuses to resurrect it.
        let err = h
            .invitations
            .handle_invitation_accept(&view.invitation.token, email)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvitationNotFound));
    }

    #[tokio::test]
    async fn accept_validates_email_ownership_and_user_existence() {
        let h = harness();
        let email = "owner@example.com";
        h.directory.add_user(email);
        h.directory.add_user("other@example.com");

        let view = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                email.to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();

        // Wrong email, known user
        let err = h
            .invitations
            .handle_invitation_accept(&view.invitation.token, "other@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("does not match")));

        // Email with no directory profile
        let err = h
            .invitations
            .handle_invitation_accept(&view.invitation.token, "ghost@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("User not found")));
    }

    #[tokio::test]
    async fn expired_invitations_cannot_be_accepted() {
        let h = harness();
        let email = "late@example.com";
        h.directory.add_user(email);

        let view = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                email.to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();
        h.store
            .backdate_invitation(view.invitation.id, Utc::now() - Duration::hours(1));

        let err = h
            .invitations
            .handle_invitation_accept(&view.invitation.token, email)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("no longer valid")));
    }

    #[tokio::test]
    async fn create_requires_member_invite_permission() {
        let h = harness();
        let bystander = UserId(Uuid::new_v4());
        h.store
            .add_member_on_default(h.fixture.organisation_id.0, bystander.0);

        let err = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                "x@example.com".to_string(),
                bystander,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn create_rejects_known_user_with_mismatched_email() {
        let h = harness();
        let user = h.directory.user("someone@example.com");

        let err = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                "different@example.com".to_string(),
                h.fixture.creator,
                Some(user),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("does not match the provided user")));
    }

    #[tokio::test]
    async fn storage_conflict_maps_to_duplicate_invite_error() {
        let h = harness();
        // Simulate the concurrent-create race: the pre-check passes but the
        // insert trips the storage uniqueness constraint.
        h.store.fail_next_invitation_insert_with_conflict();

        let err = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                "raced@example.com".to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("active invitation already exists")));
    }

    #[tokio::test]
    async fn reject_marks_invitation_without_creating_member() {
        let h = harness();
        let email = "decline@example.com";
        h.directory.add_user(email);

        let view = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                email.to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();

        h.invitations
            .handle_invitation_reject(&view.invitation.token, email)
            .await
            .unwrap();

        assert_eq!(
            h.store.invitation_status(view.invitation.id),
            Some(InvitationStatus::Rejected)
        );
        // Only the creator's membership exists
        assert_eq!(h.store.members_of(h.fixture.organisation_id.0).len(), 1);
    }

    #[tokio::test]
    async fn revoke_deletes_the_pending_invitation_outright() {
        let h = harness();
        let email = "revoke@example.com";

        let view = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                email.to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();

        h.invitations
            .revoke_invitation(h.fixture.organisation_id, email)
            .await
            .unwrap();

        // Gone entirely, not transitioned
        assert_eq!(h.store.invitation_status(view.invitation.id), None);

        let err = h
            .invitations
            .revoke_invitation(h.fixture.organisation_id, email)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("No active invitation")));
    }

    #[tokio::test]
    async fn expiry_sweep_only_touches_stale_pending_invites() {
        let h = harness();
        let fresh = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                "fresh@example.com".to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();
        let stale = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                "stale@example.com".to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();
        h.store
            .backdate_invitation(stale.invitation.id, Utc::now() - Duration::days(1));

        assert_eq!(h.invitations.expire_stale_pending().await.unwrap(), 1);
        assert_eq!(
            h.store.invitation_status(stale.invitation.id),
            Some(InvitationStatus::Expired)
        );
        assert_eq!(
            h.store.invitation_status(fresh.invitation.id),
            Some(InvitationStatus::Pending)
        );

        // Re-running the sweep is a no-op
        assert_eq!(h.invitations.expire_stale_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn user_listing_attaches_the_invitee_profile() {
        let h = harness();
        let email = "mine@example.com";
        let invitee = h.directory.add_user(email);
        let profile = h.directory.user(email);

        h.invitations
            .create_invitation(
                h.fixture.organisation_id,
                email.to_string(),
                h.fixture.creator,
                Some(profile),
            )
            .await
            .unwrap();

        let mine = h.invitations.list_user_invites(invitee, None).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user.as_ref().unwrap().email, email);
    }

    #[tokio::test]
    async fn listings_filter_by_status() {
        let h = harness();
        let email = "list@example.com";
        h.directory.add_user(email);

        let view = h
            .invitations
            .create_invitation(
                h.fixture.organisation_id,
                email.to_string(),
                h.fixture.creator,
                None,
            )
            .await
            .unwrap();
        h.invitations
            .handle_invitation_reject(&view.invitation.token, email)
            .await
            .unwrap();

        let pending = h
            .invitations
            .list_organisation_invites(h.fixture.organisation_id, Some(InvitationStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());

        let rejected = h
            .invitations
            .list_organisation_invites(h.fixture.organisation_id, Some(InvitationStatus::Rejected))
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].invitation.email, email);
    }
}
