use crate::directory::ports::{PartialUser, UserDirectory, UserId};
use crate::error::ServiceError;
use crate::invitation::ports::Invitation;
use crate::organisation::ports::{OrganisationId, OrganisationRepository};
use crate::permission::Permission;
use crate::position::ports::{Position, PositionRepository};
use crate::position::CachedPositionResolver;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub mod ports;
pub use ports::*;

pub struct MemberService {
    members: Arc<dyn MemberRepository>,
    organisations: Arc<dyn OrganisationRepository>,
    positions: Arc<dyn PositionRepository>,
    resolver: Arc<CachedPositionResolver>,
    directory: Arc<dyn UserDirectory>,
}

impl MemberService {
    pub fn new(
        members: Arc<dyn MemberRepository>,
        organisations: Arc<dyn OrganisationRepository>,
        positions: Arc<dyn PositionRepository>,
        resolver: Arc<CachedPositionResolver>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            members,
            organisations,
            positions,
            resolver,
            directory,
        }
    }

    pub async fn get_member(
        &self,
        organisation_id: OrganisationId,
        user_id: UserId,
    ) -> Result<Member, ServiceError> {
        self.members
            .get(organisation_id.0, user_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to get member", e))?
            .ok_or(ServiceError::MemberNotFound)
    }

    /// List an organisation's members, enriched with display profiles from
    /// the user directory (best-effort) and their position summaries.
    pub async fn list_members(
        &self,
        organisation_id: OrganisationId,
    ) -> Result<Vec<MemberProfile>, ServiceError> {
        let members = self
            .members
            .list_by_organisation(organisation_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to list members", e))?;

        let positions = self.position_names(organisation_id.0).await?;
        self.to_profiles(members, &positions).await
    }

    /// Members currently holding a given position
    pub async fn list_position_members(
        &self,
        position_id: Uuid,
    ) -> Result<Vec<MemberProfile>, ServiceError> {
        let position = self
            .positions
            .get_by_id(position_id)
            .await
            .map_err(|e| ServiceError::internal("Failed to get position", e))?
            .ok_or(ServiceError::PositionNotFound)?;

        let members = self
            .members
            .list_by_position(position_id)
            .await
            .map_err(|e| ServiceError::internal("Failed to list position members", e))?;

        let mut positions = HashMap::new();
        positions.insert(position.id, position.name.clone());
        self.to_profiles(members, &positions).await
    }

    /// The organisations a user belongs to, with organisation context.
    /// No profile enrichment: this is a user-specific request.
    pub async fn list_user_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<MemberWithOrganisation>, ServiceError> {
        let members = self
            .members
            .list_by_user(user_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to list user memberships", e))?;

        let mut memberships = Vec::with_capacity(members.len());
        for member in members {
            let organisation = self
                .organisations
                .get_by_id(member.organisation_id.0)
                .await
                .map_err(|e| ServiceError::internal("Failed to get organisation", e))?
                .ok_or(ServiceError::OrganisationNotFound)?;
            memberships.push(MemberWithOrganisation {
                member,
                organisation,
            });
        }
        Ok(memberships)
    }

    /// Remove a member from an organisation.
    ///
    /// Either the member leaves voluntarily (no permission check), or a
    /// privileged member removes them, which requires MEMBER_REMOVE and a
    /// strictly higher rank than the target. The organisation creator can
    /// never be removed without transferring ownership first.
    pub async fn remove_member(
        &self,
        organisation_id: OrganisationId,
        user_id: UserId,
        requester_id: UserId,
    ) -> Result<(), ServiceError> {
        let organisation = self
            .organisations
            .get_by_id(organisation_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to get organisation", e))?
            .ok_or(ServiceError::OrganisationNotFound)?;

        // Validate the user actually is a member before any other judgement
        self.get_member(organisation_id, user_id).await?;

        if organisation.creator_id == user_id {
            return Err(ServiceError::PermissionDenied(
                "User must transfer ownership before being removed from the organisation"
                    .to_string(),
            ));
        }

        // Voluntary leave needs no permission check
        if user_id == requester_id {
            self.delete_member(organisation_id, user_id).await?;
            return Ok(());
        }

        let requester_position = self.resolver.resolve(organisation_id, requester_id).await?;
        let target_position = self.resolver.resolve(organisation_id, user_id).await?;

        if !requester_position.permits_over(Permission::MemberRemove, &target_position) {
            return Err(ServiceError::PermissionDenied(
                "User does not have permission to remove members from the organisation, \
                 or is of a lower ranked role to the target"
                    .to_string(),
            ));
        }

        self.delete_member(organisation_id, user_id).await
    }

    /// Add a member from a validated invitation, on the organisation's
    /// default position. The status flip to ACCEPTED and the member insert
    /// happen in one storage transaction; the caller must already have
    /// validated the invitation (see the invitation service).
    pub async fn add_member_from_invitation(
        &self,
        invitation: &Invitation,
        user: &PartialUser,
    ) -> Result<(Member, Position), ServiceError> {
        let position = self
            .positions
            .find_default(invitation.organisation_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to get default position", e))?
            .ok_or(ServiceError::PositionNotFound)?;

        debug!(
            organisation = %invitation.organisation_id,
            user = %user.id,
            "Adding member from invitation"
        );

        let member = self
            .members
            .create_from_invitation(
                invitation.id,
                invitation.organisation_id.0,
                user.id.0,
                position.id,
            )
            .await
            .map_err(|e| {
                if crate::common::is_unique_violation(&e) {
                    ServiceError::Conflict(
                        "User is already a member of this organisation".to_string(),
                    )
                } else {
                    ServiceError::internal("Failed to add member", e)
                }
            })?;

        Ok((member, position))
    }

    /// Move a member from one position to another within an organisation;
    /// requires MEMBER_UPDATE_ROLE in the destination position's organisation
    /// (non-hierarchical). No-op moves are rejected.
    pub async fn move_member_to_position(
        &self,
        user_id: UserId,
        from_position_id: Uuid,
        to_position_id: Uuid,
        requester_id: UserId,
    ) -> Result<Member, ServiceError> {
        if from_position_id == to_position_id {
            return Err(ServiceError::InvalidArgument(
                "User is already in the target position".to_string(),
            ));
        }

        let to_position = self
            .positions
            .get_by_id(to_position_id)
            .await
            .map_err(|e| ServiceError::internal("Failed to get position", e))?
            .ok_or(ServiceError::PositionNotFound)?;

        let requester_position = self
            .resolver
            .resolve(to_position.organisation_id, requester_id)
            .await?;
        if !requester_position.holds(Permission::MemberUpdateRole) {
            return Err(ServiceError::PermissionDenied(
                "User does not have permission to move other users".to_string(),
            ));
        }

        let member = self
            .members
            .find_by_position_and_user(from_position_id, user_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to find member", e))?
            .ok_or(ServiceError::MemberNotFound)?;

        if member.organisation_id != to_position.organisation_id {
            return Err(ServiceError::InvalidArgument(
                "Cannot move a member into a position of another organisation".to_string(),
            ));
        }

        let updated = self
            .members
            .update_position(member.organisation_id.0, user_id.0, to_position.id)
            .await
            .map_err(|e| ServiceError::internal("Failed to move member", e))?;

        self.resolver.evict(member.organisation_id, user_id).await;
        Ok(updated)
    }

    async fn delete_member(
        &self,
        organisation_id: OrganisationId,
        user_id: UserId,
    ) -> Result<(), ServiceError> {
        let deleted = self
            .members
            .delete(organisation_id.0, user_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to remove member", e))?;
        if !deleted {
            return Err(ServiceError::MemberNotFound);
        }
        // The membership no longer exists, so the cached position is stale
        self.resolver.evict(organisation_id, user_id).await;
        Ok(())
    }

    async fn position_names(
        &self,
        organisation_id: Uuid,
    ) -> Result<HashMap<Uuid, String>, ServiceError> {
        let positions = self
            .positions
            .list_by_organisation(organisation_id)
            .await
            .map_err(|e| ServiceError::internal("Failed to list positions", e))?;
        Ok(positions.into_iter().map(|p| (p.id, p.name)).collect())
    }

    async fn to_profiles(
        &self,
        members: Vec<Member>,
        positions: &HashMap<Uuid, String>,
    ) -> Result<Vec<MemberProfile>, ServiceError> {
        let user_ids: Vec<UserId> = members.iter().map(|m| m.user_id).collect();
        let mut profiles = self.directory.fetch_users_by_ids(&user_ids).await;

        members
            .into_iter()
            .map(|member| {
                let name = positions.get(&member.position_id).cloned().ok_or_else(|| {
                    ServiceError::Internal(format!(
                        "Member {} references unknown position {}",
                        member.user_id, member.position_id
                    ))
                })?;
                Ok(MemberProfile {
                    organisation_id: member.organisation_id,
                    user_id: member.user_id,
                    member_since: member.member_since,
                    position: PositionSummary {
                        id: member.position_id,
                        name,
                    },
                    user: profiles.remove(&member.user_id),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{test_resolver, InMemoryStore, NullDirectory, OrganisationFixture};

    fn service(store: &Arc<InMemoryStore>) -> MemberService {
        MemberService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            test_resolver(store),
            Arc::new(NullDirectory),
        )
    }

    #[tokio::test]
    async fn creator_cannot_be_removed_even_by_themselves() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        // Self-removal by the creator
        let err = service
            .remove_member(fixture.organisation_id, fixture.creator, fixture.creator)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(msg)
            if msg.contains("transfer ownership")));

        // Removal by a fully-privileged other member
        let officer = UserId(Uuid::new_v4());
        store.add_member_on_position(
            fixture.organisation_id.0,
            officer.0,
            fixture.owner_position_id,
        );
        let err = service
            .remove_member(fixture.organisation_id, fixture.creator, officer)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn self_removal_needs_no_permission() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let member = UserId(Uuid::new_v4());
        store.add_member_on_default(fixture.organisation_id.0, member.0);

        service
            .remove_member(fixture.organisation_id, member, member)
            .await
            .unwrap();

        let err = service
            .get_member(fixture.organisation_id, member)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MemberNotFound));
    }

    #[tokio::test]
    async fn removal_by_peer_rank_is_denied() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let officer_position = store.add_position(
            fixture.organisation_id.0,
            "Officer",
            5,
            false,
            &[Permission::MemberRemove],
        );
        let one = UserId(Uuid::new_v4());
        let two = UserId(Uuid::new_v4());
        store.add_member_on_position(fixture.organisation_id.0, one.0, officer_position);
        store.add_member_on_position(fixture.organisation_id.0, two.0, officer_position);

        let err = service
            .remove_member(fixture.organisation_id, two, one)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));

        // The creator outranks the officer and holds MEMBER_REMOVE
        service
            .remove_member(fixture.organisation_id, two, fixture.creator)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn removing_an_absent_member_is_not_found() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let err = service
            .remove_member(
                fixture.organisation_id,
                UserId(Uuid::new_v4()),
                fixture.creator,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MemberNotFound));
    }

    #[tokio::test]
    async fn move_member_rejects_no_op_and_checks_permission() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let target = store.add_position(fixture.organisation_id.0, "Veteran", 3, false, &[]);
        let member = UserId(Uuid::new_v4());
        store.add_member_on_default(fixture.organisation_id.0, member.0);

        let err = service
            .move_member_to_position(
                member,
                fixture.default_position_id,
                fixture.default_position_id,
                fixture.creator,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        // A permissionless member may not move others
        let err = service
            .move_member_to_position(member, fixture.default_position_id, target, member)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));

        let moved = service
            .move_member_to_position(member, fixture.default_position_id, target, fixture.creator)
            .await
            .unwrap();
        assert_eq!(moved.position_id, target);
    }

    #[tokio::test]
    async fn move_member_fails_when_user_not_on_source_position() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let target = store.add_position(fixture.organisation_id.0, "Veteran", 3, false, &[]);
        let stranger = UserId(Uuid::new_v4());

        let err = service
            .move_member_to_position(stranger, fixture.default_position_id, target, fixture.creator)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MemberNotFound));
    }

    #[tokio::test]
    async fn member_listing_attaches_position_summaries() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let member = UserId(Uuid::new_v4());
        store.add_member_on_default(fixture.organisation_id.0, member.0);

        let profiles = service.list_members(fixture.organisation_id).await.unwrap();
        assert_eq!(profiles.len(), 2);
        let listed = profiles
            .iter()
            .find(|p| p.user_id == member)
            .expect("member must be listed");
        assert_eq!(listed.position.name, "Member");
    }
}
