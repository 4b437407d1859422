use crate::directory::ports::UserId;
use crate::error::ServiceError;
use crate::member::ports::MemberRepository;
use crate::organisation::ports::OrganisationId;
use crate::permission::Permission;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

mod cache;
pub mod ports;
pub use cache::CachedPositionResolver;
pub use ports::*;

/// Requested shape of a position, used for both creation and update
#[derive(Debug, Clone)]
pub struct PositionDraft {
    pub name: String,
    pub rank: i32,
    pub is_default: bool,
    pub permissions: Vec<Permission>,
}

pub struct PositionService {
    positions: Arc<dyn PositionRepository>,
    members: Arc<dyn MemberRepository>,
    resolver: Arc<CachedPositionResolver>,
}

impl PositionService {
    pub fn new(
        positions: Arc<dyn PositionRepository>,
        members: Arc<dyn MemberRepository>,
        resolver: Arc<CachedPositionResolver>,
    ) -> Self {
        Self {
            positions,
            members,
            resolver,
        }
    }

    pub async fn list_positions(
        &self,
        organisation_id: OrganisationId,
    ) -> Result<Vec<Position>, ServiceError> {
        self.positions
            .list_by_organisation(organisation_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to list positions", e))
    }

    pub async fn get_position(&self, position_id: Uuid) -> Result<Position, ServiceError> {
        self.positions
            .get_by_id(position_id)
            .await
            .map_err(|e| ServiceError::internal("Failed to get position", e))?
            .ok_or(ServiceError::PositionNotFound)
    }

    /// The position new members receive on invitation acceptance.
    /// Every well-formed organisation has exactly one.
    pub async fn get_default_position(
        &self,
        organisation_id: OrganisationId,
    ) -> Result<Position, ServiceError> {
        self.positions
            .find_default(organisation_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to get default position", e))?
            .ok_or(ServiceError::PositionNotFound)
    }

    /// Create a new position; requires ROLE_CREATE
    pub async fn create_position(
        &self,
        organisation_id: OrganisationId,
        draft: PositionDraft,
        requester_id: UserId,
    ) -> Result<Position, ServiceError> {
        let requester_position = self.resolver.resolve(organisation_id, requester_id).await?;
        if !requester_position.holds(Permission::RoleCreate) {
            return Err(ServiceError::PermissionDenied(
                "User does not have permission to create a new position".to_string(),
            ));
        }

        if draft.name.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Position name cannot be empty".to_string(),
            ));
        }

        debug!(organisation = %organisation_id, name = %draft.name, "Creating position");

        self.positions
            .create(NewPosition {
                id: Uuid::new_v4(),
                organisation_id: organisation_id.0,
                name: draft.name,
                rank: draft.rank,
                is_default: draft.is_default,
                permissions: draft.permissions,
            })
            .await
            .map_err(|e| {
                if crate::common::is_unique_violation(&e) {
                    ServiceError::Conflict(
                        "A position with this name already exists in the organisation".to_string(),
                    )
                } else {
                    ServiceError::internal("Failed to create position", e)
                }
            })
    }

    /// Update a position; requires ROLE_UPDATE.
    ///
    /// The permission set is updated as a diff against the current snapshot,
    /// and the cache entry of every member currently on the position is
    /// evicted once the write commits.
    pub async fn update_position(
        &self,
        position_id: Uuid,
        draft: PositionDraft,
        requester_id: UserId,
    ) -> Result<Position, ServiceError> {
        let current = self.get_position(position_id).await?;

        let requester_position = self
            .resolver
            .resolve(current.organisation_id, requester_id)
            .await?;
        if !requester_position.holds(Permission::RoleUpdate) {
            return Err(ServiceError::PermissionDenied(
                "User does not have permission to update a position".to_string(),
            ));
        }

        // Default reassignment must go through designating another position
        // as default, which clears this flag atomically.
        if current.is_default && !draft.is_default {
            return Err(ServiceError::InvalidArgument(
                "Cannot remove default flag from default position".to_string(),
            ));
        }

        let (added, removed) = diff_permissions(&current.permissions, &draft.permissions);

        let updated = self
            .positions
            .update(
                position_id,
                PositionUpdate {
                    name: draft.name,
                    rank: draft.rank,
                    set_default: draft.is_default,
                    added,
                    removed,
                },
            )
            .await
            .map_err(|e| {
                if crate::common::is_unique_violation(&e) {
                    ServiceError::Conflict(
                        "A position with this name already exists in the organisation".to_string(),
                    )
                } else {
                    ServiceError::internal("Failed to update position", e)
                }
            })?;

        self.evict_position_members(position_id).await;
        Ok(updated)
    }

    /// Remove a position, migrating its members to a replacement position in
    /// the same organisation; requires ROLE_DELETE.
    pub async fn remove_position(
        &self,
        position_id: Uuid,
        replacement_id: Uuid,
        requester_id: UserId,
    ) -> Result<(), ServiceError> {
        if position_id == replacement_id {
            return Err(ServiceError::InvalidArgument(
                "Replacement position must differ from the position being removed".to_string(),
            ));
        }

        let replacement = self.get_position(replacement_id).await?;

        let requester_position = self
            .resolver
            .resolve(replacement.organisation_id, requester_id)
            .await?;
        if !requester_position.holds(Permission::RoleDelete) {
            return Err(ServiceError::PermissionDenied(
                "User does not have permission to delete a position".to_string(),
            ));
        }

        let target = self.get_position(position_id).await?;
        if target.organisation_id != replacement.organisation_id {
            return Err(ServiceError::InvalidArgument(
                "Replacement position must belong to the same organisation".to_string(),
            ));
        }
        if target.is_default {
            return Err(ServiceError::InvalidArgument(
                "Cannot delete the default position; designate another default first".to_string(),
            ));
        }

        debug!(position = %position_id, replacement = %replacement_id, "Removing position");

        let migrated = self
            .positions
            .delete_with_migration(position_id, replacement_id)
            .await
            .map_err(|e| ServiceError::internal("Failed to remove position", e))?;

        self.resolver.evict_members(&migrated).await;
        Ok(())
    }

    /// Evict the cached position of every member currently on `position_id`.
    /// Best-effort: a failed member listing leaves stale entries to age out
    /// via TTL and must not fail the caller's write.
    async fn evict_position_members(&self, position_id: Uuid) {
        match self.members.list_by_position(position_id).await {
            Ok(members) => self.resolver.evict_members(&members).await,
            Err(e) => {
                warn!(position = %position_id, error = %e,
                    "Failed to enumerate position members for cache eviction");
            }
        }
    }
}

/// Permission-set diff between the stored snapshot and the requested state:
/// (added = requested − current, removed = current − requested)
fn diff_permissions(
    current: &[Permission],
    requested: &[Permission],
) -> (Vec<Permission>, Vec<Permission>) {
    let added = requested
        .iter()
        .copied()
        .filter(|p| !current.contains(p))
        .collect();
    let removed = current
        .iter()
        .copied()
        .filter(|p| !requested.contains(p))
        .collect();
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{test_resolver, InMemoryStore, OrganisationFixture};

    fn service(store: &Arc<InMemoryStore>) -> PositionService {
        PositionService::new(store.clone(), store.clone(), test_resolver(store))
    }

    fn draft(name: &str, rank: i32, is_default: bool, permissions: &[Permission]) -> PositionDraft {
        PositionDraft {
            name: name.to_string(),
            rank,
            is_default,
            permissions: permissions.to_vec(),
        }
    }

    #[tokio::test]
    async fn permission_checks_compare_rank_strictly() {
        let low = Position {
            id: Uuid::new_v4(),
            organisation_id: OrganisationId(Uuid::new_v4()),
            name: "Member".to_string(),
            rank: 1,
            is_default: true,
            permissions: vec![],
        };
        let mut peer = low.clone();
        peer.rank = 5;
        peer.permissions = vec![Permission::MemberRemove];
        let mut senior = peer.clone();
        senior.rank = 9;

        assert!(peer.holds(Permission::MemberRemove));
        assert!(peer.permits_over(Permission::MemberRemove, &low));
        // Equal rank is insufficient even with the permission held
        assert!(!peer.permits_over(Permission::MemberRemove, &peer.clone()));
        assert!(!peer.permits_over(Permission::MemberRemove, &senior));
        // Holding no permission fails regardless of rank
        assert!(!senior.permits_over(Permission::MemberInvite, &low));
    }

    #[tokio::test]
    async fn create_position_requires_role_create() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let outsider = UserId(Uuid::new_v4());
        store.add_member_on_default(fixture.organisation_id.0, outsider.0);

        let err = service
            .create_position(fixture.organisation_id, draft("Officer", 5, false, &[]), outsider)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));

        let position = service
            .create_position(
                fixture.organisation_id,
                draft("Officer", 5, false, &[Permission::MemberInvite]),
                fixture.creator,
            )
            .await
            .unwrap();
        assert_eq!(position.name, "Officer");
        assert_eq!(position.permissions, vec![Permission::MemberInvite]);
    }

    #[tokio::test]
    async fn creating_a_new_default_clears_the_previous_one() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let replacement = service
            .create_position(
                fixture.organisation_id,
                draft("Recruit", 0, true, &[]),
                fixture.creator,
            )
            .await
            .unwrap();
        assert!(replacement.is_default);

        let defaults: Vec<Position> = store
            .positions_of(fixture.organisation_id.0)
            .into_iter()
            .filter(|p| p.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, replacement.id);
    }

    #[tokio::test]
    async fn update_cannot_unset_the_default_flag_directly() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let err = service
            .update_position(
                fixture.default_position_id,
                draft("Member", 1, false, &[]),
                fixture.creator,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("default flag")));
    }

    #[tokio::test]
    async fn update_applies_permission_diff_and_round_trips() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let position = service
            .create_position(
                fixture.organisation_id,
                draft(
                    "Officer",
                    5,
                    false,
                    &[Permission::MemberInvite, Permission::MemberRemove],
                ),
                fixture.creator,
            )
            .await
            .unwrap();

        let updated = service
            .update_position(
                position.id,
                draft(
                    "Officer",
                    6,
                    false,
                    &[Permission::MemberRemove, Permission::RoleUpdate],
                ),
                fixture.creator,
            )
            .await
            .unwrap();

        assert_eq!(updated.rank, 6);
        let mut permissions = updated.permissions.clone();
        permissions.sort_by_key(|p| p.code());
        assert_eq!(
            permissions,
            vec![Permission::MemberRemove, Permission::RoleUpdate]
        );

        // Read back through the store; order-independent set equality
        let stored = service.get_position(position.id).await.unwrap();
        let mut stored_permissions = stored.permissions;
        stored_permissions.sort_by_key(|p| p.code());
        assert_eq!(stored_permissions, permissions);
    }

    #[tokio::test]
    async fn update_evicts_cached_positions_of_all_members() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let resolver = test_resolver(&store);
        let service = PositionService::new(store.clone(), store.clone(), resolver.clone());

        let member = UserId(Uuid::new_v4());
        store.add_member_on_default(fixture.organisation_id.0, member.0);

        // Prime the cache
        let before = resolver.resolve(fixture.organisation_id, member).await.unwrap();
        assert!(!before.holds(Permission::SurveyCreate));

        service
            .update_position(
                fixture.default_position_id,
                draft("Member", 1, true, &[Permission::SurveyCreate]),
                fixture.creator,
            )
            .await
            .unwrap();

        let after = resolver.resolve(fixture.organisation_id, member).await.unwrap();
        assert!(after.holds(Permission::SurveyCreate));
    }

    #[tokio::test]
    async fn remove_position_migrates_members_to_replacement() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let doomed = service
            .create_position(
                fixture.organisation_id,
                draft("Temp", 3, false, &[]),
                fixture.creator,
            )
            .await
            .unwrap();
        let replacement = service
            .create_position(
                fixture.organisation_id,
                draft("Veteran", 4, false, &[]),
                fixture.creator,
            )
            .await
            .unwrap();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.add_member_on_position(fixture.organisation_id.0, a, doomed.id);
        store.add_member_on_position(fixture.organisation_id.0, b, replacement.id);

        service
            .remove_position(doomed.id, replacement.id, fixture.creator)
            .await
            .unwrap();

        assert!(service.get_position(doomed.id).await.is_err());
        for user in [a, b] {
            let position = store
                .member_position(fixture.organisation_id.0, user)
                .unwrap();
            assert_eq!(position.id, replacement.id);
        }
    }

    #[tokio::test]
    async fn remove_position_rejects_the_current_default() {
        let store = InMemoryStore::shared();
        let fixture = OrganisationFixture::bootstrap(&store);
        let service = service(&store);

        let replacement = service
            .create_position(
                fixture.organisation_id,
                draft("Veteran", 4, false, &[]),
                fixture.creator,
            )
            .await
            .unwrap();

        let err = service
            .remove_position(fixture.default_position_id, replacement.id, fixture.creator)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(msg)
            if msg.contains("default position")));
    }

    #[test]
    fn permission_diff_is_symmetric_difference() {
        let current = vec![Permission::MemberInvite, Permission::MemberRemove];
        let requested = vec![Permission::MemberRemove, Permission::RoleCreate];
        let (added, removed) = diff_permissions(&current, &requested);
        assert_eq!(added, vec![Permission::RoleCreate]);
        assert_eq!(removed, vec![Permission::MemberInvite]);
    }
}
