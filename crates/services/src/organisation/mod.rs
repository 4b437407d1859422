use crate::directory::ports::UserId;
use crate::error::ServiceError;
use crate::permission::Permission;
use crate::position::ports::NewPosition;
use crate::position::CachedPositionResolver;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub mod ports;
pub use ports::*;

/// Rank given to the creator's bootstrap position; deliberately far above
/// anything the UI creates so the creator outranks every later position.
const CREATOR_POSITION_RANK: i32 = 100;
const DEFAULT_POSITION_RANK: i32 = 1;

pub struct OrganisationService {
    repository: Arc<dyn OrganisationRepository>,
    resolver: Arc<CachedPositionResolver>,
    cache: Cache<Uuid, Arc<Organisation>>,
}

impl OrganisationService {
    pub fn new(
        repository: Arc<dyn OrganisationRepository>,
        resolver: Arc<CachedPositionResolver>,
        cache_config: &config::CacheConfig,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_config.max_capacity)
            .time_to_live(Duration::from_secs(cache_config.organisation_ttl_secs))
            .build();
        Self {
            repository,
            resolver,
            cache,
        }
    }

    /// Get an organisation by ID, cache-aside
    pub async fn get_organisation(
        &self,
        id: OrganisationId,
    ) -> Result<Arc<Organisation>, ServiceError> {
        if let Some(organisation) = self.cache.get(&id.0).await {
            return Ok(organisation);
        }

        let organisation = self
            .repository
            .get_by_id(id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to get organisation", e))?
            .ok_or(ServiceError::OrganisationNotFound)?;

        let organisation = Arc::new(organisation);
        self.cache.insert(id.0, organisation.clone()).await;
        Ok(organisation)
    }

    pub async fn get_organisation_by_name(
        &self,
        name: &str,
    ) -> Result<Organisation, ServiceError> {
        self.repository
            .get_by_name(name)
            .await
            .map_err(|e| ServiceError::internal("Failed to get organisation by name", e))?
            .ok_or(ServiceError::OrganisationNotFound)
    }

    /// Create a new organisation.
    ///
    /// Bootstraps the position structure in the same transaction: an owner
    /// position holding every permission (assigned to the creator) and a
    /// default position that invitation acceptance will hand to new members.
    pub async fn create_organisation(
        &self,
        name: String,
        email: String,
        description: String,
        avatar_url: Option<String>,
        public: bool,
        creator_id: UserId,
    ) -> Result<Organisation, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Organisation name cannot be empty".to_string(),
            ));
        }
        if email.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Organisation email cannot be empty".to_string(),
            ));
        }

        let organisation_id = Uuid::new_v4();
        let organisation = NewOrganisation {
            id: organisation_id,
            name,
            email,
            description,
            avatar_url,
            public,
        };
        let creator_position = NewPosition {
            id: Uuid::new_v4(),
            organisation_id,
            name: "Owner".to_string(),
            rank: CREATOR_POSITION_RANK,
            is_default: false,
            permissions: Permission::ALL.to_vec(),
        };
        let default_position = NewPosition {
            id: Uuid::new_v4(),
            organisation_id,
            name: "Member".to_string(),
            rank: DEFAULT_POSITION_RANK,
            is_default: true,
            permissions: Vec::new(),
        };

        debug!(organisation = %organisation_id, creator = %creator_id, "Creating organisation");

        self.repository
            .create(
                organisation,
                creator_id.0,
                creator_position,
                default_position,
            )
            .await
            .map_err(|e| {
                if crate::common::is_unique_violation(&e) {
                    ServiceError::Conflict(
                        "An organisation with this name or email already exists".to_string(),
                    )
                } else {
                    ServiceError::internal("Failed to create organisation", e)
                }
            })
    }

    /// Update an organisation; requires ORGANISATION_EDIT
    pub async fn update_organisation(
        &self,
        id: OrganisationId,
        update: OrganisationUpdate,
        requester_id: UserId,
    ) -> Result<Organisation, ServiceError> {
        let requester_position = self.resolver.resolve(id, requester_id).await?;
        if !requester_position.holds(Permission::OrganisationEdit) {
            return Err(ServiceError::PermissionDenied(
                "User does not have permission to update the organisation".to_string(),
            ));
        }

        if let Some(ref name) = update.name {
            if name.trim().is_empty() {
                return Err(ServiceError::InvalidArgument(
                    "Organisation name cannot be empty".to_string(),
                ));
            }
        }

        let organisation = self
            .repository
            .update(id.0, update)
            .await
            .map_err(|e| {
                if crate::common::is_unique_violation(&e) {
                    ServiceError::Conflict(
                        "An organisation with this name or email already exists".to_string(),
                    )
                } else {
                    ServiceError::internal("Failed to update organisation", e)
                }
            })?
            .ok_or(ServiceError::OrganisationNotFound)?;

        self.cache.invalidate(&id.0).await;
        Ok(organisation)
    }

    /// Delete an organisation; requires ORGANISATION_DELETE
    pub async fn delete_organisation(
        &self,
        id: OrganisationId,
        requester_id: UserId,
    ) -> Result<(), ServiceError> {
        let requester_position = self.resolver.resolve(id, requester_id).await?;
        if !requester_position.holds(Permission::OrganisationDelete) {
            return Err(ServiceError::PermissionDenied(
                "User does not have permission to delete the organisation".to_string(),
            ));
        }

        let deleted = self
            .repository
            .delete(id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to delete organisation", e))?;
        if !deleted {
            return Err(ServiceError::OrganisationNotFound);
        }

        self.cache.invalidate(&id.0).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{test_resolver, InMemoryStore};

    fn service(store: &Arc<InMemoryStore>) -> OrganisationService {
        OrganisationService::new(
            store.clone(),
            test_resolver(store),
            &config::CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn create_bootstraps_default_position_and_creator_membership() {
        let store = InMemoryStore::shared();
        let service = service(&store);
        let creator = UserId(Uuid::new_v4());

        let organisation = service
            .create_organisation(
                "Acme".to_string(),
                "ops@acme.test".to_string(),
                "Acme Corp".to_string(),
                None,
                true,
                creator,
            )
            .await
            .unwrap();

        // Exactly one default position exists and it is not the creator's
        let positions = store.positions_of(organisation.id.0);
        let defaults: Vec<_> = positions.iter().filter(|p| p.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert!(defaults[0].permissions.is_empty());

        let creator_position = store
            .member_position(organisation.id.0, creator.0)
            .expect("creator must hold a membership");
        assert!(!creator_position.is_default);
        assert!(creator_position.holds(Permission::OrganisationDelete));
        assert!(creator_position.rank > defaults[0].rank);
    }

    #[tokio::test]
    async fn get_organisation_misses_map_to_not_found() {
        let store = InMemoryStore::shared();
        let service = service(&store);

        let err = service
            .get_organisation(OrganisationId(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::OrganisationNotFound));
    }

    #[tokio::test]
    async fn update_requires_organisation_edit_permission() {
        let store = InMemoryStore::shared();
        let service = service(&store);
        let creator = UserId(Uuid::new_v4());

        let organisation = service
            .create_organisation(
                "Acme".to_string(),
                "ops@acme.test".to_string(),
                String::new(),
                None,
                false,
                creator,
            )
            .await
            .unwrap();

        // A member on the (permissionless) default position cannot edit
        let bystander = UserId(Uuid::new_v4());
        store.add_member_on_default(organisation.id.0, bystander.0);

        let err = service
            .update_organisation(
                organisation.id,
                OrganisationUpdate {
                    description: Some("new".to_string()),
                    ..Default::default()
                },
                bystander,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));

        // The creator can
        let updated = service
            .update_organisation(
                organisation.id,
                OrganisationUpdate {
                    description: Some("new".to_string()),
                    ..Default::default()
                },
                creator,
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "new");
    }
}
