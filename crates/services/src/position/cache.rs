use crate::directory::ports::UserId;
use crate::error::ServiceError;
use crate::member::ports::Member;
use crate::organisation::ports::OrganisationId;
use crate::position::ports::{Position, PositionRepository};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Cache-aside resolver for "which position (with permissions) does this user
/// hold in this organisation".
///
/// Every permission check in the service goes through here, so entries are
/// TTL-bounded on an hours scale and every mutation path that changes a
/// member's effective permissions evicts the affected keys explicitly after
/// the underlying write commits. Entries are never updated in place; a read
/// after eviction simply repopulates from the store.
pub struct CachedPositionResolver {
    positions: Arc<dyn PositionRepository>,
    cache: Cache<(Uuid, Uuid), Arc<Position>>,
}

impl CachedPositionResolver {
    pub fn new(positions: Arc<dyn PositionRepository>, cache_config: &config::CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_config.max_capacity)
            .time_to_live(Duration::from_secs(cache_config.position_ttl_secs))
            .build();
        Self { positions, cache }
    }

    /// Resolve a member's position, consulting the cache first
    pub async fn resolve(
        &self,
        organisation_id: OrganisationId,
        user_id: UserId,
    ) -> Result<Arc<Position>, ServiceError> {
        let key = (organisation_id.0, user_id.0);
        if let Some(position) = self.cache.get(&key).await {
            return Ok(position);
        }

        let position = self
            .positions
            .find_member_position(organisation_id.0, user_id.0)
            .await
            .map_err(|e| ServiceError::internal("Failed to resolve member position", e))?
            .ok_or(ServiceError::MemberNotFound)?;

        let position = Arc::new(position);
        self.cache.insert(key, position.clone()).await;
        Ok(position)
    }

    /// Evict a single member's entry
    pub async fn evict(&self, organisation_id: OrganisationId, user_id: UserId) {
        self.cache.invalidate(&(organisation_id.0, user_id.0)).await;
    }

    /// Evict the entries of every listed member; used when a position's
    /// permission set or rank changes and the cached authorization state of
    /// all its members goes stale at once.
    pub async fn evict_members(&self, members: &[Member]) {
        for member in members {
            self.evict(member.organisation_id, member.user_id).await;
        }
    }
}
