use crate::member::ports::Member;
use crate::organisation::ports::OrganisationId;
use crate::permission::Permission;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ranked role within an organisation, with its permission set fully loaded.
///
/// Snapshots are immutable; permission changes go through the repository's
/// add/remove set operations and produce a fresh snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub organisation_id: OrganisationId,
    pub name: String,
    pub rank: i32,
    pub is_default: bool,
    pub permissions: Vec<Permission>,
}

impl Position {
    /// True iff this position's permission set contains `permission`
    pub fn holds(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Hierarchical permission check: the position must hold the permission
    /// AND strictly outrank the target. Equal rank is insufficient, so peers
    /// cannot act on each other.
    pub fn permits_over(&self, permission: Permission, target: &Position) -> bool {
        self.holds(permission) && self.rank > target.rank
    }
}

#[derive(Debug, Clone)]
pub struct NewPosition {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub name: String,
    pub rank: i32,
    pub is_default: bool,
    pub permissions: Vec<Permission>,
}

/// Update applied to a position in one transaction.
///
/// The permission change is carried as a diff (`added` / `removed`) and
/// applied as two set operations against the join table rather than a full
/// replace. When `set_default` is true the organisation's previous default is
/// cleared in the same transaction, so readers never observe zero or two
/// defaults.
#[derive(Debug, Clone)]
pub struct PositionUpdate {
    pub name: String,
    pub rank: i32,
    pub set_default: bool,
    pub added: Vec<Permission>,
    pub removed: Vec<Permission>,
}

#[async_trait]
pub trait PositionRepository: Send + Sync {
    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Position>>;

    async fn get_by_id(&self, position_id: Uuid) -> Result<Option<Position>>;

    async fn find_default(&self, organisation_id: Uuid) -> Result<Option<Position>>;

    /// Resolve the position (with permissions) held by a member of an
    /// organisation; `None` when the user is not a member.
    async fn find_member_position(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Position>>;

    /// Insert a position. When `is_default` is set, atomically clears the
    /// organisation's previous default first.
    async fn create(&self, position: NewPosition) -> Result<Position>;

    async fn update(&self, position_id: Uuid, update: PositionUpdate) -> Result<Position>;

    /// Bulk-reassign every member of `position_id` to `replacement_id` and
    /// delete the position, in one transaction. Returns the members that were
    /// migrated so their cache entries can be evicted.
    async fn delete_with_migration(
        &self,
        position_id: Uuid,
        replacement_id: Uuid,
    ) -> Result<Vec<Member>>;
}
