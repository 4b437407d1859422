//! In-memory repository implementations for tests.
//!
//! Exposed to downstream crates through the `test-mocks` feature so API-level
//! tests can exercise the full service stack without a database.

use crate::common::RepositoryError;
use crate::directory::ports::{PartialUser, UserDirectory, UserId};
use crate::invitation::ports::{
    Invitation, InvitationRepository, InvitationStatus, NewInvitation,
};
use crate::member::ports::{Member, MemberRepository};
use crate::organisation::ports::{
    NewOrganisation, Organisation, OrganisationId, OrganisationRepository, OrganisationUpdate,
};
use crate::permission::Permission;
use crate::position::ports::{NewPosition, Position, PositionRepository, PositionUpdate};
use crate::position::CachedPositionResolver;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    organisations: Mutex<HashMap<Uuid, Organisation>>,
    positions: Mutex<HashMap<Uuid, Position>>,
    members: Mutex<Vec<Member>>,
    invitations: Mutex<HashMap<Uuid, Invitation>>,
    fail_invitation_insert: AtomicBool,
}

impl InMemoryStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn positions_of(&self, organisation_id: Uuid) -> Vec<Position> {
        self.positions
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.organisation_id.0 == organisation_id)
            .cloned()
            .collect()
    }

    pub fn members_of(&self, organisation_id: Uuid) -> Vec<Member> {
        self.members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.organisation_id.0 == organisation_id)
            .cloned()
            .collect()
    }

    pub fn member_position(&self, organisation_id: Uuid, user_id: Uuid) -> Option<Position> {
        let position_id = self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.organisation_id.0 == organisation_id && m.user_id.0 == user_id)
            .map(|m| m.position_id)?;
        self.positions.lock().unwrap().get(&position_id).cloned()
    }

    pub fn add_position(
        &self,
        organisation_id: Uuid,
        name: &str,
        rank: i32,
        is_default: bool,
        permissions: &[Permission],
    ) -> Uuid {
        let id = Uuid::new_v4();
        let mut positions = self.positions.lock().unwrap();
        if is_default {
            for position in positions.values_mut() {
                if position.organisation_id.0 == organisation_id {
                    position.is_default = false;
                }
            }
        }
        positions.insert(
            id,
            Position {
                id,
                organisation_id: OrganisationId(organisation_id),
                name: name.to_string(),
                rank,
                is_default,
                permissions: permissions.to_vec(),
            },
        );
        id
    }

    pub fn add_member_on_position(&self, organisation_id: Uuid, user_id: Uuid, position_id: Uuid) {
        self.members.lock().unwrap().push(Member {
            organisation_id: OrganisationId(organisation_id),
            user_id: UserId(user_id),
            position_id,
            member_since: Utc::now(),
        });
    }

    pub fn add_member_on_default(&self, organisation_id: Uuid, user_id: Uuid) {
        let default_id = self
            .positions
            .lock()
            .unwrap()
            .values()
            .find(|p| p.organisation_id.0 == organisation_id && p.is_default)
            .map(|p| p.id)
            .expect("organisation has no default position");
        self.add_member_on_position(organisation_id, user_id, default_id);
    }

    pub fn invitation_status(&self, invitation_id: Uuid) -> Option<InvitationStatus> {
        self.invitations
            .lock()
            .unwrap()
            .get(&invitation_id)
            .map(|i| i.status)
    }

    pub fn backdate_invitation(&self, invitation_id: Uuid, expires_at: DateTime<Utc>) {
        if let Some(invitation) = self.invitations.lock().unwrap().get_mut(&invitation_id) {
            invitation.expires_at = expires_at;
        }
    }

    /// Make the next invitation insert fail with a uniqueness violation, the
    /// way a concurrent creation racing past the pre-check would.
    pub fn fail_next_invitation_insert_with_conflict(&self) {
        self.fail_invitation_insert.store(true, Ordering::SeqCst);
    }

    fn member_count(&self, organisation_id: Uuid) -> i64 {
        self.members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.organisation_id.0 == organisation_id)
            .count() as i64
    }

    fn with_member_count(&self, mut organisation: Organisation) -> Organisation {
        organisation.member_count = self.member_count(organisation.id.0);
        organisation
    }
}

#[async_trait]
impl OrganisationRepository for InMemoryStore {
    async fn create(
        &self,
        organisation: NewOrganisation,
        creator_id: Uuid,
        creator_position: NewPosition,
        default_position: NewPosition,
    ) -> Result<Organisation> {
        {
            let organisations = self.organisations.lock().unwrap();
            if organisations
                .values()
                .any(|o| o.name == organisation.name || o.email == organisation.email)
            {
                return Err(RepositoryError::AlreadyExists.into());
            }
        }

        let now = Utc::now();
        let snapshot = Organisation {
            id: OrganisationId(organisation.id),
            name: organisation.name,
            email: organisation.email,
            description: organisation.description,
            avatar_url: organisation.avatar_url,
            public: organisation.public,
            creator_id: UserId(creator_id),
            member_count: 1,
            created_at: now,
            updated_at: now,
        };
        self.organisations
            .lock()
            .unwrap()
            .insert(organisation.id, snapshot.clone());

        for position in [creator_position.clone(), default_position] {
            self.positions.lock().unwrap().insert(
                position.id,
                Position {
                    id: position.id,
                    organisation_id: OrganisationId(position.organisation_id),
                    name: position.name,
                    rank: position.rank,
                    is_default: position.is_default,
                    permissions: position.permissions,
                },
            );
        }
        self.add_member_on_position(organisation.id, creator_id, creator_position.id);

        Ok(snapshot)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Organisation>> {
        let organisation = self.organisations.lock().unwrap().get(&id).cloned();
        Ok(organisation.map(|o| self.with_member_count(o)))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Organisation>> {
        let organisation = self
            .organisations
            .lock()
            .unwrap()
            .values()
            .find(|o| o.name == name)
            .cloned();
        Ok(organisation.map(|o| self.with_member_count(o)))
    }

    async fn update(&self, id: Uuid, update: OrganisationUpdate) -> Result<Option<Organisation>> {
        let mut organisations = self.organisations.lock().unwrap();

        if let Some(ref name) = update.name {
            if organisations.values().any(|o| o.id.0 != id && &o.name == name) {
                return Err(RepositoryError::AlreadyExists.into());
            }
        }
        if let Some(ref email) = update.email {
            if organisations.values().any(|o| o.id.0 != id && &o.email == email) {
                return Err(RepositoryError::AlreadyExists.into());
            }
        }

        let Some(organisation) = organisations.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            organisation.name = name;
        }
        if let Some(email) = update.email {
            organisation.email = email;
        }
        if let Some(description) = update.description {
            organisation.description = description;
        }
        if let Some(avatar_url) = update.avatar_url {
            organisation.avatar_url = Some(avatar_url);
        }
        if let Some(public) = update.public {
            organisation.public = public;
        }
        organisation.updated_at = Utc::now();
        let snapshot = organisation.clone();
        drop(organisations);
        Ok(Some(self.with_member_count(snapshot)))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let removed = self.organisations.lock().unwrap().remove(&id).is_some();
        if removed {
            self.positions
                .lock()
                .unwrap()
                .retain(|_, p| p.organisation_id.0 != id);
            self.members
                .lock()
                .unwrap()
                .retain(|m| m.organisation_id.0 != id);
            self.invitations
                .lock()
                .unwrap()
                .retain(|_, i| i.organisation_id.0 != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl PositionRepository for InMemoryStore {
    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Position>> {
        Ok(self.positions_of(organisation_id))
    }

    async fn get_by_id(&self, position_id: Uuid) -> Result<Option<Position>> {
        Ok(self.positions.lock().unwrap().get(&position_id).cloned())
    }

    async fn find_default(&self, organisation_id: Uuid) -> Result<Option<Position>> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .values()
            .find(|p| p.organisation_id.0 == organisation_id && p.is_default)
            .cloned())
    }

    async fn find_member_position(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Position>> {
        Ok(self.member_position(organisation_id, user_id))
    }

    async fn create(&self, position: NewPosition) -> Result<Position> {
        let mut positions = self.positions.lock().unwrap();
        if positions
            .values()
            .any(|p| p.organisation_id.0 == position.organisation_id && p.name == position.name)
        {
            return Err(RepositoryError::AlreadyExists.into());
        }
        if position.is_default {
            for existing in positions.values_mut() {
                if existing.organisation_id.0 == position.organisation_id {
                    existing.is_default = false;
                }
            }
        }
        let snapshot = Position {
            id: position.id,
            organisation_id: OrganisationId(position.organisation_id),
            name: position.name,
            rank: position.rank,
            is_default: position.is_default,
            permissions: position.permissions,
        };
        positions.insert(snapshot.id, snapshot.clone());
        Ok(snapshot)
    }

    async fn update(&self, position_id: Uuid, update: PositionUpdate) -> Result<Position> {
        let mut positions = self.positions.lock().unwrap();

        let organisation_id = positions
            .get(&position_id)
            .map(|p| p.organisation_id.0)
            .ok_or_else(|| anyhow!(RepositoryError::NotFound("position".to_string())))?;

        if positions.values().any(|p| {
            p.id != position_id
                && p.organisation_id.0 == organisation_id
                && p.name == update.name
        }) {
            return Err(RepositoryError::AlreadyExists.into());
        }

        if update.set_default {
            for existing in positions.values_mut() {
                if existing.organisation_id.0 == organisation_id {
                    existing.is_default = existing.id == position_id;
                }
            }
        }

        let position = positions.get_mut(&position_id).expect("checked above");
        position.name = update.name;
        position.rank = update.rank;
        position.permissions.extend(update.added);
        position.permissions.retain(|p| !update.removed.contains(p));
        Ok(position.clone())
    }

    async fn delete_with_migration(
        &self,
        position_id: Uuid,
        replacement_id: Uuid,
    ) -> Result<Vec<Member>> {
        let mut members = self.members.lock().unwrap();
        let mut migrated = Vec::new();
        for member in members.iter_mut() {
            if member.position_id == position_id {
                member.position_id = replacement_id;
                migrated.push(member.clone());
            }
        }
        drop(members);
        self.positions.lock().unwrap().remove(&position_id);
        Ok(migrated)
    }
}

#[async_trait]
impl MemberRepository for InMemoryStore {
    async fn get(&self, organisation_id: Uuid, user_id: Uuid) -> Result<Option<Member>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.organisation_id.0 == organisation_id && m.user_id.0 == user_id)
            .cloned())
    }

    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Member>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.organisation_id.0 == organisation_id)
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Member>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id.0 == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_position(&self, position_id: Uuid) -> Result<Vec<Member>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.position_id == position_id)
            .cloned()
            .collect())
    }

    async fn find_by_position_and_user(
        &self,
        position_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Member>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.position_id == position_id && m.user_id.0 == user_id)
            .cloned())
    }

    async fn create_from_invitation(
        &self,
        invitation_id: Uuid,
        organisation_id: Uuid,
        user_id: Uuid,
        position_id: Uuid,
    ) -> Result<Member> {
        {
            let members = self.members.lock().unwrap();
            if members
                .iter()
                .any(|m| m.organisation_id.0 == organisation_id && m.user_id.0 == user_id)
            {
                return Err(RepositoryError::AlreadyExists.into());
            }
        }

        let member = Member {
            organisation_id: OrganisationId(organisation_id),
            user_id: UserId(user_id),
            position_id,
            member_since: Utc::now(),
        };
        self.members.lock().unwrap().push(member.clone());
        if let Some(invitation) = self.invitations.lock().unwrap().get_mut(&invitation_id) {
            invitation.status = InvitationStatus::Accepted;
        }
        Ok(member)
    }

    async fn update_position(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
        position_id: Uuid,
    ) -> Result<Member> {
        let mut members = self.members.lock().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.organisation_id.0 == organisation_id && m.user_id.0 == user_id)
            .ok_or_else(|| anyhow!(RepositoryError::NotFound("member".to_string())))?;
        member.position_id = position_id;
        Ok(member.clone())
    }

    async fn delete(&self, organisation_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut members = self.members.lock().unwrap();
        let before = members.len();
        members.retain(|m| !(m.organisation_id.0 == organisation_id && m.user_id.0 == user_id));
        Ok(members.len() < before)
    }
}

#[async_trait]
impl InvitationRepository for InMemoryStore {
    async fn insert(&self, invitation: NewInvitation) -> Result<Invitation> {
        if self.fail_invitation_insert.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::AlreadyExists.into());
        }

        let mut invitations = self.invitations.lock().unwrap();
        if invitations.values().any(|i| {
            i.organisation_id.0 == invitation.organisation_id
                && i.email == invitation.email
                && i.status == InvitationStatus::Pending
        }) {
            return Err(RepositoryError::AlreadyExists.into());
        }

        let snapshot = Invitation {
            id: invitation.id,
            organisation_id: OrganisationId(invitation.organisation_id),
            user_id: invitation.user_id.map(UserId),
            email: invitation.email,
            token: invitation.token,
            status: InvitationStatus::Pending,
            created_at: Utc::now(),
            expires_at: invitation.expires_at,
        };
        invitations.insert(snapshot.id, snapshot.clone());
        Ok(snapshot)
    }

    async fn find_pending_by_token(&self, token: &str) -> Result<Option<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .find(|i| i.token == token && i.status == InvitationStatus::Pending)
            .cloned())
    }

    async fn find_pending(
        &self,
        organisation_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .find(|i| {
                i.organisation_id.0 == organisation_id
                    && i.email == email
                    && i.status == InvitationStatus::Pending
            })
            .cloned())
    }

    async fn list_by_organisation(
        &self,
        organisation_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|i| {
                i.organisation_id.0 == organisation_id
                    && status.map(|s| i.status == s).unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|i| {
                i.user_id == Some(UserId(user_id)) && status.map(|s| i.status == s).unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: InvitationStatus) -> Result<Invitation> {
        let mut invitations = self.invitations.lock().unwrap();
        let invitation = invitations
            .get_mut(&id)
            .ok_or_else(|| anyhow!(RepositoryError::NotFound("invitation".to_string())))?;
        invitation.status = status;
        Ok(invitation.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.invitations.lock().unwrap().remove(&id).is_some())
    }

    async fn expire_stale(&self) -> Result<u64> {
        let now = Utc::now();
        let mut expired = 0;
        for invitation in self.invitations.lock().unwrap().values_mut() {
            if invitation.status == InvitationStatus::Pending && invitation.expires_at <= now {
                invitation.status = InvitationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

/// Directory stub that knows a configurable set of users
#[derive(Default)]
pub struct StubDirectory {
    users: Mutex<HashMap<String, PartialUser>>,
}

impl StubDirectory {
    pub fn add_user(&self, email: &str) -> UserId {
        let user = self.user(email);
        user.id
    }

    pub fn user(&self, email: &str) -> PartialUser {
        let mut users = self.users.lock().unwrap();
        users
            .entry(email.to_string())
            .or_insert_with(|| PartialUser {
                id: UserId(Uuid::new_v4()),
                display_name: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
                avatar_url: None,
                last_seen: None,
            })
            .clone()
    }
}

#[async_trait]
impl UserDirectory for StubDirectory {
    async fn fetch_user_by_email(&self, email: &str) -> Option<PartialUser> {
        self.users.lock().unwrap().get(email).cloned()
    }

    async fn fetch_users_by_ids(&self, user_ids: &[UserId]) -> HashMap<UserId, PartialUser> {
        let users = self.users.lock().unwrap();
        user_ids
            .iter()
            .filter_map(|id| {
                users
                    .values()
                    .find(|u| u.id == *id)
                    .map(|u| (*id, u.clone()))
            })
            .collect()
    }
}

/// Directory that knows nobody; models the directory being unavailable
pub struct NullDirectory;

#[async_trait]
impl UserDirectory for NullDirectory {
    async fn fetch_user_by_email(&self, _email: &str) -> Option<PartialUser> {
        None
    }

    async fn fetch_users_by_ids(&self, _user_ids: &[UserId]) -> HashMap<UserId, PartialUser> {
        HashMap::new()
    }
}

/// A bootstrapped organisation the way the organisation service creates them:
/// an owner position with the full permission set held by the creator, and a
/// permissionless default position.
pub struct OrganisationFixture {
    pub organisation_id: OrganisationId,
    pub creator: UserId,
    pub owner_position_id: Uuid,
    pub default_position_id: Uuid,
}

impl OrganisationFixture {
    pub fn bootstrap(store: &Arc<InMemoryStore>) -> Self {
        let organisation_id = Uuid::new_v4();
        let creator = UserId(Uuid::new_v4());
        let now = Utc::now();

        store.organisations.lock().unwrap().insert(
            organisation_id,
            Organisation {
                id: OrganisationId(organisation_id),
                name: format!("org-{organisation_id}"),
                email: format!("{organisation_id}@example.test"),
                description: String::new(),
                avatar_url: None,
                public: false,
                creator_id: creator,
                member_count: 0,
                created_at: now,
                updated_at: now,
            },
        );

        let owner_position_id =
            store.add_position(organisation_id, "Owner", 100, false, &Permission::ALL);
        let default_position_id = store.add_position(organisation_id, "Member", 1, true, &[]);
        store.add_member_on_position(organisation_id, creator.0, owner_position_id);

        Self {
            organisation_id: OrganisationId(organisation_id),
            creator,
            owner_position_id,
            default_position_id,
        }
    }
}

pub fn test_resolver(store: &Arc<InMemoryStore>) -> Arc<CachedPositionResolver> {
    Arc::new(CachedPositionResolver::new(
        store.clone(),
        &config::CacheConfig::default(),
    ))
}
