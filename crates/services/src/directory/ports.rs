use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        UserId(uuid)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The slice of a user profile the directory service exposes to peers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialUser {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Lookup port onto the external user directory.
///
/// Both lookups are best-effort: implementations degrade to absent/empty on
/// any transport failure rather than surfacing an error, and log the failure.
/// Callers that need a profile to exist treat `None` as a domain condition.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_user_by_email(&self, email: &str) -> Option<PartialUser>;

    async fn fetch_users_by_ids(&self, user_ids: &[UserId]) -> HashMap<UserId, PartialUser>;
}
