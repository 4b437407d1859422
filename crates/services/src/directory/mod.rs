use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

pub mod ports;
pub use ports::*;

/// HTTP client onto the user directory service (colovia).
///
/// All lookups degrade to absent/empty on failure; membership and invitation
/// flows must keep working when the directory is down, minus profile
/// enrichment.
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpUserDirectory {
    pub fn from_config(config: &config::DirectoryConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self { client, base_url })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn fetch_user_by_email(&self, email: &str) -> Option<PartialUser> {
        let url = match self.base_url.join(&format!("user/email/{email}")) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Failed to build user directory URL");
                return None;
            }
        };

        match self.get_json::<Option<PartialUser>>(url).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Failed to fetch user profile from directory");
                None
            }
        }
    }

    async fn fetch_users_by_ids(&self, user_ids: &[UserId]) -> HashMap<UserId, PartialUser> {
        if user_ids.is_empty() {
            return HashMap::new();
        }

        let ids = user_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut url = match self.base_url.join("user/display/ids") {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Failed to build user directory URL");
                return HashMap::new();
            }
        };
        url.query_pairs_mut().append_pair("userIds", &ids);

        match self.get_json::<HashMap<UserId, PartialUser>>(url).await {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "Failed to fetch user profiles from directory");
                HashMap::new()
            }
        }
    }
}
