use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub invitations: InvitationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty", "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Module-specific log levels appended to the env filter
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            modules: HashMap::new(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_name")]
    pub database: String,
    #[serde(default = "default_db_user")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: usize,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "guildmaster".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_max_connections() -> usize {
    20
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            database: default_db_name(),
            username: default_db_user(),
            password: String::new(),
            max_connections: default_db_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Create a connection URL for this database configuration
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Environment variables take precedence over file-based values so that
    /// credentials never have to live in the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("DATABASE_HOST") {
            self.host = host;
        }
        if let Some(port) = env::var("DATABASE_PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Ok(database) = env::var("DATABASE_NAME") {
            self.database = database;
        }
        if let Ok(username) = env::var("DATABASE_USERNAME") {
            self.username = username;
        }
        if let Ok(password) = env::var("DATABASE_PASSWORD") {
            self.password = password;
        }
        if let Some(max) = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.max_connections = max;
        }
    }
}

/// Cache configuration for the position and organisation caches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for resolved (organisation, user) position entries.
    /// Hours-scale: position/permission assignments change rarely and every
    /// mutation path evicts explicitly.
    #[serde(default = "default_position_ttl_secs")]
    pub position_ttl_secs: u64,
    #[serde(default = "default_organisation_ttl_secs")]
    pub organisation_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

fn default_position_ttl_secs() -> u64 {
    21_600 // 6 hours
}

fn default_organisation_ttl_secs() -> u64 {
    300
}

fn default_cache_capacity() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            position_ttl_secs: default_position_ttl_secs(),
            organisation_ttl_secs: default_organisation_ttl_secs(),
            max_capacity: default_cache_capacity(),
        }
    }
}

/// Connection settings for the external user directory (colovia)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_directory_url")]
    pub base_url: String,
    #[serde(default = "default_directory_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_directory_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_directory_timeout_secs() -> u64 {
    10
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_directory_url(),
            timeout_secs: default_directory_timeout_secs(),
        }
    }
}

/// Invitation lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationConfig {
    #[serde(default = "default_invite_expiry_days")]
    pub expiry_days: i64,
    /// Interval of the background sweep that expires stale pending invites
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_invite_expiry_days() -> i64 {
    7
}

fn default_sweep_interval_secs() -> u64 {
    3_600
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            expiry_days: default_invite_expiry_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}
