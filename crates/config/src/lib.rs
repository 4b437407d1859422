//! Configuration loading for guildmaster: typed YAML sections with serde
//! defaults, probed from a handful of conventional paths, with environment
//! overrides for database credentials so secrets stay out of the file.

use std::path::Path;
use thiserror::Error;

pub mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found. Tried paths: {paths}")]
    FileNotFound { paths: String },

    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },
}

const CONFIG_PATHS: [&str; 3] = ["config/config.yaml", "config.yaml", "config/default.yaml"];

impl ApiConfig {
    /// Parse a specific YAML file, then apply environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ApiConfig = serde_yaml::from_str(&content)?;
        config.database.apply_env_overrides();
        Ok(config)
    }

    /// Load from the first conventional location that exists
    pub fn load() -> Result<Self, ConfigError> {
        CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
            .map(Self::load_from_file)
            .unwrap_or_else(|| {
                Err(ConfigError::FileNotFound {
                    paths: CONFIG_PATHS.join(", "),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_minimal_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database:\n  host: db.internal\n  password: secret\ndirectory:\n  base_url: http://colovia.internal"
        )
        .unwrap();

        let config = ApiConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.invitations.expiry_days, 7);
        assert_eq!(config.cache.position_ttl_secs, 21_600);
        assert_eq!(config.directory.base_url, "http://colovia.internal");
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server: [not, a, mapping]").unwrap();

        assert!(matches!(
            ApiConfig::load_from_file(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
