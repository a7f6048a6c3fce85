// ABOUTME: Server configuration from environment variables
// ABOUTME: LEADFLOW_* variables with sensible local-dev defaults

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 4820;
pub const DEFAULT_DB_PATH: &str = "leadflow.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port '{0}': must be a number between 1 and 65535")]
    InvalidPort(String),
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cors_origin: String,
    pub database_path: PathBuf,
    /// Bootstrap token for the first admin user, applied only when the
    /// users table is empty.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var("LEADFLOW_PORT").ok(),
            std::env::var("LEADFLOW_CORS_ORIGIN").ok(),
            std::env::var("LEADFLOW_DB_PATH").ok(),
            std::env::var("LEADFLOW_ADMIN_TOKEN").ok(),
        )
    }

    fn from_vars(
        port: Option<String>,
        cors_origin: Option<String>,
        database_path: Option<String>,
        admin_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let port = match port {
            Some(raw) => match raw.parse::<u16>() {
                Ok(0) | Err(_) => return Err(ConfigError::InvalidPort(raw)),
                Ok(port) => port,
            },
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            cors_origin: cors_origin.unwrap_or_else(|| "*".to_string()),
            database_path: PathBuf::from(
                database_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            ),
            admin_token: admin_token.filter(|t| !t.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_vars(None, None, None, None).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cors_origin, "*");
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DB_PATH));
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn explicit_values_win() {
        let config = Config::from_vars(
            Some("8080".to_string()),
            Some("http://localhost:5173".to_string()),
            Some("/var/lib/leadflow/data.db".to_string()),
            Some("secret".to_string()),
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origin, "http://localhost:5173");
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn bad_ports_are_rejected() {
        assert!(Config::from_vars(Some("not-a-port".to_string()), None, None, None).is_err());
        assert!(Config::from_vars(Some("0".to_string()), None, None, None).is_err());
        assert!(Config::from_vars(Some("70000".to_string()), None, None, None).is_err());
    }

    #[test]
    fn empty_admin_token_counts_as_unset() {
        let config = Config::from_vars(None, None, None, Some(String::new())).unwrap();
        assert!(config.admin_token.is_none());
    }
}
