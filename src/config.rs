//! Environment-based configuration.

use crate::error::ConfigError;

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: usize,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

/// Top-level service configuration, assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from environment variables (after `dotenvy` has
    /// had a chance to populate them).
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;

        let pool_size = match std::env::var("DATABASE_POOL_SIZE") {
            Ok(v) => v.parse::<usize>().map_err(|e| ConfigError::Invalid {
                var: "DATABASE_POOL_SIZE",
                reason: e.to_string(),
            })?,
            Err(_) => 16,
        };

        let host = std::env::var("HTTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = match std::env::var("HTTP_PORT") {
            Ok(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "HTTP_PORT",
                reason: e.to_string(),
            })?,
            Err(_) => 8080,
        };

        Ok(Self {
            database: DatabaseConfig { url, pool_size },
            http: HttpConfig { host, port },
        })
    }
}
