//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use wager_ledger::{LedgerPolicy, db::DatabaseConfig, identity::verifier::DEFAULT_AUDIENCE};

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Token verification configuration
    pub auth: AuthConfig,
    /// Accounting policy handed to the ledger
    pub ledger: LedgerPolicy,
    /// Prometheus exporter address, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Seconds between operator rollup refreshes
    pub rollup_interval_secs: u64,
}

/// Identity provider configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider (required)
    pub jwt_secret: String,
    /// Required `aud` claim, `None` disables the check
    pub audience: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND")?.unwrap_or(default_bind()),
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(database_url) = database_url_override {
            database.database_url = database_url;
        }

        let jwt_secret =
            std::env::var("AUTH_JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
                var: "AUTH_JWT_SECRET".to_string(),
                hint: "Copy the JWT secret from the identity provider settings".to_string(),
            })?;

        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "AUTH_JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        // An empty AUTH_AUDIENCE turns the audience check off
        let audience = match std::env::var("AUTH_AUDIENCE") {
            Ok(aud) if aud.trim().is_empty() => None,
            Ok(aud) => Some(aud.trim().to_string()),
            Err(_) => Some(DEFAULT_AUDIENCE.to_string()),
        };

        Ok(ServerConfig {
            bind,
            database,
            auth: AuthConfig {
                jwt_secret,
                audience,
            },
            ledger: LedgerPolicy::from_env(),
            metrics_bind: parse_addr("METRICS_BIND")?,
            rollup_interval_secs: parse_env_or("ROLLUP_INTERVAL_SECS", 60),
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.bonus_wagering_multiplier < 0 {
            return Err(ConfigError::Invalid {
                var: "BONUS_WAGERING_MULTIPLIER".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.ledger.deposit_wagering_multiplier < 0 {
            return Err(ConfigError::Invalid {
                var: "DEPOSIT_WAGERING_MULTIPLIER".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.rollup_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "ROLLUP_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server bind address ({})", self.bind),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Parse an optional socket address, rejecting malformed values
fn parse_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var: key.to_string(),
                reason: format!("{value:?} is not an IP:PORT address"),
            }),
        Err(_) => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
