//! Booking service configuration.
//!
//! Configuration is loaded from environment variables. The database URL and
//! the room id key are redacted in Debug output.

use ring::hmac;
use ring::rand::SystemRandom;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default base URL for generated meeting rooms.
pub const DEFAULT_MEETING_URL_BASE: &str = "https://meet.jit.si";

/// Default database pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Upper bound for the database pool size.
pub const MAX_DB_MAX_CONNECTIONS: u32 = 100;

/// Default per-statement timeout applied to database connections.
pub const DEFAULT_DB_STATEMENT_TIMEOUT_SECONDS: u32 = 5;

/// Booking service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Base URL the generated meeting room id is appended to.
    pub meeting_url_base: String,

    /// Whether owners' published availability is enforced at booking time.
    pub enforce_owner_availability: bool,

    /// Maximum connections in the database pool.
    pub db_max_connections: u32,

    /// Statement timeout in seconds for database queries.
    pub db_statement_timeout_seconds: u32,

    /// Optional bind address for the Prometheus scrape endpoint.
    pub metrics_bind_address: Option<String>,

    /// Seconds to wait after a shutdown signal before closing connections.
    pub shutdown_drain_seconds: u64,

    /// HMAC key meeting room ids are derived under. Taken from
    /// `ROOM_ID_SECRET`, or generated per process when that is unset.
    pub room_id_key: hmac::Key,

    /// Whether `room_id_key` came from `ROOM_ID_SECRET`.
    pub room_id_key_configured: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("meeting_url_base", &self.meeting_url_base)
            .field("enforce_owner_availability", &self.enforce_owner_availability)
            .field("db_max_connections", &self.db_max_connections)
            .field(
                "db_statement_timeout_seconds",
                &self.db_statement_timeout_seconds,
            )
            .field("metrics_bind_address", &self.metrics_bind_address)
            .field("shutdown_drain_seconds", &self.shutdown_drain_seconds)
            .field("room_id_key", &"[REDACTED]")
            .field("room_id_key_configured", &self.room_id_key_configured)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let meeting_url_base = vars
            .get("MEETING_URL_BASE")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_MEETING_URL_BASE.to_string());

        if !(meeting_url_base.starts_with("https://") || meeting_url_base.starts_with("http://"))
        {
            return Err(ConfigError::InvalidValue {
                name: "MEETING_URL_BASE".to_string(),
                reason: format!("must be an http(s) URL, got '{}'", meeting_url_base),
            });
        }

        let enforce_owner_availability = match vars.get("ENFORCE_OWNER_AVAILABILITY") {
            Some(value) => parse_bool("ENFORCE_OWNER_AVAILABILITY", value)?,
            None => true,
        };

        let db_max_connections = match vars.get("DB_MAX_CONNECTIONS") {
            Some(value) => {
                let parsed: u32 = parse_number("DB_MAX_CONNECTIONS", value)?;
                if parsed == 0 || parsed > MAX_DB_MAX_CONNECTIONS {
                    return Err(ConfigError::InvalidValue {
                        name: "DB_MAX_CONNECTIONS".to_string(),
                        reason: format!(
                            "must be between 1 and {}, got {}",
                            MAX_DB_MAX_CONNECTIONS, parsed
                        ),
                    });
                }
                parsed
            }
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let db_statement_timeout_seconds = match vars.get("DB_STATEMENT_TIMEOUT_SECONDS") {
            Some(value) => parse_number("DB_STATEMENT_TIMEOUT_SECONDS", value)?,
            None => DEFAULT_DB_STATEMENT_TIMEOUT_SECONDS,
        };

        let metrics_bind_address = vars.get("METRICS_BIND_ADDRESS").cloned();

        let shutdown_drain_seconds = match vars.get("SHUTDOWN_DRAIN_SECONDS") {
            Some(value) => parse_number("SHUTDOWN_DRAIN_SECONDS", value)?,
            None => 0,
        };

        let (room_id_key, room_id_key_configured) = match vars.get("ROOM_ID_SECRET") {
            Some(secret) if !secret.is_empty() => {
                (hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()), true)
            }
            _ => {
                let key = hmac::Key::generate(hmac::HMAC_SHA256, &SystemRandom::new()).map_err(
                    |_| ConfigError::InvalidValue {
                        name: "ROOM_ID_SECRET".to_string(),
                        reason: "unset, and generating a random key failed".to_string(),
                    },
                )?;
                (key, false)
            }
        };

        Ok(Config {
            database_url,
            bind_address,
            meeting_url_base,
            enforce_owner_availability,
            db_max_connections,
            db_statement_timeout_seconds,
            metrics_bind_address,
            shutdown_drain_seconds,
            room_id_key,
            room_id_key_configured,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn parse_number<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("must be a valid integer, got '{}': {}", value, e),
    })
}
