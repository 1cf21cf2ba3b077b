//! Environment-driven configuration for the server binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://diecast.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MEDIA_ROOT: &str = "media";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddress { var: &'static str, value: String },
    #[error("{var} must be a positive integer, got {value}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must be true or false, got {value}")]
    InvalidFlag { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// Runtime settings for the collection server
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub admin_username: String,
    /// `None` disables login entirely, unless a hash is given
    pub admin_password: Option<String>,
    /// Pre-computed argon2 PHC string; takes precedence over `admin_password`
    pub admin_password_hash: Option<String>,
    /// Directory uploaded car images are written under
    pub media_root: PathBuf,
    pub seed_data: bool,
    pub max_connections: u32,
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first variable holding an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first variable holding an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        if database_url.trim().is_empty() {
            return Err(ConfigError::Empty { var: "DATABASE_URL" });
        }

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddress {
                var: "BIND_ADDR",
                value: bind_raw.clone(),
            })?;

        let admin_username =
            lookup("ADMIN_USERNAME").unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string());
        if admin_username.trim().is_empty() {
            return Err(ConfigError::Empty { var: "ADMIN_USERNAME" });
        }

        let admin_password = lookup("ADMIN_PASSWORD").filter(|password| !password.is_empty());
        let admin_password_hash = lookup("ADMIN_PASSWORD_HASH")
            .map(|hash| hash.trim().to_string())
            .filter(|hash| !hash.is_empty());

        let media_root = lookup("MEDIA_ROOT").unwrap_or_else(|| DEFAULT_MEDIA_ROOT.to_string());
        if media_root.trim().is_empty() {
            return Err(ConfigError::Empty { var: "MEDIA_ROOT" });
        }

        let seed_data = match lookup("SEED_DATA") {
            Some(raw) => parse_flag("SEED_DATA", &raw)?,
            None => false,
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: "DATABASE_MAX_CONNECTIONS",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            bind_addr,
            admin_username,
            admin_password,
            admin_password_hash,
            media_root: PathBuf::from(media_root),
            seed_data,
            max_connections,
        })
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: raw.to_string(),
        }),
    }
}
