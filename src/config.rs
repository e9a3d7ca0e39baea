//! Process configuration, read once from the environment at startup.
//!
//! - `SECRET_KEY`: token signing key (required)
//! - `DATABASE_URL`: SQLite database (default: `sqlite://todos.db`)
//! - `FRONTEND_URL`: extra origin allowed by CORS (optional)
//! - `LISTEN_ADDR`: address to bind (default: `127.0.0.1:8000`)
//! - `BCRYPT_COST`: password hashing cost (default: `bcrypt::DEFAULT_COST`)
//! - `STORE_TIMEOUT_SECS`: bound on each database round-trip (default: `5`)

use std::{net::SocketAddr, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub listen_addr: SocketAddr,
    pub bcrypt_cost: u32,
    pub store_timeout: Duration,
}

impl Config {
    pub const DEFAULT_DATABASE_URL: &'static str = "sqlite://todos.db";
    pub const DEFAULT_LISTEN_ADDR: &'static str = "127.0.0.1:8000";
    pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
    /// Origin of the bundled web frontend when run locally.
    pub const DEV_ORIGIN: &'static str = "http://localhost:3000";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; `from_env` passes
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup("SECRET_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("SECRET_KEY".to_string()))?;
        if secret_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "SECRET_KEY".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| Self::DEFAULT_DATABASE_URL.to_string());

        let mut allowed_origins = vec![Self::DEV_ORIGIN.to_string()];
        if let Some(frontend) = lookup("FRONTEND_URL").filter(|v| !v.is_empty()) {
            if frontend != Self::DEV_ORIGIN {
                allowed_origins.push(frontend);
            }
        }

        let listen_addr: SocketAddr =
            parse_var(&lookup, "LISTEN_ADDR", Self::DEFAULT_LISTEN_ADDR.parse().ok())?;

        let bcrypt_cost: u32 = parse_var(&lookup, "BCRYPT_COST", Some(bcrypt::DEFAULT_COST))?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                name: "BCRYPT_COST".to_string(),
                message: format!("{bcrypt_cost} is outside 4..=31"),
            });
        }

        let timeout_secs: u64 = parse_var(
            &lookup,
            "STORE_TIMEOUT_SECS",
            Some(Self::DEFAULT_STORE_TIMEOUT_SECS),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "STORE_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            secret_key,
            database_url,
            allowed_origins,
            listen_addr,
            bcrypt_cost,
            store_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' could not be parsed"),
        }),
        None => default.ok_or_else(|| ConfigError::MissingEnvVar(name.to_string())),
    }
}
