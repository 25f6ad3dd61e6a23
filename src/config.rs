use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use crate::models::Term;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    /// Base URL of the identity service; unset means in-memory sessions.
    pub identity_url: Option<String>,
    pub current_term: Term,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let bind_raw = get("BIND_ADDR", "127.0.0.1:3000");
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let connections_raw = get("DB_MAX_CONNECTIONS", "5");
        let max_connections = connections_raw
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                value: connections_raw.clone(),
            })?;

        let semester_raw = get("CURRENT_SEMESTER", "1");
        let semester = match semester_raw.as_str() {
            "1" => 1,
            "2" => 2,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "CURRENT_SEMESTER",
                    value: semester_raw,
                });
            }
        };

        let identity_url = lookup("IDENTITY_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            database_url: get("DATABASE_URL", "sqlite://registrar.db"),
            bind_addr,
            max_connections,
            identity_url,
            current_term: Term::new(get("CURRENT_ACADEMIC_YEAR", "114"), semester),
        })
    }
}
