use std::env;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("You need to add {0} to the env")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings read from the environment at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub mongodb_uri: String,
    pub database_name: String,
    pub host: String,
    pub port: u16,
    pub auth_secret: String,
    pub cors_origin: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => 8080,
        };
        Ok(Config {
            mongodb_uri: required("MONGODB_URI")?,
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "cofinance".to_string()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            auth_secret: required("AUTH_SECRET")?,
            cors_origin: lookup("CORS_ORIGIN").filter(|v| !v.trim().is_empty()),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}
