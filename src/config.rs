//! Server configuration read from the environment (and `.env`, if present).

use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    str::FromStr,
};

use thiserror::Error;

const FOURTEEN_DAYS_MS: i64 = 14 * 24 * 60 * 60 * 1000;
const TEN_MIB: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::Invalid {
                key: "APP_ENV",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    /// Public origin used to build `fileURL` links.
    pub base_url: String,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Session cookie lifetime in milliseconds, refreshed on activity.
    pub cookie_max_age_ms: i64,
    pub environment: Environment,
    pub allowed_origins: Vec<String>,
    pub oauth_clients_path: PathBuf,
    pub log_filter: String,
    pub log_json: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            database_url: "sqlite://chatline.db".to_owned(),
            base_url: "http://localhost:8080".to_owned(),
            uploads_dir: PathBuf::from("public/uploads"),
            max_upload_bytes: TEN_MIB,
            cookie_max_age_ms: FOURTEEN_DAYS_MS,
            environment: Environment::Development,
            allowed_origins: vec![
                "http://localhost:3000".to_owned(),
                "http://localhost:8080".to_owned(),
            ],
            oauth_clients_path: PathBuf::from("client_secret.json"),
            log_filter: "info".to_owned(),
            log_json: false,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get("HOST") {
            config.host = parse("HOST", &value)?;
        }
        if let Some(value) = get("PORT") {
            config.port = parse("PORT", &value)?;
        }
        if let Some(value) = get("DATABASE_URL") {
            config.database_url = value;
        }
        if let Some(value) = get("BASE_URL") {
            config.base_url = value.trim_end_matches('/').to_owned();
        }
        if let Some(value) = get("UPLOADS_DIR") {
            config.uploads_dir = PathBuf::from(value);
        }
        if let Some(value) = get("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse("MAX_UPLOAD_BYTES", &value)?;
        }
        if let Some(value) = get("COOKIE_MAX_AGE") {
            config.cookie_max_age_ms = parse("COOKIE_MAX_AGE", &value)?;
            if config.cookie_max_age_ms <= 0 {
                return Err(ConfigError::Invalid { key: "COOKIE_MAX_AGE", value });
            }
        }
        if let Some(value) = get("APP_ENV") {
            config.environment = value.parse()?;
        }
        if let Some(value) = get("ALLOWED_ORIGINS") {
            config.allowed_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(value) = get("OAUTH_CLIENTS_PATH") {
            config.oauth_clients_path = PathBuf::from(value);
        }
        if let Some(value) = get("RUST_LOG") {
            config.log_filter = value;
        }
        if let Some(value) = get("LOG_JSON") {
            config.log_json = parse("LOG_JSON", &value)?;
        }

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_owned(),
    })
}
