use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use url::Url;

/// Errors raised while building the startup configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`${0}` is not set")]
    Missing(&'static str),

    #[error("`${var}` is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub downstream: DownstreamConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Core device API (relays, usb devices, batteries, water tanks, settings)
    pub vanpi_api_root_url: Url,
    /// Automation API (modes)
    pub automation_api_root_url: Url,
    /// Camera cloud tier used when a route does not name one
    pub blink_api_tier: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
}

impl DownstreamConfig {
    /// Root URL of the camera cloud API for the given tier
    pub fn blink_api_root_url(tier: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("https://rest-{}.immedia-semi.com/api/", tier))
    }
}

impl AppConfig {
    /// Build the configuration from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let database_url = required(&lookup, "DATABASE_URL")?;
        let vanpi_api_root_url = root_url(&lookup, "VANPI_API_ROOT_URL")?;
        let automation_api_root_url = root_url(&lookup, "AUTOMATION_API_ROOT_URL")?;
        let cors_origins = parse_origins(&required(&lookup, "VANPI_APP_API_ALLOWED_DOMAINS")?);

        let mut config = Self::preset(
            environment,
            database_url,
            vanpi_api_root_url,
            automation_api_root_url,
            cors_origins,
        );

        if let Some(v) = lookup("VANPI_APP_API_PORT") {
            config.api.port = parsed(&v, "VANPI_APP_API_PORT")?;
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = parsed(&v, "DATABASE_MAX_CONNECTIONS")?;
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            config.database.connection_timeout = parsed(&v, "DATABASE_CONNECTION_TIMEOUT")?;
        }
        if let Some(v) = lookup("DOWNSTREAM_TIMEOUT_SECS") {
            config.downstream.timeout_secs = parsed(&v, "DOWNSTREAM_TIMEOUT_SECS")?;
        }
        if let Some(tier) = lookup("BLINK_API_TIER") {
            if !is_valid_tier(&tier) {
                return Err(ConfigError::Invalid {
                    var: "BLINK_API_TIER",
                    reason: format!("'{}' is not an alphanumeric tier name", tier),
                });
            }
            config.downstream.blink_api_tier = tier;
        }

        Ok(config)
    }

    fn preset(
        environment: Environment,
        database_url: String,
        vanpi_api_root_url: Url,
        automation_api_root_url: Url,
        cors_origins: Vec<String>,
    ) -> Self {
        let (max_connections, connection_timeout, timeout_secs) = match environment {
            Environment::Development => (5, 30, 30),
            Environment::Staging => (10, 10, 15),
            Environment::Production => (10, 5, 10),
        };

        Self {
            environment,
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                connection_timeout,
            },
            downstream: DownstreamConfig {
                vanpi_api_root_url,
                automation_api_root_url,
                blink_api_tier: "prod".to_string(),
                timeout_secs,
            },
            api: ApiConfig { port: 3001 },
            security: SecurityConfig { cors_origins },
        }
    }
}

/// Tier names end up in a hostname, so only letters and digits are accepted
pub fn is_valid_tier(tier: &str) -> bool {
    !tier.is_empty() && tier.chars().all(|c| c.is_ascii_alphanumeric())
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn root_url<F>(lookup: &F, var: &'static str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, var)?;
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

fn parsed<T: std::str::FromStr>(raw: &str, var: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("cannot parse '{}'", raw),
    })
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
