//! Configuration module for the SubTrack backend.
//!
//! All configuration is loaded from environment variables (optionally seeded
//! from a `.env` file) with sensible defaults.

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Default listen port when `PORT` is unset or empty.
pub const DEFAULT_PORT: u16 = 5000;

/// Configuration loading error naming the offending variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}={:?}: {}", self.key, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `text` or `json`, got `{}`", other)),
        }
    }
}

/// Whether the shield blocks requests or only reports what it would block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldMode {
    Live,
    DryRun,
}

impl FromStr for ShieldMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LIVE" => Ok(ShieldMode::Live),
            "DRY_RUN" | "DRYRUN" => Ok(ShieldMode::DryRun),
            other => Err(format!("expected `LIVE` or `DRY_RUN`, got `{}`", other)),
        }
    }
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

/// Request shield settings.
#[derive(Debug, Clone)]
pub struct ShieldConfig {
    pub mode: ShieldMode,
    pub allow_search_engines: bool,
    /// Token bucket capacity per client
    pub rate_limit_capacity: u32,
    /// Tokens added back every `rate_limit_interval`
    pub rate_limit_refill_rate: u32,
    pub rate_limit_interval: Duration,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// MongoDB connection string (may be empty)
    pub mongo_uri: String,
    /// Explicit database name, overrides the one in the URI
    pub mongo_db_name: Option<String>,
    pub mongo_connect_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// HS256 signing secret; `None` means one is generated per process
    pub jwt_secret: Option<String>,
    pub jwt_expires_in: Duration,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub cors_origins: CorsOrigins,
    pub body_limit_bytes: usize,
    pub shield: ShieldConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated the same as missing ones, so `PORT=` falls
    /// back to the default port.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host: IpAddr = parse_or(&get, "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&get, "PORT", DEFAULT_PORT)?;

        let mongo_uri = lookup("MONGO_URI").unwrap_or_default();
        let mongo_db_name = get("MONGO_DB_NAME");
        let mongo_connect_timeout =
            Duration::from_secs(parse_or(&get, "MONGO_CONNECT_TIMEOUT_SECS", 10u64)?);

        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_format = parse_or(&get, "LOG_FORMAT", LogFormat::Text)?;

        let jwt_secret = get("JWT_SECRET");
        let jwt_expires_in = Duration::from_secs(parse_or(&get, "JWT_EXPIRES_IN_SECS", 86_400u64)?);

        let bcrypt_cost: u32 = parse_or(&get, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: "must be between 4 and 31".to_string(),
            });
        }

        let cookie_secure = parse_bool(&get, "COOKIE_SECURE", false)?;

        let cors_origins = match get("CORS_ORIGINS") {
            None => CorsOrigins::Any,
            Some(raw) if raw.trim() == "*" => CorsOrigins::Any,
            Some(raw) => CorsOrigins::List(
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        };

        let body_limit_bytes = parse_or(&get, "BODY_LIMIT_BYTES", 100 * 1024usize)?;

        let shield = ShieldConfig {
            mode: parse_or(&get, "SHIELD_MODE", ShieldMode::Live)?,
            allow_search_engines: parse_bool(&get, "SHIELD_ALLOW_SEARCH_ENGINES", true)?,
            rate_limit_capacity: parse_nonzero(&get, "RATE_LIMIT_CAPACITY", 10)?,
            rate_limit_refill_rate: parse_nonzero(&get, "RATE_LIMIT_REFILL_RATE", 5)?,
            rate_limit_interval: Duration::from_secs(u64::from(parse_nonzero(
                &get,
                "RATE_LIMIT_INTERVAL_SECS",
                10,
            )?)),
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            mongo_uri,
            mongo_db_name,
            mongo_connect_timeout,
            log_level,
            log_format,
            jwt_secret,
            jwt_expires_in,
            bcrypt_cost,
            cookie_secure,
            cors_origins,
            body_limit_bytes,
            shield,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_nonzero<G>(get: &G, key: &'static str, default: u32) -> Result<u32, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default)?;
    if value == 0 {
        return Err(ConfigError {
            key,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError {
                key,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}
