use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use obg_common::{helpers::env_flag, Secret};
use open_banking_engine::{db_types::NewTpp, DEFAULT_CODE_TTL_SECS};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::errors::ServerError;

const DEFAULT_OBG_HOST: &str = "127.0.0.1";
const DEFAULT_OBG_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/open_banking.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_DB_TIMEOUT_SECS: u64 = 5;
const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;
const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;
const DEFAULT_AUDIT_BUFFER_SIZE: usize = 1024;
const DEFAULT_AUDIT_MAX_BODY_BYTES: usize = 64 * 1024;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Bounds both the wait for a pooled connection and SQLite's busy wait.
    pub db_timeout: StdDuration,
    pub auth: AuthConfig,
    /// The hourly request quota given to newly registered TPPs.
    pub default_rate_limit: i64,
    pub auth_code_ttl: Duration,
    /// Capacity of the audit queue. Records are dropped (and the drop logged) when it is full.
    pub audit_buffer_size: usize,
    /// Captured request and response bodies are truncated to this many bytes.
    pub audit_max_body_bytes: usize,
    /// Larger request bodies are refused with 413.
    pub max_body_bytes: usize,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OBG_HOST.to_string(),
            port: DEFAULT_OBG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_timeout: StdDuration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
            auth: AuthConfig::default(),
            default_rate_limit: NewTpp::DEFAULT_RATE_LIMIT_PER_HOUR,
            auth_code_ttl: Duration::seconds(DEFAULT_CODE_TTL_SECS),
            audit_buffer_size: DEFAULT_AUDIT_BUFFER_SIZE,
            audit_max_body_bytes: DEFAULT_AUDIT_MAX_BODY_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("OBG_HOST").ok().unwrap_or_else(|| DEFAULT_OBG_HOST.into());
        let port = env_or_default("OBG_PORT", DEFAULT_OBG_PORT);
        let database_url = env::var("OBG_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ OBG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let db_max_connections = env_or_default("OBG_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS).max(1);
        let db_timeout = StdDuration::from_secs(env_or_default("OBG_DB_TIMEOUT_SECS", DEFAULT_DB_TIMEOUT_SECS));
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let default_rate_limit = env_or_default("OBG_DEFAULT_RATE_LIMIT", NewTpp::DEFAULT_RATE_LIMIT_PER_HOUR);
        let auth_code_ttl = Duration::seconds(env_or_default("OBG_AUTH_CODE_TTL_SECS", DEFAULT_CODE_TTL_SECS));
        let audit_buffer_size = env_or_default("OBG_AUDIT_BUFFER_SIZE", DEFAULT_AUDIT_BUFFER_SIZE);
        let audit_max_body_bytes = env_or_default("OBG_AUDIT_MAX_BODY_BYTES", DEFAULT_AUDIT_MAX_BODY_BYTES);
        let max_body_bytes = env_or_default("OBG_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES);
        let use_x_forwarded_for = env_flag("OBG_USE_X_FORWARDED_FOR", false);
        let use_forwarded = env_flag("OBG_USE_FORWARDED", false);
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            db_timeout,
            auth,
            default_rate_limit,
            auth_code_ttl,
            audit_buffer_size,
            audit_max_body_bytes,
            max_body_bytes,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

/// Reads and parses `name`, logging and falling back to `default` when it is unset or invalid.
fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret: Secret<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. Every token issued \
             will become invalid when the server restarts. DO NOT operate in production like this. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        Self {
            jwt_secret: Secret::new(secret),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("OBG_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [OBG_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError("OBG_JWT_SECRET must be at least 32 characters long".into()));
        }
        let access_token_ttl =
            Duration::seconds(env_or_default("OBG_ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL_SECS));
        let refresh_token_ttl =
            Duration::seconds(env_or_default("OBG_REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TOKEN_TTL_SECS));
        Ok(Self { jwt_secret: Secret::new(secret), access_token_ttl, refresh_token_ttl })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub audit_max_body_bytes: usize,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            audit_max_body_bytes: config.audit_max_body_bytes,
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { use_x_forwarded_for: false, use_forwarded: false, audit_max_body_bytes: DEFAULT_AUDIT_MAX_BODY_BYTES }
    }
}
