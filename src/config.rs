//! # Config: Server Settings
//!
//! Settings are read from CLI flags with environment fallbacks (clap `env`),
//! after `.env` has been loaded by `main`. [`ServerArgs`] is the raw form;
//! [`ServerArgs::into_settings`] validates it into [`Settings`], failing
//! startup on a missing admin password or a missing session secret in `PROD`.
//!
//! The admin password is only ever held as its SHA-256 digest.

use clap::ValueEnum;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use subtle::ConstantTimeEq;
use tracing::warn;

pub const MIN_PROD_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    #[value(name = "LOCAL", alias = "local")]
    Local,
    #[value(name = "PROD", alias = "prod")]
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "LOCAL",
            Environment::Prod => "PROD",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no admin password configured: set ADMIN_PASSWORD or ADMIN_PASSWORD_HASH")]
    MissingAdminPassword,
    #[error("ADMIN_PASSWORD_HASH must be 64 hex characters (SHA-256)")]
    InvalidPasswordHash,
    #[error("ADMIN_USERNAME must not be empty")]
    EmptyUsername,
    #[error("SESSION_SECRET is required in PROD and must be at least 32 characters")]
    WeakSessionSecret,
    #[error("SESSION_TTL_HOURS must be between 1 and 720")]
    InvalidSessionTtl,
}

/// Flags for `serve`.
#[derive(Debug, Clone, clap::Args)]
pub struct ServerArgs {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Deployment environment
    #[arg(long, env = "ENVIRONMENT", value_enum, default_value = "LOCAL")]
    pub environment: Environment,

    /// Include internal error details in responses
    #[arg(
        long,
        env = "DEBUG",
        default_value_t = false,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub debug: bool,

    #[arg(long, env = "APP_NAME", default_value = "AI Tutor")]
    pub app_name: String,

    #[arg(long, env = "APP_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub app_version: String,

    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    pub admin_username: String,

    /// Plain admin password (hashed on startup)
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// SHA-256 hex digest of the admin password; wins over ADMIN_PASSWORD
    #[arg(long, env = "ADMIN_PASSWORD_HASH", hide_env_values = true)]
    pub admin_password_hash: Option<String>,

    /// Key mixed into stored session digests
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    #[arg(long, env = "SESSION_TTL_HOURS", default_value_t = 12)]
    pub session_ttl_hours: i64,

    /// Comma-separated CORS origins; `*` allows any
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// JSON file with program and group configuration for /api/v1/config
    #[arg(long, env = "GROUP_CONFIG_PATH", default_value = "config.json")]
    pub group_config_path: PathBuf,
}

impl Default for ServerArgs {
    fn default() -> Self {
        ServerArgs {
            port: 8000,
            environment: Environment::Local,
            debug: false,
            app_name: "AI Tutor".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            admin_username: "admin".to_string(),
            admin_password: None,
            admin_password_hash: None,
            session_secret: None,
            session_ttl_hours: 12,
            allowed_origins: "*".to_string(),
            group_config_path: PathBuf::from("config.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        }
    }
}

/// Configured admin identity. Only the password digest is retained.
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password_digest: [u8; 32],
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl AdminCredentials {
    pub fn from_password(username: &str, password: &str) -> Self {
        AdminCredentials {
            username: username.to_string(),
            password_digest: sha256(password.as_bytes()),
        }
    }

    pub fn from_hash(username: &str, hex_digest: &str) -> Result<Self, ConfigError> {
        Ok(AdminCredentials {
            username: username.to_string(),
            password_digest: parse_digest(hex_digest).ok_or(ConfigError::InvalidPasswordHash)?,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Constant-time check of a submitted username with either a plain
    /// password or a hex SHA-256 digest of it. Both comparisons always run.
    pub fn verify(&self, username: &str, password: Option<&str>, password_hash: Option<&str>) -> bool {
        let submitted = match (password, password_hash) {
            (Some(p), _) if !p.is_empty() => Some(sha256(p.as_bytes())),
            (_, Some(h)) => parse_digest(h),
            _ => None,
        };
        let Some(submitted) = submitted else {
            return false;
        };
        let user_ok = sha256(username.as_bytes())
            .as_slice()
            .ct_eq(sha256(self.username.as_bytes()).as_slice());
        let pass_ok = submitted.as_slice().ct_eq(self.password_digest.as_slice());
        bool::from(user_ok & pass_ok)
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(bytes));
    out
}

fn parse_digest(hex_digest: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(hex_digest.trim()).ok()?;
    bytes.try_into().ok()
}

/// Lowercase hex SHA-256 of a password, the form `ADMIN_PASSWORD_HASH` expects.
pub fn hash_password(password: &str) -> String {
    hex::encode(sha256(password.as_bytes()))
}

/// Validated server settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub environment: Environment,
    pub debug: bool,
    pub app_name: String,
    pub app_version: String,
    pub admin: AdminCredentials,
    pub session_secret: String,
    pub session_ttl: chrono::Duration,
    pub allowed_origins: AllowedOrigins,
    pub group_config_path: PathBuf,
    /// Host of the database, credentials stripped. Filled in by the caller.
    pub database_host: String,
}

impl Settings {
    /// Cookies are marked `Secure` outside local development.
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Prod
    }
}

impl ServerArgs {
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let username = self.admin_username.trim().to_string();
        if username.is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        let admin = match (
            non_empty(self.admin_password_hash.as_deref()),
            non_empty(self.admin_password.as_deref()),
        ) {
            (Some(hash), _) => AdminCredentials::from_hash(&username, hash)?,
            (None, Some(password)) => AdminCredentials::from_password(&username, password),
            (None, None) => return Err(ConfigError::MissingAdminPassword),
        };

        if !(1..=720).contains(&self.session_ttl_hours) {
            return Err(ConfigError::InvalidSessionTtl);
        }

        let session_secret = match (self.environment, non_empty(self.session_secret.as_deref())) {
            (Environment::Prod, Some(s)) if s.len() >= MIN_PROD_SECRET_LEN => s.to_string(),
            (Environment::Prod, _) => return Err(ConfigError::WeakSessionSecret),
            (Environment::Local, Some(s)) => s.to_string(),
            (Environment::Local, None) => {
                warn!("SESSION_SECRET not set; using an ephemeral secret (sessions end on restart)");
                format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
            }
        };

        Ok(Settings {
            port: self.port,
            environment: self.environment,
            debug: self.debug,
            app_name: self.app_name,
            app_version: self.app_version,
            admin,
            session_secret,
            session_ttl: chrono::Duration::hours(self.session_ttl_hours),
            allowed_origins: AllowedOrigins::parse(&self.allowed_origins),
            group_config_path: self.group_config_path,
            database_host: String::new(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
