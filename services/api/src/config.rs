//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use reading_rewards_core::RulesConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Without a key the service runs with the offline content generator.
    pub openai_api_key: Option<String>,
    pub story_model: String,
    pub image_model: String,
    pub blob_dir: PathBuf,
    /// URL prefix under which files in `blob_dir` are served.
    pub public_blob_url: String,
    pub cors_origin: String,
    /// Lower-cased emails whose accounts are created as administrators.
    pub admin_emails: Vec<String>,
    /// Minutes a reader session may sit unused before it is dropped from memory.
    pub session_idle_minutes: i64,
    pub rules: RulesConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        // --- Server and Database ---
        let bind_address = parse_var("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Content Generation ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        let story_model = var_or("STORY_MODEL", "gpt-4o-mini");
        let image_model = var_or("IMAGE_MODEL", "dall-e-3");

        // --- Blob Storage and CORS ---
        let blob_dir = PathBuf::from(var_or("BLOB_DIR", "./blobs"));
        let public_blob_url = var_or("PUBLIC_BLOB_URL", "/blobs").trim_end_matches('/').to_string();
        if !public_blob_url.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "PUBLIC_BLOB_URL".to_string(),
                "must be an absolute path such as /blobs".to_string(),
            ));
        }
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        // --- Accounts and Sessions ---
        let admin_emails: Vec<String> = var_or("ADMIN_EMAILS", "")
            .split(',')
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let session_idle_minutes = optional_var(&lookup, "SESSION_IDLE_MINUTES", 30i64)?;
        if session_idle_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_IDLE_MINUTES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Rule Overrides ---
        let defaults = RulesConfig::default();
        let rules = RulesConfig {
            required_seconds_per_generation: optional_var(
                &lookup,
                "REQUIRED_SECONDS_PER_GENERATION",
                defaults.required_seconds_per_generation,
            )?,
            max_generations_per_day: optional_var(
                &lookup,
                "MAX_GENERATIONS_PER_DAY",
                defaults.max_generations_per_day,
            )?,
            skin_generation_cost: optional_var(&lookup, "SKIN_GENERATION_COST", defaults.skin_generation_cost)?,
        };
        if rules.required_seconds_per_generation == 0 {
            return Err(ConfigError::InvalidValue(
                "REQUIRED_SECONDS_PER_GENERATION".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            story_model,
            image_model,
            blob_dir,
            public_blob_url,
            cors_origin,
            admin_emails,
            session_idle_minutes,
            rules,
        })
    }

    /// Whether an account for this email is created as an administrator.
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn optional_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => parse_var(name, &raw),
        None => Ok(default),
    }
}
