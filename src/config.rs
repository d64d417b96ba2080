//! Configuration module for the xmonitor service.
//!
//! This module contains configuration structures and environment variable handling
//! for the Twitter/X API integration, the LLM summarizer, the database and the
//! daily scheduler. Missing credentials are reported when the configuration is
//! loaded, not when the first search runs.

use log::{debug, info, warn};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::twitter::{DEFAULT_FOLLOWING_CAP, DEFAULT_MAX_RESULTS, MAX_PAGE_RESULTS};

/// Errors raised while loading configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("Invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Masks a secret for logging, keeping at most 8 characters from each end.
pub fn mask_secret(secret: &str) -> String {
    let len = secret.len();
    let prefix = secret.get(..8).unwrap_or("");
    if len > 16 {
        format!("{}...{}", prefix, secret.get(len - 8..).unwrap_or(""))
    } else if len > 8 {
        format!("{}...", prefix)
    } else {
        "...".to_string()
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(name)),
        Some(value) => {
            info!("Found {} environment variable with length: {}", name, value.len());
            Ok(value)
        }
        None => Err(ConfigError::Missing(name)),
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            debug!("Found {} environment variable ({})", name, mask_secret(&value));
            Some(value)
        }
        _ => {
            info!("No {} found in environment variables", name);
            None
        }
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => {
            let result = value.trim().parse::<T>();
            result.map_err(|e| ConfigError::Invalid {
                name,
                value,
                reason: e.to_string(),
            })
        }
        None => Ok(default),
    }
}

fn in_range<T: PartialOrd + std::fmt::Display>(
    name: &'static str,
    value: T,
    min: T,
    max: T,
) -> Result<T, ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: format!("must be between {} and {}", min, max),
        });
    }
    Ok(value)
}

fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Configuration struct for Twitter/X API credentials.
///
/// It uses OAuth 2.0 User Context (Access Token) for all operations. When the
/// refresh token and client credentials are all present, an expired access
/// token is refreshed automatically on a 401 response.
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    /// The Access Token for OAuth 2.0 User Context authentication (all operations)
    pub access_token: String,
    /// The Refresh Token for automatically refreshing expired access tokens
    pub refresh_token: Option<String>,
    /// The Client ID for OAuth 2.0 operations
    pub client_id: Option<String>,
    /// The Client Secret for OAuth 2.0 operations
    pub client_secret: Option<String>,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
}

impl TwitterConfig {
    /// Loads Twitter credentials, reading variables through `lookup`.
    ///
    /// # Required Environment Variables
    ///
    /// - `xapi_access_token`: Twitter API Access Token (OAuth 2.0 User Context)
    ///
    /// # Optional Environment Variables (for automatic token refresh)
    ///
    /// - `xapi_refresh_token`, `xapi_client_id`, `xapi_client_secret`
    /// - `HTTP_TIMEOUT_SECS`: Request timeout in seconds (default 30)
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        info!("Loading Twitter configuration from environment variables");

        let access_token = required(lookup, "xapi_access_token")?;
        debug!("Access token (masked): {}", mask_secret(&access_token));
        if access_token.len() < 10 {
            warn!(
                "Access token seems unusually short ({} characters)",
                access_token.len()
            );
        }

        let refresh_token = optional(lookup, "xapi_refresh_token");
        let client_id = optional(lookup, "xapi_client_id");
        let client_secret = optional(lookup, "xapi_client_secret");
        let timeout_secs = in_range(
            "HTTP_TIMEOUT_SECS",
            parsed(lookup, "HTTP_TIMEOUT_SECS", 30u64)?,
            1,
            600,
        )?;

        let config = TwitterConfig {
            access_token,
            refresh_token,
            client_id,
            client_secret,
            http_timeout: Duration::from_secs(timeout_secs),
        };

        if config.refresh_token.is_some() && !config.can_refresh_token() {
            warn!("Refresh token is provided but client credentials are missing - automatic token refresh will be disabled");
        }
        if config.can_refresh_token() {
            info!("Automatic token refresh is enabled");
        } else {
            info!("Automatic token refresh is disabled - manual token refresh required");
        }

        Ok(config)
    }

    /// Returns true if client id, client secret and refresh token are all available.
    pub fn can_refresh_token(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.refresh_token.is_some()
    }
}

/// Default DeepSeek API base URL.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.deepseek.com";

/// Default DeepSeek model.
pub const DEFAULT_LLM_MODEL: &str = "deepseek-chat";

/// Settings for the LLM summarizer.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub http_timeout: Duration,
}

impl LlmConfig {
    /// Loads `DEEPSEEK_API_KEY` (required), `DEEPSEEK_MODEL` and `DEEPSEEK_BASE_URL`.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = required(lookup, "DEEPSEEK_API_KEY")?;
        let model = optional(lookup, "DEEPSEEK_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        let base_url = optional(lookup, "DEEPSEEK_BASE_URL")
            .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        info!("LLM summarizer configured with model {}", model);
        Ok(LlmConfig {
            api_key,
            model,
            base_url,
            http_timeout: Duration::from_secs(30),
        })
    }
}

/// Search and scheduling knobs for the monitoring cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Tweets fetched per keyword, `1..=100`
    pub max_results: u32,
    /// Maximum number of followed accounts cached
    pub following_cap: usize,
    /// UTC hour of the daily run
    pub daily_run_hour: u32,
    /// UTC minute of the daily run
    pub daily_run_minute: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            max_results: DEFAULT_MAX_RESULTS,
            following_cap: DEFAULT_FOLLOWING_CAP,
            daily_run_hour: 8,
            daily_run_minute: 0,
        }
    }
}

impl MonitorSettings {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = MonitorSettings::default();
        let max_results = in_range(
            "SEARCH_MAX_RESULTS",
            parsed(lookup, "SEARCH_MAX_RESULTS", defaults.max_results)?,
            1,
            MAX_PAGE_RESULTS,
        )?;
        let following_cap = in_range(
            "FOLLOWING_CAP",
            parsed(lookup, "FOLLOWING_CAP", defaults.following_cap)?,
            1,
            100_000,
        )?;
        let daily_run_hour = in_range(
            "DAILY_RUN_HOUR",
            parsed(lookup, "DAILY_RUN_HOUR", defaults.daily_run_hour)?,
            0,
            23,
        )?;
        let daily_run_minute = in_range(
            "DAILY_RUN_MINUTE",
            parsed(lookup, "DAILY_RUN_MINUTE", defaults.daily_run_minute)?,
            0,
            59,
        )?;

        Ok(MonitorSettings {
            max_results,
            following_cap,
            daily_run_hour,
            daily_run_minute,
        })
    }

    /// Cron expression (with seconds) for the daily run, evaluated in UTC.
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * * *", self.daily_run_minute, self.daily_run_hour)
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub twitter: TwitterConfig,
    pub llm: LlmConfig,
    pub monitor: MonitorSettings,
}

impl AppConfig {
    /// Loads the full configuration from the environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_ok() {
            info!("Loaded environment from .env file");
        }
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = required(lookup, "DATABASE_URL")?;
        let port = parsed(lookup, "PORT", 3000u16)?;

        Ok(AppConfig {
            database_url,
            port,
            twitter: TwitterConfig::from_lookup(lookup)?,
            llm: LlmConfig::from_lookup(lookup)?,
            monitor: MonitorSettings::from_lookup(lookup)?,
        })
    }
}
