//! Client configuration.
//!
//! `ClientConfig` holds the public endpoints and keys every Shopfloor client
//! needs to reach the hosted backend: the project URL used for auth, the
//! platform API key sent on every request, and the functions endpoint that
//! serves the offline queue and work-order routes.

use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_SYNC_RESET_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const FUNCTIONS_PATH: &str = "/functions/v1";

pub const ENV_SUPABASE_URL: &str = "SHOPFLOOR_SUPABASE_URL";
pub const ENV_API_KEY: &str = "SHOPFLOOR_API_KEY";
pub const ENV_FUNCTIONS_URL: &str = "SHOPFLOOR_FUNCTIONS_URL";
pub const ENV_DEVICE_ID: &str = "SHOPFLOOR_DEVICE_ID";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration value {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub supabase_url: String,
    pub api_key: String,
    pub functions_url: String,
    pub device_id: String,
    pub sync_reset_delay: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Build a config from explicit values.
    ///
    /// `functions_url` is derived from `supabase_url` when omitted, and a
    /// device id is generated when none is supplied.
    pub fn new(
        supabase_url: Option<String>,
        api_key: Option<String>,
        functions_url: Option<String>,
        device_id: Option<String>,
    ) -> Result<Self, ConfigError> {
        let supabase_url =
            normalize_text_option(supabase_url).ok_or(ConfigError::Missing(ENV_SUPABASE_URL))?;
        if !is_http_url(&supabase_url) {
            return Err(ConfigError::Invalid(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        }
        let api_key = normalize_text_option(api_key).ok_or(ConfigError::Missing(ENV_API_KEY))?;
        let functions_url = match normalize_text_option(functions_url) {
            Some(url) => normalize_functions_url(&url)?,
            None => normalize_functions_url(&supabase_url)?,
        };
        let device_id = normalize_text_option(device_id).unwrap_or_else(generate_device_id);

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            api_key,
            functions_url,
            device_id,
            sync_reset_delay: DEFAULT_SYNC_RESET_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Read configuration from `SHOPFLOOR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any `SHOPFLOOR_*` key source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::new(
            lookup(ENV_SUPABASE_URL),
            lookup(ENV_API_KEY),
            lookup(ENV_FUNCTIONS_URL),
            lookup(ENV_DEVICE_ID),
        )
    }
}

/// Normalize a project or functions URL into the functions base URL.
pub fn normalize_functions_url(url: &str) -> Result<String, ConfigError> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(
            "Functions URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(ConfigError::Invalid(
            "Functions URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with(FUNCTIONS_PATH) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}{FUNCTIONS_PATH}"))
    }
}

pub fn generate_device_id() -> String {
    format!("cli-{}", uuid::Uuid::new_v4())
}
