use std::str::FromStr;
use std::time::Duration;

use super::credentials::Credentials;
use super::env::EnvSource;
use crate::error::ConfigError;

pub const ENV_API_VERSION: &str = "TABLEAU_API_VERSION";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TABLEAU_REQUEST_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "TABLEAU_MAX_RETRIES";
pub const ENV_PAGE_SIZE: &str = "TABLEAU_PAGE_SIZE";
pub const ENV_MAX_DOWNLOAD_BYTES: &str = "TABLEAU_MAX_DOWNLOAD_BYTES";
pub const ENV_VERIFY_SSL: &str = "TABLEAU_VERIFY_SSL";

/// Largest page size the REST API accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TableauConfig
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything the server needs to talk to one Tableau site.
#[derive(Debug, Clone)]
pub struct TableauConfig {
    pub credentials: Credentials,
    /// Pinned REST API version. `None` probes `serverinfo` on first sign-in.
    pub api_version: Option<String>,
    /// Bound on a whole tool dispatch and on each HTTP request.
    pub request_timeout: Duration,
    /// Retries for transient REST failures. Sign-in is never retried.
    pub max_retries: u32,
    pub page_size: u32,
    /// Data sources larger than this are summarised but not returned.
    pub max_download_bytes: u64,
    pub verify_ssl: bool,
}

impl TableauConfig {
    /// Build a config with default tunables around already-resolved
    /// credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            api_version: None,
            request_timeout: Duration::from_secs(60),
            max_retries: 2,
            page_size: 100,
            max_download_bytes: 25 * 1024 * 1024,
            verify_ssl: true,
        }
    }

    /// Resolve credentials, then the optional tunables.
    ///
    /// Credentials are resolved first so that a missing server URL or
    /// ambiguous auth is reported ahead of any tunable error.
    pub fn from_env(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let credentials = Credentials::resolve(env)?;
        let mut cfg = Self::new(credentials);

        cfg.api_version = env.non_empty(ENV_API_VERSION);
        if let Some(secs) = parse_var::<u64>(env, ENV_REQUEST_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(invalid(ENV_REQUEST_TIMEOUT_SECS, "must be at least 1"));
            }
            cfg.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32>(env, ENV_MAX_RETRIES)? {
            cfg.max_retries = retries;
        }
        if let Some(size) = parse_var::<u32>(env, ENV_PAGE_SIZE)? {
            if !(1..=MAX_PAGE_SIZE).contains(&size) {
                return Err(invalid(
                    ENV_PAGE_SIZE,
                    format!("must be between 1 and {MAX_PAGE_SIZE}"),
                ));
            }
            cfg.page_size = size;
        }
        if let Some(bytes) = parse_var::<u64>(env, ENV_MAX_DOWNLOAD_BYTES)? {
            cfg.max_download_bytes = bytes;
        }
        if let Some(raw) = env.non_empty(ENV_VERIFY_SSL) {
            cfg.verify_ssl = parse_bool(&raw)
                .ok_or_else(|| invalid(ENV_VERIFY_SSL, format!("expected a boolean, got {raw:?}")))?;
        }

        Ok(cfg)
    }
}

fn parse_var<T>(env: &impl EnvSource, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env.non_empty(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, format!("{raw:?}: {e}"))),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_owned(),
        message: message.into(),
    }
}
