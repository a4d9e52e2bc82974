use std::fmt;

use serde::{Deserialize, Serialize};

use super::env::EnvSource;
use crate::error::ConfigError;

pub const ENV_SERVER_URL: &str = "TABLEAU_SERVER_URL";
pub const ENV_SITE_ID: &str = "TABLEAU_SITE_ID";
pub const ENV_TOKEN_NAME: &str = "TABLEAU_TOKEN_NAME";
pub const ENV_TOKEN_VALUE: &str = "TABLEAU_TOKEN_VALUE";
pub const ENV_USERNAME: &str = "TABLEAU_USERNAME";
pub const ENV_PASSWORD: &str = "TABLEAU_PASSWORD";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credentials
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Token,
    Password,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => f.write_str("token"),
            Self::Password => f.write_str("password"),
        }
    }
}

/// The secret half of [`Credentials`]. Only one variant can ever be
/// populated, so the "exactly one mode" invariant holds by construction.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Personal access token.
    Token { name: String, value: String },
    Password { username: String, password: String },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token { name, .. } => f
                .debug_struct("Token")
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// A complete, validated credential set for one Tableau site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL without a trailing slash, e.g. `https://tableau.example.com`.
    pub server_url: String,
    /// Site content URL. Empty string selects the default site.
    pub site_id: String,
    pub auth: AuthMethod,
}

impl Credentials {
    /// Resolve credentials from the environment.
    ///
    /// Fails with [`ConfigError::MissingServerUrl`] when the server URL is
    /// absent and [`ConfigError::AmbiguousOrIncompleteAuth`] unless exactly
    /// one complete credential pair is present. Empty values count as unset.
    pub fn resolve(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let raw_url = env
            .non_empty(ENV_SERVER_URL)
            .ok_or(ConfigError::MissingServerUrl)?;
        let server_url = normalize_server_url(&raw_url)?;

        let site_id = env.non_empty(ENV_SITE_ID).unwrap_or_default();

        let token = (env.non_empty(ENV_TOKEN_NAME), env.non_empty(ENV_TOKEN_VALUE));
        let password = (env.non_empty(ENV_USERNAME), env.non_empty(ENV_PASSWORD));

        let auth = match (token, password) {
            ((Some(name), Some(value)), (None, None)) => AuthMethod::Token { name, value },
            ((None, None), (Some(username), Some(password))) => {
                AuthMethod::Password { username, password }
            }
            ((Some(_), Some(_)), (Some(_), Some(_))) => {
                return Err(ConfigError::AmbiguousOrIncompleteAuth(
                    "both a token pair and a username/password pair are set".into(),
                ))
            }
            ((None, None), (None, None)) => {
                return Err(ConfigError::AmbiguousOrIncompleteAuth(
                    "no credentials are set".into(),
                ))
            }
            (token, password) => {
                let mut missing = Vec::new();
                if token.0.is_some() != token.1.is_some() {
                    missing.push(if token.0.is_none() { ENV_TOKEN_NAME } else { ENV_TOKEN_VALUE });
                }
                if password.0.is_some() != password.1.is_some() {
                    missing.push(if password.0.is_none() { ENV_USERNAME } else { ENV_PASSWORD });
                }
                return Err(ConfigError::AmbiguousOrIncompleteAuth(format!(
                    "incomplete credential pair, missing {}",
                    missing.join(", ")
                )));
            }
        };

        Ok(Self {
            server_url,
            site_id,
            auth,
        })
    }

    pub fn auth_mode(&self) -> AuthMode {
        match self.auth {
            AuthMethod::Token { .. } => AuthMode::Token,
            AuthMethod::Password { .. } => AuthMode::Password,
        }
    }

    /// Human-readable site label for logs.
    pub fn site_label(&self) -> &str {
        if self.site_id.is_empty() {
            "<default>"
        } else {
            &self.site_id
        }
    }
}

/// Validate the server URL and strip any trailing slash.
fn normalize_server_url(raw: &str) -> Result<String, ConfigError> {
    let parsed =
        url::Url::parse(raw).map_err(|e| ConfigError::InvalidServerUrl(format!("{raw}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidServerUrl(raw.to_owned()));
    }
    Ok(raw.trim_end_matches('/').to_owned())
}
