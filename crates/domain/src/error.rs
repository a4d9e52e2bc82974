use crate::tool::ErrorKind;

/// Fatal, pre-start configuration failures.
///
/// These are reported before any session exists and cause the process to
/// exit non-zero.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TABLEAU_SERVER_URL is not set")]
    MissingServerUrl,

    #[error("TABLEAU_SERVER_URL is not a valid http(s) URL: {0}")]
    InvalidServerUrl(String),

    #[error(
        "exactly one credential pair is required: TABLEAU_TOKEN_NAME + TABLEAU_TOKEN_VALUE \
         or TABLEAU_USERNAME + TABLEAU_PASSWORD ({0})"
    )]
    AmbiguousOrIncompleteAuth(String),

    #[error("env file not found: {0}")]
    MissingEnvFile(String),

    #[error("{key}: {message}")]
    Invalid { key: String, message: String },
}

/// Shared error type used across all tableau-mcp crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("auth: {0}")]
    Auth(String),

    /// A REST call was rejected because the session token is no longer
    /// valid. Recovered by the session manager; never surfaced as-is.
    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments ({}): {message}", .fields.join(", "))]
    InvalidArguments { fields: Vec<String>, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("Tableau: {0}")]
    Remote(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("invalid resource URI: {0}")]
    InvalidUri(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a single-field argument failure.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            fields: vec![field.into()],
            message: message.into(),
        }
    }

    /// The wire-level category reported back to the MCP client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigError,
            Self::Auth(_) | Self::SessionExpired(_) => ErrorKind::AuthError,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidUri(_) => ErrorKind::InvalidUri,
            Self::Remote(_)
            | Self::Timeout(_)
            | Self::RateLimited(_)
            | Self::Http(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ErrorKind::RemoteError,
        }
    }

    /// Whether a retry with the same credentials could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimited(_) | Self::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_reports_as_remote_error() {
        let err = Error::Timeout("GET /workbooks".into());
        assert_eq!(err.kind(), ErrorKind::RemoteError);
        assert!(err.is_transient());
    }

    #[test]
    fn expired_session_reports_as_auth_error() {
        assert_eq!(
            Error::SessionExpired("401002".into()).kind(),
            ErrorKind::AuthError
        );
    }

    #[test]
    fn invalid_arguments_lists_every_field() {
        let err = Error::InvalidArguments {
            fields: vec!["view_id".into(), "include_extract".into()],
            message: "bad input".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid arguments (view_id, include_extract): bad input"
        );
    }

    #[test]
    fn config_errors_convert() {
        let err: Error = ConfigError::MissingServerUrl.into();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
