use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment sources
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read-only view of `KEY=VALUE` configuration.
///
/// Resolution code takes an `EnvSource` instead of calling `std::env::var`
/// directly so tests can hand in a plain map.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;

    /// Like [`var`](Self::var) but treats empty / whitespace-only values as
    /// unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Process environment layered over values loaded from an env file.
///
/// Exported variables win, so a value set by the MCP client's launch
/// configuration overrides whatever is in `.env`.
#[derive(Debug, Clone, Default)]
pub struct LayeredEnv {
    file: HashMap<String, String>,
}

impl LayeredEnv {
    pub fn new(file: HashMap<String, String>) -> Self {
        Self { file }
    }

    /// Number of values contributed by the env file.
    pub fn file_len(&self) -> usize {
        self.file.len()
    }
}

impl EnvSource for LayeredEnv {
    fn var(&self, key: &str) -> Option<String> {
        ProcessEnv.var(key).or_else(|| self.file.get(key).cloned())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// .env parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Load `KEY=VALUE` pairs from an env file without touching the process
/// environment.
///
/// Returns `ConfigError::MissingEnvFile` when the file does not exist.
/// Malformed lines are skipped with a warning rather than rejected. Use
/// single quotes for values that contain a literal `$`.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingEnvFile(path.display().to_string()));
    }

    let unreadable = |message: String| ConfigError::Invalid {
        key: path.display().to_string(),
        message,
    };
    let entries = dotenvy::from_path_iter(path).map_err(|e| unreadable(e.to_string()))?;

    let mut vars = HashMap::new();
    for entry in entries {
        match entry {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(dotenvy::Error::LineParse(line, index)) => {
                tracing::warn!(
                    path = %path.display(),
                    line = %line,
                    index,
                    "skipping malformed env file line"
                );
            }
            Err(e) => return Err(unreadable(e.to_string())),
        }
    }

    tracing::debug!(path = %path.display(), count = vars.len(), "loaded env file");
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn env_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn parses_plain_and_quoted_values() {
        let file = env_file(&[
            "# Tableau",
            "TABLEAU_SITE_ID=marketing",
            r#"TABLEAU_PASSWORD="p@ss #1""#,
            "TABLEAU_TOKEN_NAME='ci token'",
        ]);
        let vars = load_env_file(file.path()).unwrap();
        assert_eq!(vars.len(), 3);
        assert_eq!(vars["TABLEAU_SITE_ID"], "marketing");
        assert_eq!(vars["TABLEAU_PASSWORD"], "p@ss #1");
        assert_eq!(vars["TABLEAU_TOKEN_NAME"], "ci token");
    }

    #[test]
    fn strips_export_prefix_and_trailing_comment() {
        let file = env_file(&["export TABLEAU_SERVER_URL=https://x.example.com # prod"]);
        let vars = load_env_file(file.path()).unwrap();
        assert_eq!(vars["TABLEAU_SERVER_URL"], "https://x.example.com");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let file = env_file(&["no equals sign", "TABLEAU_SITE_ID=finance"]);
        let vars = load_env_file(file.path()).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["TABLEAU_SITE_ID"], "finance");
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let err = load_env_file(Path::new("/nonexistent/tableau.env")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvFile(ref p) if p.contains("tableau.env")));
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let mut env = HashMap::new();
        env.insert("TABLEAU_SITE_ID".to_owned(), "   ".to_owned());
        assert_eq!(env.non_empty("TABLEAU_SITE_ID"), None);
        assert_eq!(env.var("TABLEAU_SITE_ID").as_deref(), Some("   "));
    }
}
