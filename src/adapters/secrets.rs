use crate::core::SecretsProvider;
use crate::utils::error::{Result, SyncError};
use std::collections::HashMap;

/// Environment variables captured once, when the provider is built.
#[derive(Clone, Default)]
pub struct EnvSecrets {
    values: HashMap<String, String>,
}

impl EnvSecrets {
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    /// Loads `path` into the process environment first. Variables that are
    /// already set take precedence over the file.
    #[cfg(feature = "cli")]
    pub fn from_env_file(path: &str) -> Result<Self> {
        dotenvy::from_filename(path)
            .map_err(|e| SyncError::config(format!("Could not load env file '{}': {}", path, e)))?;
        tracing::debug!("🔑 Loaded environment from {}", path);
        Ok(Self::from_env())
    }

    /// Optional lookup for non-secret settings such as `WORKSHEETS_TO_FETCH`.
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

impl std::fmt::Debug for EnvSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSecrets")
            .field("count", &self.values.len())
            .finish()
    }
}

impl SecretsProvider for EnvSecrets {
    fn get(&self, name: &str) -> Result<String> {
        self.optional(name)
            .map(str::to_string)
            .ok_or_else(|| SyncError::auth(format!("{} is not set", name)))
    }
}

/// Fixed secrets, for tests and embedding.
#[derive(Clone, Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl SecretsProvider for StaticSecrets {
    fn get(&self, name: &str) -> Result<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::auth(format!("{} is not set", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_secrets_snapshot_at_construction() {
        std::env::set_var("SHEET_SYNC_TEST_SECRET", "first");
        let secrets = EnvSecrets::from_env();
        std::env::set_var("SHEET_SYNC_TEST_SECRET", "second");

        assert_eq!(secrets.get("SHEET_SYNC_TEST_SECRET").unwrap(), "first");
        std::env::remove_var("SHEET_SYNC_TEST_SECRET");
    }

    #[test]
    fn test_missing_or_blank_secret_is_auth_error() {
        std::env::set_var("SHEET_SYNC_TEST_BLANK", "  ");
        let secrets = EnvSecrets::from_env();

        assert!(matches!(
            secrets.get("SHEET_SYNC_TEST_BLANK"),
            Err(SyncError::AuthError { .. })
        ));
        assert!(secrets.get("SHEET_SYNC_TEST_NEVER_SET").is_err());
        std::env::remove_var("SHEET_SYNC_TEST_BLANK");
    }

    #[test]
    fn test_static_secrets() {
        let secrets = StaticSecrets::new().with("GITHUB_TOKEN", "ghp_test");
        assert_eq!(secrets.get("GITHUB_TOKEN").unwrap(), "ghp_test");
        assert!(secrets.get("GOOGLE_API_PRIVATE_KEY").is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_env_file_is_loaded() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SHEET_SYNC_TEST_FROM_FILE=from-file").unwrap();

        let secrets = EnvSecrets::from_env_file(&file.path().to_string_lossy()).unwrap();
        assert_eq!(secrets.get("SHEET_SYNC_TEST_FROM_FILE").unwrap(), "from-file");
        std::env::remove_var("SHEET_SYNC_TEST_FROM_FILE");
    }
}
