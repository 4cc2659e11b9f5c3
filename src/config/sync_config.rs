use crate::core::normalize::TransformRule;
use crate::core::publish::PublishSettings;
use crate::core::source::WorksheetSelection;
use crate::core::PublishTarget;
use crate::utils::error::{Result, SyncError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    pub target: TargetConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    /// Falls back to the `GOOGLE_SPREADSHEET_KEY` secret when unset.
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub worksheet_names: Vec<String>,
    #[serde(default)]
    pub skip_worksheets: Vec<String>,
    #[serde(default)]
    pub multi_worksheet_merge: bool,
    #[serde(default)]
    pub required_columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    #[serde(default = "default_true")]
    pub skip_blank_rows: bool,
    #[serde(default)]
    pub rules: Vec<TransformRule>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            skip_blank_rows: true,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotConfig {
    pub local_copy_path: Option<String>,
    #[serde(default)]
    pub sort_keys: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub confirm_before_publish: bool,
    #[serde(default = "default_create_message")]
    pub create_message: String,
    #[serde(default = "default_update_message")]
    pub update_message: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confirm_before_publish: false,
            create_message: default_create_message(),
            update_message: default_update_message(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Falls back to `REPO_OWNER` from the environment.
    #[serde(default)]
    pub repo_owner: Option<String>,
    /// Falls back to `REPO_NAME` from the environment.
    #[serde(default)]
    pub repo_name: Option<String>,
    #[serde(default = "default_file_path")]
    pub file_path: String,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_sheets_base_url")]
    pub sheets_base_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_github_base_url")]
    pub github_base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            sheets_base_url: default_sheets_base_url(),
            token_url: default_token_url(),
            github_base_url: default_github_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_create_message() -> String {
    "adding session data".to_string()
}

fn default_update_message() -> String {
    "updating schedule data".to_string()
}

fn default_file_path() -> String {
    "sessions.json".to_string()
}

fn default_branch() -> String {
    "gh-pages".to_string()
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl SyncConfig {
    /// Reads and parses a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SyncError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML after replacing `${VAR}` with environment values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Unknown variables are left as-is and caught by validation.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SyncError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.sheets_base_url", &self.api.sheets_base_url)?;
        validation::validate_url("api.token_url", &self.api.token_url)?;
        validation::validate_url("api.github_base_url", &self.api.github_base_url)?;
        validation::validate_range("api.timeout_seconds", self.api.timeout_seconds, 1, 600)?;

        let repo_owner = validation::validate_required_field("target.repo_owner", &self.target.repo_owner)?;
        let repo_name = validation::validate_required_field("target.repo_name", &self.target.repo_name)?;
        validation::validate_non_empty_string("target.repo_owner", repo_owner)?;
        validation::validate_non_empty_string("target.repo_name", repo_name)?;
        validation::validate_non_empty_string("target.default_branch", &self.target.default_branch)?;
        validation::validate_repo_path("target.file_path", &self.target.file_path)?;
        validation::validate_file_extensions(
            "target.file_path",
            std::slice::from_ref(&self.target.file_path),
            &["json"],
        )?;

        if let Some(path) = &self.snapshot.local_copy_path {
            validation::validate_path("snapshot.local_copy_path", path)?;
        }

        let unresolved = [
            ("source.spreadsheet_id", self.source.spreadsheet_id.as_deref().unwrap_or_default()),
            ("target.repo_owner", repo_owner.as_str()),
            ("target.repo_name", repo_name.as_str()),
            ("target.file_path", self.target.file_path.as_str()),
        ];
        for (field, value) in unresolved {
            if value.contains("${") {
                return Err(SyncError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "Environment variable is not set".to_string(),
                });
            }
        }

        if !self.source.multi_worksheet_merge && self.source.worksheet_names.len() > 1 {
            tracing::warn!(
                "⚠️ {} worksheets configured but multi_worksheet_merge is off; only '{}' will be read",
                self.source.worksheet_names.len(),
                self.source.worksheet_names[0]
            );
        }

        Ok(())
    }

    /// Replaces the explicit worksheet list. More than one name turns on
    /// merging; an empty list leaves the config untouched.
    pub fn set_worksheet_names(&mut self, names: Vec<String>) {
        if names.is_empty() {
            return;
        }
        self.source.multi_worksheet_merge = names.len() > 1;
        self.source.worksheet_names = names;
    }

    /// Comma separated `WORKSHEETS_TO_FETCH` / `WORKSHEETS_TO_SKIP` values
    /// from the environment. The file's own lists take precedence.
    pub fn apply_worksheet_lists(&mut self, fetch: Option<&str>, skip: Option<&str>) {
        if self.source.worksheet_names.is_empty() {
            if let Some(fetch) = fetch {
                self.set_worksheet_names(validation::parse_list(fetch));
            }
        }
        if self.source.skip_worksheets.is_empty() {
            if let Some(skip) = skip {
                self.source.skip_worksheets = validation::parse_list(skip);
            }
        }
    }

    /// `REPO_OWNER` / `REPO_NAME` values for a `[target]` that leaves them out.
    pub fn apply_repo_defaults(&mut self, owner: Option<&str>, name: Option<&str>) {
        if self.target.repo_owner.is_none() {
            self.target.repo_owner = owner.map(str::to_string);
        }
        if self.target.repo_name.is_none() {
            self.target.repo_name = name.map(str::to_string);
        }
    }

    pub fn worksheet_selection(&self) -> WorksheetSelection {
        WorksheetSelection {
            names: self.source.worksheet_names.clone(),
            skip: self.source.skip_worksheets.clone(),
            merge: self.source.multi_worksheet_merge,
        }
    }

    pub fn publish_target(&self) -> PublishTarget {
        PublishTarget::new(
            self.target.repo_owner.clone().unwrap_or_default(),
            self.target.repo_name.clone().unwrap_or_default(),
            self.target.file_path.clone(),
            self.target.branches.clone(),
            &self.target.default_branch,
        )
    }

    pub fn publish_settings(&self) -> PublishSettings {
        PublishSettings {
            enabled: self.publish.enabled,
            confirm_before_publish: self.publish.confirm_before_publish,
            create_message: self.publish.create_message.clone(),
            update_message: self.publish.update_message.clone(),
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.api.timeout_seconds)
    }
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
