use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("Not found: {resource}")]
    NotFoundError { resource: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Conflict on branch '{branch}': {message}")]
    ConflictError { branch: String, message: String },

    #[error("Record {row} in worksheet '{worksheet}' rejected: {message}")]
    TransientRecordError {
        worksheet: String,
        row: usize,
        message: String,
    },

    #[error("Publish failed on branch(es): {}", branches.join(", "))]
    PublishError {
        branches: Vec<String>,
        /// Set when every failed branch failed the same way.
        cause: Option<ErrorKind>,
    },

    #[error("HTTP request failed: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("Unexpected response from {service}: HTTP {status}: {message}")]
    ApiError {
        service: String,
        status: u16,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' is missing")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// Coarse classification printed by the CLI on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    NotFound,
    Validation,
    Conflict,
    TransientRecord,
    Publish,
    Transport,
    Io,
    Serialization,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Auth => "AuthError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::TransientRecord => "TransientRecordError",
            ErrorKind::Publish => "PublishError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Io => "IoError",
            ErrorKind::Serialization => "SerializationError",
            ErrorKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SyncError {
    pub fn auth(message: impl Into<String>) -> Self {
        SyncError::AuthError {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        SyncError::NotFoundError {
            resource: resource.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::ValidationError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        SyncError::ConfigError {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::AuthError { .. } => ErrorKind::Auth,
            SyncError::NotFoundError { .. } => ErrorKind::NotFound,
            SyncError::ValidationError { .. } => ErrorKind::Validation,
            SyncError::ConflictError { .. } => ErrorKind::Conflict,
            SyncError::TransientRecordError { .. } => ErrorKind::TransientRecord,
            SyncError::PublishError { cause, .. } => cause.unwrap_or(ErrorKind::Publish),
            SyncError::TransportError(_) | SyncError::ApiError { .. } => ErrorKind::Transport,
            SyncError::IoError(_) => ErrorKind::Io,
            SyncError::SerializationError(_) => ErrorKind::Serialization,
            SyncError::ConfigError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::InvalidConfigValueError { .. } => ErrorKind::Config,
        }
    }

    /// Per-record failures are absorbed by the normalizer; everything else
    /// surfaces to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::TransientRecordError { .. })
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::TransientRecord => ErrorSeverity::Low,
            ErrorKind::Conflict | ErrorKind::Transport | ErrorKind::Publish => {
                ErrorSeverity::Medium
            }
            ErrorKind::NotFound | ErrorKind::Validation | ErrorKind::Serialization => {
                ErrorSeverity::High
            }
            ErrorKind::Auth | ErrorKind::Io | ErrorKind::Config => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Auth => {
                "Check GITHUB_TOKEN, GOOGLE_API_CLIENT_EMAIL and GOOGLE_API_PRIVATE_KEY, and that the accounts have access"
            }
            ErrorKind::NotFound => {
                "Verify the spreadsheet key, worksheet names, repository and branch names"
            }
            ErrorKind::Validation => "Add the missing columns to the spreadsheet or update required_columns",
            ErrorKind::Conflict => "The target file changed concurrently; run the sync again",
            ErrorKind::TransientRecord => "Fix the offending row in the spreadsheet",
            ErrorKind::Publish => "Inspect the per-branch results above and rerun once resolved",
            ErrorKind::Transport => "Check network connectivity and retry later",
            ErrorKind::Io => "Check file permissions and available disk space",
            ErrorKind::Serialization => "Inspect the data for values that cannot be encoded as JSON",
            ErrorKind::Config => "Review the configuration file and command line options",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(e: toml::de::Error) -> Self {
        SyncError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
