pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, SyncConfig};

#[cfg(feature = "cli")]
pub use config::{CliArgs, LogFormat};

pub use adapters::{AutoConfirm, EnvSecrets, GitHubClient, GoogleSheetsClient, StaticSecrets};
pub use core::pipeline::{Pipeline, RunReport, RunState};
pub use utils::error::{Result, SyncError};
