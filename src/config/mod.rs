pub mod cli;
pub mod sync_config;

pub use sync_config::{
    ApiConfig, PublishConfig, SnapshotConfig, SourceConfig, SyncConfig, TargetConfig, TransformConfig,
};

#[cfg(feature = "cli")]
use crate::utils::validation::parse_list;
#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "sheet-sync")]
#[command(about = "Publish spreadsheet rows as a JSON file on one or more git branches")]
pub struct CliArgs {
    #[arg(short, long, default_value = "sheet-sync.toml", help = "TOML configuration file")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    #[arg(long, help = "Build and compare the snapshot without committing")]
    pub dry_run: bool,

    #[arg(short, long, help = "Skip the confirmation prompt")]
    pub yes: bool,

    #[arg(long, help = "Also write the snapshot to this local file")]
    pub local_copy: Option<String>,

    #[arg(long, help = "Comma separated worksheets to read, in merge order")]
    pub worksheets: Option<String>,

    #[arg(long, help = "Comma separated branches to publish to")]
    pub branches: Option<String>,

    #[arg(long, help = "Load secrets from this dotenv file")]
    pub env_file: Option<String>,
}

#[cfg(feature = "cli")]
impl CliArgs {
    /// Command line flags win over the file.
    pub fn apply_to(&self, config: &mut SyncConfig) {
        if self.dry_run {
            config.publish.enabled = false;
        }
        if self.yes {
            config.publish.confirm_before_publish = false;
        }
        if let Some(path) = &self.local_copy {
            config.snapshot.local_copy_path = Some(path.clone());
        }
        if let Some(worksheets) = &self.worksheets {
            config.set_worksheet_names(parse_list(worksheets));
        }
        if let Some(branches) = &self.branches {
            let branches = parse_list(branches);
            if !branches.is_empty() {
                config.target.branches = branches;
            }
        }
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_file_settings() {
        let mut config = SyncConfig::from_toml_str(
            r#"
[publish]
confirm_before_publish = true

[target]
repo_owner = "mozilla"
repo_name = "schedule"
branches = ["gh-pages"]
"#,
        )
        .unwrap();

        let args = CliArgs::parse_from([
            "sheet-sync",
            "--dry-run",
            "--yes",
            "--worksheets",
            "Talks, Workshops",
            "--branches",
            "main,gh-pages",
            "--local-copy",
            "out/sessions.json",
        ]);
        args.apply_to(&mut config);

        assert!(!config.publish.enabled);
        assert!(!config.publish.confirm_before_publish);
        assert!(config.source.multi_worksheet_merge);
        assert_eq!(config.source.worksheet_names, vec!["Talks", "Workshops"]);
        assert_eq!(config.publish_target().branches().len(), 2);
        assert_eq!(config.snapshot.local_copy_path.as_deref(), Some("out/sessions.json"));
    }

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        let mut config = SyncConfig::from_toml_str(
            "[target]\nrepo_owner = \"mozilla\"\nrepo_name = \"schedule\"\n",
        )
        .unwrap();

        CliArgs::parse_from(["sheet-sync"]).apply_to(&mut config);

        assert!(config.publish.enabled);
        assert!(config.source.worksheet_names.is_empty());
        assert_eq!(config.publish_target().branches(), &["gh-pages".to_string()]);
    }
}
