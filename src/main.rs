use anyhow::Context;
use clap::Parser;
use sheet_sync::adapters::TerminalConfirm;
use sheet_sync::core::BranchStatus;
use sheet_sync::utils::error::ErrorSeverity;
use sheet_sync::utils::{logger, validation::Validate};
use sheet_sync::{
    CliArgs, EnvSecrets, GitHubClient, GoogleSheetsClient, LocalStorage, LogFormat, Pipeline,
    RunReport, RunState, SyncConfig, SyncError,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    match args.log_format {
        LogFormat::Compact => logger::init_cli_logger(args.verbose),
        LogFormat::Json => logger::init_json_logger(args.verbose),
    }

    tracing::info!("Starting sheet-sync");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let secrets = match &args.env_file {
        Some(path) => EnvSecrets::from_env_file(path),
        None => {
            dotenvy::dotenv().ok();
            Ok(EnvSecrets::from_env())
        }
    };
    let secrets = secrets.unwrap_or_else(|e| fail(&e));

    let mut config = SyncConfig::from_file(&args.config).unwrap_or_else(|e| fail(&e));
    config.apply_worksheet_lists(
        secrets.optional("WORKSHEETS_TO_FETCH"),
        secrets.optional("WORKSHEETS_TO_SKIP"),
    );
    config.apply_repo_defaults(secrets.optional("REPO_OWNER"), secrets.optional("REPO_NAME"));
    args.apply_to(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    let sheets = GoogleSheetsClient::new(
        config.api.sheets_base_url.clone(),
        config.api.token_url.clone(),
        config.timeout(),
    )
    .context("failed to build the spreadsheet client")?;
    let host = GitHubClient::new(config.api.github_base_url.clone(), config.timeout());

    let mut pipeline = Pipeline::from_config(
        &config,
        sheets,
        host,
        LocalStorage::default(),
        Arc::new(secrets),
    );
    if config.publish.confirm_before_publish {
        pipeline = pipeline.with_confirmation(Arc::new(TerminalConfirm));
    }

    tracing::info!("🎯 Target: {} on {:?}", pipeline.target().display_name(), pipeline.target().branches());
    let report = pipeline.run().await;
    print_summary(&report);

    if let Some(e) = &report.error {
        fail(e);
    }

    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "📊 {} rows read, {} records kept, {} dropped",
        report.input_rows, report.records, report.dropped
    );

    match report.state {
        RunState::Skipped => println!("✅ No changes detected, nothing published"),
        RunState::Declined => println!("🛑 Publish declined, nothing written"),
        _ => {}
    }

    let Some(result) = &report.publish else {
        return;
    };
    for outcome in &result.outcomes {
        match &outcome.status {
            BranchStatus::Created { commit } => println!("✅ {}: created ({})", outcome.branch, commit),
            BranchStatus::Updated { commit } => println!("✅ {}: updated ({})", outcome.branch, commit),
            BranchStatus::Unchanged => println!("➖ {}: unchanged", outcome.branch),
            BranchStatus::DryRun { exists } => println!(
                "🔎 {}: dry run, would {} the file",
                outcome.branch,
                if *exists { "update" } else { "create" }
            ),
            BranchStatus::Failed { error } => println!("❌ {}: {}", outcome.branch, error),
        }
    }
}

/// Prints the error kind and exits with a code chosen by severity.
fn fail(e: &SyncError) -> ! {
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
