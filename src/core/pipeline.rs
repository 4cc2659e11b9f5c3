use crate::config::SyncConfig;
use crate::core::change::ChangeDetector;
use crate::core::normalize::{Normalized, RecordNormalizer};
use crate::core::publish::{PublishSettings, Publisher};
use crate::core::snapshot::Snapshotter;
use crate::core::source::{RecordSource, WorksheetSelection};
use crate::core::{
    Confirmation, PublishResult, PublishTarget, RepositoryHost, SecretsProvider, SheetCredential,
    SpreadsheetClient, Storage,
};
use crate::utils::error::{Result, SyncError};
use std::fmt;
use std::sync::Arc;

pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const GOOGLE_API_CLIENT_EMAIL: &str = "GOOGLE_API_CLIENT_EMAIL";
pub const GOOGLE_API_PRIVATE_KEY: &str = "GOOGLE_API_PRIVATE_KEY";
pub const GOOGLE_SPREADSHEET_KEY: &str = "GOOGLE_SPREADSHEET_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Normalizing,
    Snapshotting,
    DetectingChange,
    Publishing,
    /// Nothing differs from the published copy.
    Skipped,
    /// The confirmation prompt was answered "no".
    Declined,
    Done,
    Failed,
}

impl RunState {
    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Skipped | RunState::Declined | RunState::Done)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a run did and where it stopped.
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub history: Vec<RunState>,
    pub input_rows: usize,
    pub records: usize,
    pub dropped: usize,
    pub snapshot_bytes: Option<usize>,
    pub local_copy_written: bool,
    pub changed_branches: Vec<String>,
    pub publish: Option<PublishResult>,
    pub error: Option<SyncError>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
            history: vec![RunState::Idle],
            input_rows: 0,
            records: 0,
            dropped: 0,
            snapshot_bytes: None,
            local_copy_written: false,
            changed_branches: Vec::new(),
            publish: None,
            error: None,
        }
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!("Pipeline state {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn record_normalized(&mut self, normalized: &Normalized) {
        self.input_rows = normalized.input_rows;
        self.records = normalized.records.len();
        self.dropped = normalized.dropped;
    }
}

struct Credentials {
    sheet: SheetCredential,
    token: String,
    spreadsheet_id: String,
}

pub struct Pipeline<C: SpreadsheetClient, H: RepositoryHost, S: Storage> {
    source: RecordSource<C>,
    normalizer: RecordNormalizer,
    snapshotter: Snapshotter<S>,
    detector: ChangeDetector,
    host: H,
    publish_settings: PublishSettings,
    target: PublishTarget,
    selection: WorksheetSelection,
    spreadsheet_id: Option<String>,
    secrets: Arc<dyn SecretsProvider>,
    confirmation: Option<Arc<dyn Confirmation>>,
}

impl<C: SpreadsheetClient, H: RepositoryHost, S: Storage> Pipeline<C, H, S> {
    /// `storage` receives the local copy when `snapshot.local_copy_path` is set.
    pub fn from_config(
        config: &SyncConfig,
        sheets: C,
        host: H,
        storage: S,
        secrets: Arc<dyn SecretsProvider>,
    ) -> Self {
        let normalizer = RecordNormalizer::new(config.transform.rules.clone())
            .with_required_columns(config.source.required_columns.clone())
            .with_skip_blank_rows(config.transform.skip_blank_rows);

        let mut snapshotter = Snapshotter::new(config.snapshot.sort_keys);
        if let Some(path) = &config.snapshot.local_copy_path {
            snapshotter = snapshotter.with_local_copy(storage, path.clone());
        }

        Self {
            source: RecordSource::new(sheets),
            normalizer,
            snapshotter,
            detector: ChangeDetector::new(),
            host,
            publish_settings: config.publish_settings(),
            target: config.publish_target(),
            selection: config.worksheet_selection(),
            spreadsheet_id: config.source.spreadsheet_id.clone(),
            secrets,
            confirmation: None,
        }
    }

    pub fn with_confirmation(mut self, confirmation: Arc<dyn Confirmation>) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    pub fn target(&self) -> &PublishTarget {
        &self.target
    }

    /// Runs every stage once. Never returns early with an error: failures end
    /// in `RunState::Failed` with the error attached to the report.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();

        match self.execute(&mut report).await {
            Ok(state) => {
                report.transition(state);
                tracing::info!("🏁 Sync finished: {}", state);
            }
            Err(e) => {
                tracing::error!("❌ Sync failed during {}: {} ({})", report.state, e, e.kind());
                report.transition(RunState::Failed);
                report.error = Some(e);
            }
        }

        report
    }

    async fn execute(&self, report: &mut RunReport) -> Result<RunState> {
        report.transition(RunState::Fetching);
        let credentials = self.credentials()?;
        let worksheets = self
            .source
            .fetch(&credentials.sheet, &credentials.spreadsheet_id, &self.selection)
            .await?;

        report.transition(RunState::Normalizing);
        let normalized = self.normalizer.normalize(&worksheets)?;
        report.record_normalized(&normalized);

        report.transition(RunState::Snapshotting);
        let snapshot = self.snapshotter.serialize(&normalized.records)?;
        report.snapshot_bytes = Some(snapshot.len());
        report.local_copy_written = self.snapshotter.persist(&snapshot).await;

        report.transition(RunState::DetectingChange);
        let mut publisher = Publisher::connect(&self.host, &credentials.token, self.publish_settings.clone()).await?;
        if let Some(confirmation) = &self.confirmation {
            publisher = publisher.with_confirmation(confirmation.clone());
        }

        let mut changed = Vec::new();
        for branch in self.target.branches() {
            match publisher.read(&self.target, branch).await {
                Ok(remote) => {
                    if self.detector.differs_from(&snapshot, remote.as_ref()) {
                        changed.push(branch.clone());
                    } else {
                        tracing::info!("✅ {}@{} is up to date", self.target.display_name(), branch);
                    }
                }
                Err(e @ SyncError::AuthError { .. }) => return Err(e),
                Err(e) => {
                    // Left to the publisher, which reports it against this branch only.
                    tracing::warn!("⚠️ Could not read {}@{}: {}", self.target.display_name(), branch, e);
                    changed.push(branch.clone());
                }
            }
        }
        report.changed_branches = changed.clone();

        let Some(changed_target) = self.target.with_branches(&changed) else {
            tracing::info!("No changes detected, skipping publish");
            return Ok(RunState::Skipped);
        };

        report.transition(RunState::Publishing);
        let result = publisher.publish(&snapshot, &changed_target).await?;
        let declined = result.declined;
        let failed = result.failed_branches();
        let cause = result.shared_failure_kind();
        report.publish = Some(result);

        if declined {
            Ok(RunState::Declined)
        } else if !failed.is_empty() {
            Err(SyncError::PublishError { branches: failed, cause })
        } else {
            Ok(RunState::Done)
        }
    }

    fn credentials(&self) -> Result<Credentials> {
        let spreadsheet_id = match &self.spreadsheet_id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => self.secrets.get(GOOGLE_SPREADSHEET_KEY)?,
        };

        Ok(Credentials {
            sheet: SheetCredential::new(
                self.secrets.get(GOOGLE_API_CLIENT_EMAIL)?,
                &self.secrets.get(GOOGLE_API_PRIVATE_KEY)?,
            ),
            token: self.secrets.get(GITHUB_TOKEN)?,
            spreadsheet_id,
        })
    }
}
