use crate::core::{
    BranchOutcome, BranchStatus, Confirmation, FileLocation, PublishResult, PublishTarget, RemoteFile,
    RepositoryHost, RepositorySession, Snapshot,
};
use crate::utils::error::Result;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};

#[derive(Debug, Clone)]
pub struct PublishSettings {
    /// When false, branches are read but never written.
    pub enabled: bool,
    pub confirm_before_publish: bool,
    pub create_message: String,
    pub update_message: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            confirm_before_publish: false,
            create_message: "adding session data".to_string(),
            update_message: "updating schedule data".to_string(),
        }
    }
}

pub struct Publisher<R: RepositorySession> {
    session: R,
    settings: PublishSettings,
    confirmation: Option<Arc<dyn Confirmation>>,
}

impl<R: RepositorySession> Publisher<R> {
    pub fn new(session: R, settings: PublishSettings) -> Self {
        Self {
            session,
            settings,
            confirmation: None,
        }
    }

    pub async fn connect<H>(host: &H, token: &str, settings: PublishSettings) -> Result<Self>
    where
        H: RepositoryHost<Session = R>,
    {
        let session = host.authenticate(token).await?;
        Ok(Self::new(session, settings))
    }

    pub fn with_confirmation(mut self, confirmation: Arc<dyn Confirmation>) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    pub async fn read(&self, target: &PublishTarget, branch: &str) -> Result<Option<RemoteFile>> {
        self.session.read_file(location(target), branch).await
    }

    /// Writes `snapshot` to every branch of `target`. Branch failures are
    /// recorded in the result; only a failing confirmation prompt is returned
    /// as an error.
    pub async fn publish(&self, snapshot: &Snapshot, target: &PublishTarget) -> Result<PublishResult> {
        if self.settings.enabled && self.settings.confirm_before_publish {
            let prompt = format!(
                "Publish {} bytes to {} on branch(es) {}?",
                snapshot.len(),
                target.display_name(),
                target.branches().join(", ")
            );
            let approved = match &self.confirmation {
                Some(confirmation) => ask(confirmation.as_ref(), &prompt)?,
                None => {
                    tracing::warn!("Confirmation required but no prompt is available; not publishing");
                    false
                }
            };
            if !approved {
                tracing::info!("🛑 Publish declined, no branch modified");
                return Ok(PublishResult {
                    declined: true,
                    outcomes: Vec::new(),
                });
            }
        }

        let mut result = PublishResult::default();
        for branch in target.branches() {
            let status = match self.publish_branch(snapshot, target, branch).await {
                Ok(status) => status,
                Err(error) => {
                    tracing::error!("❌ {}@{}: {} ({})", target.display_name(), branch, error, error.kind());
                    BranchStatus::Failed { error }
                }
            };
            result.outcomes.push(BranchOutcome {
                branch: branch.clone(),
                status,
            });
        }

        Ok(result)
    }

    async fn publish_branch(&self, snapshot: &Snapshot, target: &PublishTarget, branch: &str) -> Result<BranchStatus> {
        let existing = self.read(target, branch).await?;

        if let Some(file) = &existing {
            if file.content == snapshot.as_bytes() {
                tracing::info!("✅ {}@{}: data has not changed, no commit created", target.display_name(), branch);
                return Ok(BranchStatus::Unchanged);
            }
        }

        if !self.settings.enabled {
            tracing::info!(
                "🔍 {}@{}: dry run, would {} the file",
                target.display_name(),
                branch,
                if existing.is_some() { "update" } else { "create" }
            );
            return Ok(BranchStatus::DryRun {
                exists: existing.is_some(),
            });
        }

        let (sha, message) = match &existing {
            Some(file) => (Some(file.sha.as_str()), self.settings.update_message.as_str()),
            None => (None, self.settings.create_message.as_str()),
        };

        let commit = self
            .session
            .write_file(location(target), branch, snapshot.as_bytes(), sha, message)
            .await?;

        if existing.is_some() {
            tracing::info!("📤 {}@{}: updated in commit {}", target.display_name(), branch, commit);
            Ok(BranchStatus::Updated { commit })
        } else {
            tracing::info!("📤 {}@{}: created in commit {}", target.display_name(), branch, commit);
            Ok(BranchStatus::Created { commit })
        }
    }
}

/// Prompts can block on stdin; on a multi-threaded runtime the worker is
/// handed off first so other tasks keep running.
fn ask(confirmation: &dyn Confirmation, prompt: &str) -> Result<bool> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| confirmation.confirm(prompt))
        }
        _ => confirmation.confirm(prompt),
    }
}

fn location(target: &PublishTarget) -> FileLocation<'_> {
    FileLocation {
        owner: &target.owner,
        repo: &target.repo,
        path: &target.path,
    }
}
