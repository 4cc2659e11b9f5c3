use crate::core::Confirmation;
use crate::utils::error::Result;

/// Answers every prompt with a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirmation for AutoConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        tracing::debug!("Auto-answering '{}' with {}", prompt, self.0);
        Ok(self.0)
    }
}

/// Interactive yes/no prompt on the terminal. Defaults to "no".
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm;

#[cfg(feature = "cli")]
impl Confirmation for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| crate::utils::error::SyncError::IoError(std::io::Error::other(e)))
    }
}
