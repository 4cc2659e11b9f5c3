use crate::domain::model::RemoteFile;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Service-account credential for the spreadsheet API.
#[derive(Clone)]
pub struct SheetCredential {
    pub client_email: String,
    pub private_key: String,
}

impl SheetCredential {
    /// Keys stored in environment variables often carry literal `\n` escapes.
    pub fn new(client_email: String, private_key: &str) -> Self {
        Self {
            client_email,
            private_key: private_key.replace("\\n", "\n"),
        }
    }
}

impl std::fmt::Debug for SheetCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetCredential")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    type Session: SheetSession;

    async fn authenticate(&self, credential: &SheetCredential) -> Result<Self::Session>;
}

#[async_trait]
pub trait SheetSession: Send + Sync {
    /// Worksheet titles in spreadsheet order.
    async fn list_worksheets(&self, spreadsheet_id: &str) -> Result<Vec<String>>;

    /// Cell grid of one worksheet; the first row holds the headers.
    async fn get_rows(&self, spreadsheet_id: &str, worksheet: &str) -> Result<Vec<Vec<String>>>;
}

/// Coordinates of the published file, without the branch.
#[derive(Debug, Clone, Copy)]
pub struct FileLocation<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub path: &'a str,
}

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    type Session: RepositorySession;

    async fn authenticate(&self, token: &str) -> Result<Self::Session>;
}

#[async_trait]
pub trait RepositorySession: Send + Sync {
    /// `Ok(None)` when the file does not exist on an existing branch.
    async fn read_file(&self, location: FileLocation<'_>, branch: &str) -> Result<Option<RemoteFile>>;

    /// Creates the file when `sha` is `None`, otherwise updates it. Returns
    /// the commit id.
    async fn write_file(
        &self,
        location: FileLocation<'_>,
        branch: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String>;
}

pub trait SecretsProvider: Send + Sync {
    fn get(&self, name: &str) -> Result<String>;
}

/// Yes/no gate in front of remote writes.
pub trait Confirmation: Send + Sync {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Destination for the optional local snapshot copy.
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
