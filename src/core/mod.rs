pub mod change;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod snapshot;
pub mod source;

pub use crate::domain::model::{
    BranchOutcome, BranchStatus, PublishResult, PublishTarget, RawRow, Record, RecordSet, RemoteFile,
    Snapshot, Worksheet,
};
pub use crate::domain::ports::{
    Confirmation, FileLocation, RepositoryHost, RepositorySession, SecretsProvider, SheetCredential,
    SheetSession, SpreadsheetClient, Storage,
};
pub use crate::utils::error::Result;
