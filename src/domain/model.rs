use crate::utils::error::{ErrorKind, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One spreadsheet row keyed by the worksheet's header row. Keys keep column
/// order and may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(cells: Vec<(String, String)>) -> Self {
        Self { cells }
    }

    /// Pairs header cells with a row's values; short rows are padded with
    /// empty strings and blank headers are skipped.
    pub fn from_cells(headers: &[String], values: &[String]) -> Self {
        let cells = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.is_empty())
            .map(|(i, header)| (header.clone(), values.get(i).cloned().unwrap_or_default()))
            .collect();
        Self { cells }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .rev()
            .find(|(key, _)| key == header)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worksheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Worksheet {
    /// Builds a worksheet from a value grid whose first row holds the headers.
    pub fn from_grid(name: impl Into<String>, mut grid: Vec<Vec<String>>) -> Self {
        let name = name.into();
        if grid.is_empty() {
            return Self {
                name,
                headers: Vec::new(),
                rows: Vec::new(),
            };
        }

        let headers: Vec<String> = grid.remove(0).into_iter().map(|h| h.trim().to_string()).collect();
        let rows = grid
            .iter()
            .map(|values| RawRow::from_cells(&headers, values))
            .collect();

        Self {
            name,
            headers,
            rows,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

/// A normalized row. Field order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later cells overwrite earlier ones that share a header, keeping the
    /// first position.
    pub fn from_raw(row: &RawRow) -> Self {
        let mut data = Map::new();
        for (key, value) in &row.cells {
            data.insert(key.clone(), Value::String(value.clone()));
        }
        Self { data }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    /// Text view of a field; non-string values use their JSON form.
    pub fn text(&self, field: &str) -> Option<String> {
        self.data.get(field).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(field.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

pub type RecordSet = Vec<Record>;

/// Canonical serialized form of a record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Vec<u8>,
}

impl Snapshot {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub owner: String,
    pub repo: String,
    pub path: String,
    branches: Vec<String>,
}

impl PublishTarget {
    /// Duplicate branches collapse to their first occurrence; an empty set
    /// falls back to `default_branch`.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
        branches: impl IntoIterator<Item = String>,
        default_branch: &str,
    ) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for branch in branches {
            let branch = branch.trim().to_string();
            if !branch.is_empty() && !unique.contains(&branch) {
                unique.push(branch);
            }
        }
        if unique.is_empty() {
            unique.push(default_branch.to_string());
        }

        Self {
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            branches: unique,
        }
    }

    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    /// Same target restricted to `keep`; returns `None` if nothing remains.
    pub fn with_branches(&self, keep: &[String]) -> Option<Self> {
        let branches: Vec<String> = self
            .branches
            .iter()
            .filter(|b| keep.contains(b))
            .cloned()
            .collect();
        if branches.is_empty() {
            return None;
        }
        Some(Self {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            path: self.path.clone(),
            branches,
        })
    }

    pub fn display_name(&self) -> String {
        format!("{}/{}:{}", self.owner, self.repo, self.path)
    }
}

/// File content as read from the hosting service with the identifier its
/// update API expects back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    pub sha: String,
}

#[derive(Debug)]
pub enum BranchStatus {
    Created { commit: String },
    Updated { commit: String },
    Unchanged,
    DryRun { exists: bool },
    Failed { error: SyncError },
}

#[derive(Debug)]
pub struct BranchOutcome {
    pub branch: String,
    pub status: BranchStatus,
}

impl BranchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, BranchStatus::Failed { .. })
    }

    pub fn is_written(&self) -> bool {
        matches!(
            self.status,
            BranchStatus::Created { .. } | BranchStatus::Updated { .. }
        )
    }
}

#[derive(Debug, Default)]
pub struct PublishResult {
    /// Set when the confirmation prompt was answered "no".
    pub declined: bool,
    pub outcomes: Vec<BranchOutcome>,
}

impl PublishResult {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome(&self, branch: &str) -> Option<&BranchOutcome> {
        self.outcomes.iter().find(|o| o.branch == branch)
    }

    pub fn failed_branches(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| o.branch.clone())
            .collect()
    }

    pub fn written_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    /// The error kind every failed branch has in common, if there is one.
    pub fn shared_failure_kind(&self) -> Option<ErrorKind> {
        let mut kinds = self.outcomes.iter().filter_map(|o| match &o.status {
            BranchStatus::Failed { error } => Some(error.kind()),
            _ => None,
        });
        let first = kinds.next()?;
        kinds.all(|kind| kind == first).then_some(first)
    }
}
