use crate::core::{Record, Snapshot, Storage};
use crate::utils::error::Result;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};

const INDENT: &[u8] = b"    ";

/// Where the best-effort local copy goes.
#[derive(Debug, Clone)]
pub struct LocalCopy<S: Storage> {
    pub storage: S,
    pub file_name: String,
}

pub struct Snapshotter<S: Storage> {
    sort_keys: bool,
    local_copy: Option<LocalCopy<S>>,
}

impl<S: Storage> Snapshotter<S> {
    pub fn new(sort_keys: bool) -> Self {
        Self {
            sort_keys,
            local_copy: None,
        }
    }

    pub fn with_local_copy(mut self, storage: S, file_name: impl Into<String>) -> Self {
        self.local_copy = Some(LocalCopy {
            storage,
            file_name: file_name.into(),
        });
        self
    }

    /// Pretty JSON array, 4-space indent, raw UTF-8, no trailing newline.
    pub fn serialize(&self, records: &[Record]) -> Result<Snapshot> {
        let mut out = Vec::with_capacity(records.len() * 128);
        let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));

        if self.sort_keys {
            let sorted: Vec<Map<String, Value>> = records.iter().map(|r| sort_map(&r.data)).collect();
            sorted.serialize(&mut ser)?;
        } else {
            records.serialize(&mut ser)?;
        }

        Ok(Snapshot::from_bytes(out))
    }

    /// Writes the local copy if one is configured. Failures are logged, never returned.
    pub async fn persist(&self, snapshot: &Snapshot) -> bool {
        let Some(copy) = &self.local_copy else {
            return false;
        };

        match copy.storage.write_file(&copy.file_name, snapshot.as_bytes()).await {
            Ok(()) => {
                tracing::info!("💾 Local copy written to {} ({} bytes)", copy.file_name, snapshot.len());
                true
            }
            Err(e) => {
                tracing::warn!("⚠️ Could not write local copy {}: {}", copy.file_name, e);
                false
            }
        }
    }
}

fn sort_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(k, v)| (k.clone(), sort_value(v)))
        .collect()
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sort_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}
