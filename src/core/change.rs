use crate::core::{RemoteFile, Snapshot};

/// Byte-exact comparison against the published copy. A different serializer
/// writing the target file will always register as a change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// A missing previous snapshot always counts as changed.
    pub fn has_changed(&self, new: &Snapshot, previous: Option<&[u8]>) -> bool {
        match previous {
            Some(previous) => new.as_bytes() != previous,
            None => true,
        }
    }

    pub fn differs_from(&self, new: &Snapshot, remote: Option<&RemoteFile>) -> bool {
        self.has_changed(new, remote.map(|file| file.content.as_slice()))
    }
}
