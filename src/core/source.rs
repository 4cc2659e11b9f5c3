use crate::core::{SheetCredential, SheetSession, SpreadsheetClient, Worksheet};
use crate::utils::error::{Result, SyncError};

/// Which worksheets a run reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorksheetSelection {
    /// Explicit worksheet names in merge order. Empty means every worksheet.
    pub names: Vec<String>,
    /// Ignored when `names` is set.
    pub skip: Vec<String>,
    /// When false only the first selected worksheet is read.
    pub merge: bool,
}

impl WorksheetSelection {
    pub fn resolve(&self, available: &[String]) -> Result<Vec<String>> {
        let mut selected: Vec<String> = if self.names.is_empty() {
            available
                .iter()
                .filter(|name| !self.skip.contains(name))
                .cloned()
                .collect()
        } else {
            for name in &self.names {
                if !available.contains(name) {
                    return Err(SyncError::not_found(format!("worksheet '{}'", name)));
                }
            }
            self.names.clone()
        };

        if selected.is_empty() {
            return Err(SyncError::not_found("any worksheet to read"));
        }

        if !self.merge {
            selected.truncate(1);
        }

        Ok(selected)
    }
}

pub struct RecordSource<C: SpreadsheetClient> {
    client: C,
}

impl<C: SpreadsheetClient> RecordSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Authenticates once and reads the selected worksheets in order.
    pub async fn fetch(
        &self,
        credential: &SheetCredential,
        spreadsheet_id: &str,
        selection: &WorksheetSelection,
    ) -> Result<Vec<Worksheet>> {
        let session = self.client.authenticate(credential).await?;
        tracing::debug!("Authenticated with spreadsheet API as {}", credential.client_email);

        let available = session.list_worksheets(spreadsheet_id).await?;
        let names = selection.resolve(&available)?;
        tracing::info!("📥 Fetching {} worksheet(s): {}", names.len(), names.join(", "));

        let mut worksheets = Vec::with_capacity(names.len());
        for name in names {
            let grid = session.get_rows(spreadsheet_id, &name).await?;
            let sheet = Worksheet::from_grid(name, grid);
            tracing::debug!("Worksheet '{}': {} row(s)", sheet.name, sheet.rows.len());
            worksheets.push(sheet);
        }

        Ok(worksheets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockSheets {
        worksheets: Vec<(String, Vec<Vec<String>>)>,
        reject_auth: bool,
        auth_calls: Arc<Mutex<usize>>,
    }

    impl MockSheets {
        fn with_sheet(mut self, name: &str, grid: &[&[&str]]) -> Self {
            let grid = grid
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect();
            self.worksheets.push((name.to_string(), grid));
            self
        }
    }

    struct MockSession {
        worksheets: HashMap<String, Vec<Vec<String>>>,
        order: Vec<String>,
    }

    #[async_trait]
    impl SpreadsheetClient for MockSheets {
        type Session = MockSession;

        async fn authenticate(&self, _credential: &SheetCredential) -> Result<MockSession> {
            *self.auth_calls.lock().unwrap() += 1;
            if self.reject_auth {
                return Err(SyncError::auth("invalid_grant"));
            }
            Ok(MockSession {
                worksheets: self.worksheets.iter().cloned().collect(),
                order: self.worksheets.iter().map(|(n, _)| n.clone()).collect(),
            })
        }
    }

    #[async_trait]
    impl SheetSession for MockSession {
        async fn list_worksheets(&self, _spreadsheet_id: &str) -> Result<Vec<String>> {
            Ok(self.order.clone())
        }

        async fn get_rows(&self, _spreadsheet_id: &str, worksheet: &str) -> Result<Vec<Vec<String>>> {
            self.worksheets
                .get(worksheet)
                .cloned()
                .ok_or_else(|| SyncError::not_found(worksheet.to_string()))
        }
    }

    fn credential() -> SheetCredential {
        SheetCredential {
            client_email: "loader@example.iam.gserviceaccount.com".to_string(),
            private_key: "key".to_string(),
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_explicit_names_keep_configured_order() {
        let selection = WorksheetSelection {
            names: names(&["Workshops", "Talks"]),
            skip: Vec::new(),
            merge: true,
        };
        let resolved = selection.resolve(&names(&["Talks", "Workshops", "Template"])).unwrap();
        assert_eq!(resolved, names(&["Workshops", "Talks"]));
    }

    #[test]
    fn test_resolve_all_minus_skip_list() {
        let selection = WorksheetSelection {
            names: Vec::new(),
            skip: names(&["Template"]),
            merge: true,
        };
        let resolved = selection.resolve(&names(&["Template", "Talks", "Workshops"])).unwrap();
        assert_eq!(resolved, names(&["Talks", "Workshops"]));
    }

    #[test]
    fn test_resolve_without_merge_reads_first_only() {
        let selection = WorksheetSelection::default();
        let resolved = selection.resolve(&names(&["Talks", "Workshops"])).unwrap();
        assert_eq!(resolved, names(&["Talks"]));
    }

    #[test]
    fn test_resolve_unknown_worksheet_is_not_found() {
        let selection = WorksheetSelection {
            names: names(&["Missing"]),
            skip: Vec::new(),
            merge: true,
        };
        let err = selection.resolve(&names(&["Talks"])).unwrap_err();
        assert!(matches!(err, SyncError::NotFoundError { .. }));
    }

    #[tokio::test]
    async fn test_fetch_authenticates_once_and_strips_headers() {
        let sheets = MockSheets::default()
            .with_sheet("Talks", &[&["Title", "Room"], &["Talk 1", "101"]])
            .with_sheet("Workshops", &[&["Title", "Facilitator"], &["Workshop 1", "Ana"], &["Workshop 2", ""]]);
        let auth_calls = sheets.auth_calls.clone();
        let source = RecordSource::new(sheets);

        let selection = WorksheetSelection {
            names: Vec::new(),
            skip: Vec::new(),
            merge: true,
        };
        let worksheets = source.fetch(&credential(), "sheet-key", &selection).await.unwrap();

        assert_eq!(*auth_calls.lock().unwrap(), 1);
        assert_eq!(worksheets.len(), 2);
        assert_eq!(worksheets[0].name, "Talks");
        assert_eq!(worksheets[0].rows.len(), 1);
        assert_eq!(worksheets[1].rows.len(), 2);
        assert_eq!(worksheets[1].rows[0].get("Facilitator"), Some("Ana"));
    }

    #[tokio::test]
    async fn test_fetch_propagates_auth_error() {
        let sheets = MockSheets {
            reject_auth: true,
            ..MockSheets::default()
        };
        let source = RecordSource::new(sheets);

        let err = source
            .fetch(&credential(), "sheet-key", &WorksheetSelection::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::AuthError { .. }));
    }
}
