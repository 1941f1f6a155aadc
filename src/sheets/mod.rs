//! Google Sheets export: credentials, authorization, and the clear-then-write sequence.

pub mod auth;
pub mod rest;

use crate::config::SheetsConfig;
use crate::table::DisplayTable;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("credentials file '{0}' not found")]
    CredentialsFileMissing(String),
    #[error("credentials environment variable '{0}' is not set")]
    CredentialsEnvMissing(String),
    #[error("credentials JSON parsing error: {0}")]
    MalformedCredentials(#[source] serde_json::Error),
    #[error("service account private key is unusable: {0}")]
    InvalidPrivateKey(String),
    #[error("spreadsheet '{0}' not found")]
    SpreadsheetNotFound(String),
    #[error("worksheet '{0}' not found")]
    WorksheetNotFound(String),
    #[error("Google API error ({status})")]
    Api { status: u16, body: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExportError {
    /// Follow-up advice logged after the error itself.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ExportError::CredentialsFileMissing(_) => {
                Some("Place the service account key JSON at the configured path")
            }
            ExportError::CredentialsEnvMissing(_) => {
                Some("Export the service account key JSON in the configured environment variable")
            }
            ExportError::MalformedCredentials(_) => {
                Some("Please check that your credentials JSON is properly formatted")
            }
            ExportError::InvalidPrivateKey(_) => {
                Some("The private_key field must hold the PKCS#8 PEM from the downloaded key file")
            }
            ExportError::SpreadsheetNotFound(_) => Some(
                "Make sure the spreadsheet exists and is shared with the service account email",
            ),
            ExportError::WorksheetNotFound(_) => {
                Some("Make sure the worksheet exists in your spreadsheet")
            }
            ExportError::Api { .. } | ExportError::Other(_) => None,
        }
    }

    /// Log the error, its hint, and the API response body when there is one.
    pub fn log(&self) {
        match self {
            ExportError::Api { body, .. } => {
                tracing::error!("{}", self);
                if !body.is_empty() {
                    tracing::error!("Response details: {}", body);
                }
            }
            ExportError::Other(e) => {
                tracing::error!("Unexpected error during export: {:#}", e);
            }
            _ => tracing::error!("{}", self),
        }
        if let Some(hint) = self.hint() {
            tracing::error!("{}", hint);
        }
    }
}

/// A tab inside a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub sheet_id: i64,
    pub title: String,
    pub row_count: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub rows_written: usize,
    pub columns_written: usize,
}

#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    /// Id of the first spreadsheet with this exact name, if any is visible.
    async fn find_spreadsheet(&self, name: &str) -> Result<Option<String>, ExportError>;
    async fn worksheets(&self, spreadsheet_id: &str) -> Result<Vec<Worksheet>, ExportError>;
    async fn clear(&self, spreadsheet_id: &str, worksheet: &Worksheet) -> Result<(), ExportError>;
    async fn resize(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        rows: usize,
        columns: usize,
    ) -> Result<(), ExportError>;
    /// Write `values` row by row starting at A1.
    async fn write_values(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        values: &[Vec<String>],
    ) -> Result<(), ExportError>;
}

/// Open the spreadsheet and worksheet, clear it, and write the table from A1.
/// Both lookups happen before anything is modified.
pub async fn export_table(
    service: &dyn SpreadsheetService,
    config: &SheetsConfig,
    table: &DisplayTable,
) -> Result<ExportReport, ExportError> {
    tracing::info!(spreadsheet = %config.spreadsheet, "opening spreadsheet");
    let spreadsheet_id = service
        .find_spreadsheet(&config.spreadsheet)
        .await?
        .ok_or_else(|| ExportError::SpreadsheetNotFound(config.spreadsheet.clone()))?;

    tracing::info!(worksheet = %config.worksheet, "accessing worksheet");
    let worksheet = service
        .worksheets(&spreadsheet_id)
        .await?
        .into_iter()
        .find(|w| w.title == config.worksheet)
        .ok_or_else(|| ExportError::WorksheetNotFound(config.worksheet.clone()))?;

    tracing::info!("clearing previous data from worksheet");
    service.clear(&spreadsheet_id, &worksheet).await?;

    let (rows, columns) = table.extent();
    if worksheet.row_count < rows || worksheet.column_count < columns {
        let new_rows = worksheet.row_count.max(rows);
        let new_cols = worksheet.column_count.max(columns);
        tracing::info!(rows = new_rows, columns = new_cols, "growing worksheet grid");
        service
            .resize(&spreadsheet_id, &worksheet, new_rows, new_cols)
            .await?;
    }

    tracing::info!(rows = table.rows.len(), "exporting table to Google Sheets");
    service
        .write_values(&spreadsheet_id, &worksheet, &table.to_values())
        .await?;

    Ok(ExportReport {
        spreadsheet_id,
        worksheet: worksheet.title,
        rows_written: table.rows.len(),
        columns_written: columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Find(String),
        Worksheets(String),
        Clear(String),
        Resize(usize, usize),
        Write(Vec<Vec<String>>),
    }

    struct FakeSheets {
        spreadsheets: Vec<(&'static str, &'static str)>,
        worksheets: Vec<Worksheet>,
        fail_write: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeSheets {
        fn new() -> Self {
            Self {
                spreadsheets: vec![("My Stock Screener", "sheet-123")],
                worksheets: vec![Worksheet {
                    sheet_id: 0,
                    title: "Sheet1".to_string(),
                    row_count: 1000,
                    column_count: 26,
                }],
                fail_write: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn mutated(&self) -> bool {
            self.calls()
                .iter()
                .any(|c| matches!(c, Call::Clear(_) | Call::Resize(..) | Call::Write(_)))
        }
    }

    #[async_trait]
    impl SpreadsheetService for FakeSheets {
        async fn find_spreadsheet(&self, name: &str) -> Result<Option<String>, ExportError> {
            self.record(Call::Find(name.to_string()));
            Ok(self
                .spreadsheets
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, id)| id.to_string()))
        }

        async fn worksheets(&self, spreadsheet_id: &str) -> Result<Vec<Worksheet>, ExportError> {
            self.record(Call::Worksheets(spreadsheet_id.to_string()));
            Ok(self.worksheets.clone())
        }

        async fn clear(&self, _: &str, worksheet: &Worksheet) -> Result<(), ExportError> {
            self.record(Call::Clear(worksheet.title.clone()));
            Ok(())
        }

        async fn resize(&self, _: &str, _: &Worksheet, rows: usize, columns: usize) -> Result<(), ExportError> {
            self.record(Call::Resize(rows, columns));
            Ok(())
        }

        async fn write_values(&self, _: &str, _: &Worksheet, values: &[Vec<String>]) -> Result<(), ExportError> {
            if self.fail_write {
                return Err(ExportError::Api {
                    status: 403,
                    body: "{\"error\":{\"message\":\"The caller does not have permission\"}}".to_string(),
                });
            }
            self.record(Call::Write(values.to_vec()));
            Ok(())
        }
    }

    fn table() -> DisplayTable {
        DisplayTable {
            header: vec!["Ticker".into(), "Market Cap".into(), "Change".into()],
            rows: vec![
                vec!["NVDA".into(), "3421.5B".into(), "2.31%".into()],
                vec!["PLTR".into(), "180.2B".into(), "-0.45%".into()],
            ],
        }
    }

    #[tokio::test]
    async fn test_export_clears_then_writes_from_origin() {
        let sheets = FakeSheets::new();
        let report = export_table(&sheets, &SheetsConfig::default(), &table())
            .await
            .unwrap();

        assert_eq!(report.spreadsheet_id, "sheet-123");
        assert_eq!(report.rows_written, 2);
        assert_eq!(
            sheets.calls(),
            vec![
                Call::Find("My Stock Screener".into()),
                Call::Worksheets("sheet-123".into()),
                Call::Clear("Sheet1".into()),
                Call::Write(table().to_values()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_spreadsheet_leaves_sheet_untouched() {
        let sheets = FakeSheets::new();
        let config = SheetsConfig {
            spreadsheet: "Nope".to_string(),
            ..SheetsConfig::default()
        };
        let err = export_table(&sheets, &config, &table()).await.unwrap_err();
        assert!(matches!(err, ExportError::SpreadsheetNotFound(ref n) if n == "Nope"));
        assert!(err.hint().unwrap().contains("shared with the service account"));
        assert!(!sheets.mutated());
    }

    #[tokio::test]
    async fn test_missing_worksheet_leaves_sheet_untouched() {
        let sheets = FakeSheets::new();
        let config = SheetsConfig {
            worksheet: "Daily".to_string(),
            ..SheetsConfig::default()
        };
        let err = export_table(&sheets, &config, &table()).await.unwrap_err();
        assert!(matches!(err, ExportError::WorksheetNotFound(ref n) if n == "Daily"));
        assert!(!sheets.mutated());
    }

    #[tokio::test]
    async fn test_small_grid_is_grown_before_write() {
        let mut sheets = FakeSheets::new();
        sheets.worksheets[0].row_count = 2;
        sheets.worksheets[0].column_count = 2;
        export_table(&sheets, &SheetsConfig::default(), &table())
            .await
            .unwrap();
        let calls = sheets.calls();
        assert_eq!(calls[3], Call::Resize(3, 3));
        assert!(matches!(calls[4], Call::Write(_)));
    }

    #[tokio::test]
    async fn test_api_error_surfaces_body() {
        let mut sheets = FakeSheets::new();
        sheets.fail_write = true;
        let err = export_table(&sheets, &SheetsConfig::default(), &table())
            .await
            .unwrap_err();
        match err {
            ExportError::Api { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("permission"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }
}
