//! fetch → merge → format → export, one pass per invocation.

use crate::config::{Config, ScreenerConfig};
use crate::screener::filters::FilterSet;
use crate::screener::types::RowSet;
use crate::screener::ScreenerSource;
use crate::sheets::auth::{ServiceAccountAuth, ServiceAccountKey, SCOPES};
use crate::sheets::rest::GoogleSheets;
use crate::sheets::{export_table, ExportError, ExportReport, SpreadsheetService};
use crate::table::{self, DisplayTable, MergeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Export,
    /// Print the table instead of touching the spreadsheet.
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub queries: usize,
    pub queries_succeeded: usize,
    pub rows: usize,
    pub table: DisplayTable,
    pub export: Option<ExportReport>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl PipelineError {
    pub fn log(&self) {
        match self {
            PipelineError::Merge(e) => tracing::error!("{}; skipping export", e),
            PipelineError::Export(e) => e.log(),
        }
    }
}

/// Run every configured query. A failed query is logged and left out.
/// Each successful row set has rows below the minimum market cap removed.
pub async fn fetch_all(source: &dyn ScreenerSource, config: &ScreenerConfig) -> Vec<RowSet> {
    let mut sets = Vec::new();
    for (option, filters) in config.queries() {
        tracing::info!(filter = %config.variant_filter, option = %option, "running screener query");

        let filter_set = match FilterSet::from_names(&filters) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(option = %option, error = %e, "failed for filter option");
                continue;
            }
        };

        match source.fetch(&filter_set).await {
            Ok(set) => {
                let fetched = set.len();
                let set = set.retain_min_market_cap(config.min_market_cap);
                tracing::info!(
                    option = %option,
                    count = set.len(),
                    below_min_cap = fetched - set.len(),
                    "retrieved records"
                );
                sets.push(set);
            }
            Err(e) => {
                let error = format!("{:#}", e);
                tracing::error!(option = %option, error = %error, "failed for filter option");
            }
        }
    }
    sets
}

/// Merge the row sets and render display strings.
pub fn clean(sets: Vec<RowSet>) -> Result<DisplayTable, MergeError> {
    tracing::info!(sets = sets.len(), "merging and cleaning data");
    let merged = table::merge(sets)?;
    tracing::info!(tickers = merged.len(), "final dataset ready");
    Ok(merged.to_display())
}

/// Load credentials, authorize, and write the table to the configured worksheet.
pub async fn export(config: &Config, table: &DisplayTable) -> Result<ExportReport, ExportError> {
    tracing::info!("starting Google Sheets export");
    let key = ServiceAccountKey::load(&config.credentials)?;
    let auth = ServiceAccountAuth::new(key, &SCOPES)?;
    let sheets = GoogleSheets::connect(&auth, &config.sheets).await?;
    export_to(&sheets, config, table).await
}

pub async fn export_to(
    service: &dyn SpreadsheetService,
    config: &Config,
    table: &DisplayTable,
) -> Result<ExportReport, ExportError> {
    let report = export_table(service, &config.sheets, table).await?;
    tracing::info!(
        spreadsheet = %config.sheets.spreadsheet,
        worksheet = %report.worksheet,
        rows = report.rows_written,
        "data successfully exported to Google Sheets"
    );
    Ok(report)
}

pub async fn run(
    config: &Config,
    source: &dyn ScreenerSource,
    mode: RunMode,
) -> Result<RunSummary, PipelineError> {
    let queries = config.screener.variant_options.len();
    let sets = fetch_all(source, &config.screener).await;
    let queries_succeeded = sets.len();
    let table = clean(sets)?;

    let export = match mode {
        RunMode::Export => Some(export(config, &table).await?),
        RunMode::DryRun => {
            println!("{}", table.render_plain());
            None
        }
    };

    Ok(RunSummary {
        queries,
        queries_succeeded,
        rows: table.rows.len(),
        table,
        export,
    })
}
