use super::auth::ServiceAccountAuth;
use super::{ExportError, SpreadsheetService, Worksheet};
use crate::config::SheetsConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Sheets v4 + Drive v3 client holding one bearer token for the run.
pub struct GoogleSheets {
    client: Client,
    access_token: String,
    sheets_base: String,
    drive_base: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: usize,
    #[serde(default)]
    column_count: usize,
}

impl GoogleSheets {
    /// Exchange a signed assertion for an access token and build the client.
    pub async fn connect(auth: &ServiceAccountAuth, config: &SheetsConfig) -> Result<Self, ExportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build Google HTTP client")?;

        tracing::info!(account = %auth.client_email(), "authorizing with Google");
        let assertion = auth.assertion(chrono::Utc::now().timestamp())?;
        let req = client
            .post(auth.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())]);
        let token: TokenResponse = send_json(req, "token exchange").await?;
        tracing::debug!(expires_in = ?token.expires_in, "access token issued");

        Ok(Self {
            client,
            access_token: token.access_token,
            sheets_base: config.sheets_api_base.clone(),
            drive_base: config.drive_api_base.clone(),
        })
    }

    fn sheets_url(&self, segments: &[&str]) -> Result<Url, ExportError> {
        endpoint(&self.sheets_base, segments)
    }
}

#[async_trait]
impl SpreadsheetService for GoogleSheets {
    async fn find_spreadsheet(&self, name: &str) -> Result<Option<String>, ExportError> {
        let url = endpoint(&self.drive_base, &["drive", "v3", "files"])?;
        let query = format!(
            "mimeType='{}' and name='{}' and trashed=false",
            SPREADSHEET_MIME,
            escape_query_literal(name)
        );
        let req = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
            ]);
        let list: FileList = send_json(req, "drive file search").await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn worksheets(&self, spreadsheet_id: &str) -> Result<Vec<Worksheet>, ExportError> {
        let url = self.sheets_url(&["v4", "spreadsheets", spreadsheet_id])?;
        let req = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "sheets.properties(sheetId,title,gridProperties)")]);
        let meta: SpreadsheetMeta = send_json(req, "spreadsheet metadata").await?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|s| Worksheet {
                sheet_id: s.properties.sheet_id,
                title: s.properties.title,
                row_count: s.properties.grid_properties.row_count,
                column_count: s.properties.grid_properties.column_count,
            })
            .collect())
    }

    async fn clear(&self, spreadsheet_id: &str, worksheet: &Worksheet) -> Result<(), ExportError> {
        let range = format!("{}:clear", a1_sheet(&worksheet.title));
        let url = self.sheets_url(&["v4", "spreadsheets", spreadsheet_id, "values", &range])?;
        let req = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({}));
        send_ok(req, "values clear").await
    }

    async fn resize(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        rows: usize,
        columns: usize,
    ) -> Result<(), ExportError> {
        let target = format!("{}:batchUpdate", spreadsheet_id);
        let url = self.sheets_url(&["v4", "spreadsheets", &target])?;
        let body = serde_json::json!({
            "requests": [{
                "updateSheetProperties": {
                    "properties": {
                        "sheetId": worksheet.sheet_id,
                        "gridProperties": { "rowCount": rows, "columnCount": columns },
                    },
                    "fields": "gridProperties.rowCount,gridProperties.columnCount",
                }
            }]
        });
        let req = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body);
        send_ok(req, "sheet resize").await
    }

    async fn write_values(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        values: &[Vec<String>],
    ) -> Result<(), ExportError> {
        let range = format!("{}!A1", a1_sheet(&worksheet.title));
        let url = self.sheets_url(&["v4", "spreadsheets", spreadsheet_id, "values", &range])?;
        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });
        let req = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body);
        send_ok(req, "values update").await
    }
}

/// Join path segments onto a base URL, percent-encoding each segment.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ExportError> {
    let mut url = Url::parse(base).with_context(|| format!("invalid API base URL: {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("API base URL cannot take a path: {}", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Sheet title quoted for A1 notation: `'Sheet1'`, with inner quotes doubled.
fn a1_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn send(req: RequestBuilder, what: &str) -> Result<reqwest::Response, ExportError> {
    let resp = req
        .send()
        .await
        .with_context(|| format!("{} request failed", what))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(what, %status, "Google API call failed");
        return Err(ExportError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder, what: &str) -> Result<T, ExportError> {
    let resp = send(req, what).await?;
    let parsed = resp
        .json()
        .await
        .with_context(|| format!("failed to parse {} response", what))?;
    Ok(parsed)
}

async fn send_ok(req: RequestBuilder, what: &str) -> Result<(), ExportError> {
    send(req, what).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint("https://sheets.googleapis.com", &["v4", "spreadsheets", "abc", "values", "'My Sheet'!A1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'My%20Sheet'!A1"
        );

        let url = endpoint("http://127.0.0.1:8080/", &["drive", "v3", "files"]).unwrap();
        assert_eq!(url.path(), "/drive/v3/files");
    }

    #[test]
    fn test_a1_sheet_quotes_titles() {
        assert_eq!(a1_sheet("Sheet1"), "'Sheet1'");
        assert_eq!(a1_sheet("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_query_literal_escaping() {
        assert_eq!(escape_query_literal("My Stock Screener"), "My Stock Screener");
        assert_eq!(escape_query_literal("O'Neil picks"), "O\\'Neil picks");
    }

    #[test]
    fn test_sheet_metadata_parses() {
        let meta: SpreadsheetMeta = serde_json::from_str(
            r#"{"sheets":[{"properties":{"sheetId":0,"title":"Sheet1","gridProperties":{"rowCount":1000,"columnCount":26}}},
                          {"properties":{"sheetId":77,"title":"Archive"}}]}"#,
        )
        .unwrap();
        assert_eq!(meta.sheets.len(), 2);
        assert_eq!(meta.sheets[0].properties.grid_properties.column_count, 26);
        assert_eq!(meta.sheets[1].properties.sheet_id, 77);
        assert_eq!(meta.sheets[1].properties.grid_properties.row_count, 0);
    }
}
