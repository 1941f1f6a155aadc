use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub screener: ScreenerConfig,
    pub sheets: SheetsConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScreenerConfig {
    pub base_url: String,
    /// Filters shared by every query, by Finviz display name.
    pub base_filters: BTreeMap<String, String>,
    /// The filter whose option changes from one query to the next.
    pub variant_filter: String,
    pub variant_options: Vec<String>,
    pub min_market_cap: f64,
    pub request_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub max_pages: u32,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        let mut base_filters = BTreeMap::new();
        base_filters.insert("Sales growthqtr over qtr".to_string(), "Over 20%".to_string());
        Self {
            base_url: "https://finviz.com".to_string(),
            base_filters,
            variant_filter: "52-Week High/Low".to_string(),
            variant_options: vec!["0-10% below High".to_string(), "New High".to_string()],
            min_market_cap: 1e9,
            request_delay_ms: 500,
            request_timeout_ms: 15_000,
            max_pages: 50,
        }
    }
}

impl ScreenerConfig {
    /// One filter map per variant option: the base filters plus that option.
    pub fn queries(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.variant_options
            .iter()
            .map(|option| {
                let mut filters = self.base_filters.clone();
                filters.insert(self.variant_filter.clone(), option.clone());
                (option.clone(), filters)
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet: String,
    pub worksheet: String,
    pub sheets_api_base: String,
    pub drive_api_base: String,
    pub request_timeout_ms: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet: "My Stock Screener".to_string(),
            worksheet: "Sheet1".to_string(),
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            drive_api_base: "https://www.googleapis.com".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    File,
    Env,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CredentialsConfig {
    pub source: CredentialSource,
    /// File path when `source = "file"`, variable name when `source = "env"`.
    pub path_or_var_name: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            source: CredentialSource::File,
            path_or_var_name: "creds.json".to_string(),
        }
    }
}

impl CredentialsConfig {
    pub fn from_env_var(name: &str) -> Self {
        Self {
            source: CredentialSource::Env,
            path_or_var_name: name.to_string(),
        }
    }

    pub fn from_file(path: &str) -> Self {
        Self {
            source: CredentialSource::File,
            path_or_var_name: path.to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load the config file if present, otherwise fall back to built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        Self::load_env_file_from(Path::new(ENV_FILE));
    }

    pub fn load_env_file_from(path: &Path) {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        for (key, value) in parse_env_lines(&content) {
            if std::env::var(&key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}

/// Parse KEY=VALUE lines. Values may be quoted and may span the rest of the line,
/// so a one-line JSON blob survives intact.
fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    // Strip BOM if present (common on Windows-created files)
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim().trim_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim();
            let value = strip_quotes(value, '"')
                .or_else(|| strip_quotes(value, '\''))
                .unwrap_or(value);
            out.push((key.to_string(), value.to_string()));
        }
    }
    out
}

fn strip_quotes(value: &str, quote: char) -> Option<&str> {
    value
        .strip_prefix(quote)
        .and_then(|v| v.strip_suffix(quote))
}
