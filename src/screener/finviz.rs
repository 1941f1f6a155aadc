//! Finviz screener, overview view (`v=111`), scraped from the HTML table.
//!
//! Endpoint: /screener.ashx?v=111&f={codes}&r={offset}
//! Pages hold 20 rows; `r` is the 1-based index of the first row on the page.

use super::filters::FilterSet;
use super::types::RowSet;
use super::ScreenerSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

pub const PAGE_SIZE: usize = 20;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const RANK_COLUMN: &str = "No.";
const NO_RESULTS_MARKER: &str = "No results found";

pub struct FinvizScreener {
    client: Client,
    base_url: String,
    request_delay: Duration,
    max_pages: u32,
}

/// One parsed screener page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Total matches reported by the page, when it shows one.
    pub total: Option<usize>,
}

impl FinvizScreener {
    pub fn new(config: &crate::config::ScreenerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build Finviz HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_delay: Duration::from_millis(config.request_delay_ms),
            max_pages: config.max_pages.max(1),
        })
    }

    async fn fetch_page(&self, filters: &FilterSet, offset: usize) -> Result<String> {
        let url = format!("{}/screener.ashx", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("v", "111".to_string()),
                ("f", filters.query_value()),
                ("r", offset.to_string()),
            ])
            .send()
            .await
            .context("Finviz screener request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Finviz screener r={} ({}): {}", offset, status, truncate(&body, 200));
        }
        resp.text().await.context("failed to read Finviz response body")
    }
}

#[async_trait]
impl ScreenerSource for FinvizScreener {
    async fn fetch(&self, filters: &FilterSet) -> Result<RowSet> {
        let mut columns: Option<Vec<String>> = None;
        let mut cells: Vec<Vec<String>> = Vec::new();
        let mut offset = 1;
        let mut prev_first: Option<String> = None;

        for page_no in 0..self.max_pages {
            if page_no > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let html = self.fetch_page(filters, offset).await?;
            let page = parse_screener_page(&html)?;
            tracing::debug!(offset, rows = page.rows.len(), total = ?page.total, "screener page");

            // Finviz serves the last page again when asked past the end.
            let first = page.rows.first().and_then(|r| r.first()).cloned();
            if page_no > 0 && first.is_some() && first == prev_first {
                break;
            }
            prev_first = first;

            if columns.is_none() && !page.columns.is_empty() {
                columns = Some(page.columns);
            }
            let n = page.rows.len();
            cells.extend(page.rows);

            let reached_total = page.total.is_some_and(|t| cells.len() >= t);
            if n < PAGE_SIZE || reached_total {
                break;
            }
            if page_no + 1 == self.max_pages {
                tracing::warn!(max_pages = self.max_pages, "screener page limit reached, results truncated");
            }
            offset += PAGE_SIZE;
        }

        RowSet::from_cells(columns.unwrap_or_else(RowSet::default_columns), cells)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector '{}': {:?}", css, e))
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Parse one screener page. Public for unit testing with fixtures.
pub fn parse_screener_page(html: &str) -> Result<Page> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let tr_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;
    let thead_sel = selector("thead th")?;

    let total = parse_total(&document)?;

    for table in document.select(&table_sel) {
        let mut header: Vec<String> = table.select(&thead_sel).map(cell_text).collect();
        let mut rows_iter = table.select(&tr_sel).peekable();
        if header.is_empty() {
            if let Some(first) = rows_iter.peek() {
                header = first.select(&cell_sel).map(cell_text).collect();
            }
        }
        if !(header.iter().any(|h| h == "Ticker") && header.iter().any(|h| h == "Market Cap")) {
            continue;
        }

        let rank_idx = header.iter().position(|h| h == RANK_COLUMN);
        let mut rows = Vec::new();
        for tr in rows_iter {
            let row: Vec<String> = tr.select(&cell_sel).map(cell_text).collect();
            if row.len() != header.len() || row == header {
                continue;
            }
            rows.push(drop_column(row, rank_idx));
        }

        return Ok(Page {
            columns: drop_column(header, rank_idx),
            rows,
            total,
        });
    }

    let text = document.root_element().text().collect::<String>();
    if total == Some(0) || text.contains(NO_RESULTS_MARKER) {
        return Ok(Page {
            total: Some(0),
            ..Page::default()
        });
    }
    anyhow::bail!("screener results table not found in Finviz response")
}

fn drop_column(mut row: Vec<String>, idx: Option<usize>) -> Vec<String> {
    if let Some(i) = idx {
        if i < row.len() {
            row.remove(i);
        }
    }
    row
}

/// Reads the "#1 / 57 Total" counter (or the older "Total: 57 #1" form).
fn parse_total(document: &Html) -> Result<Option<usize>> {
    let total_sel = selector("#screener-total, td.count-text")?;
    let Some(el) = document.select(&total_sel).next() else {
        return Ok(None);
    };
    Ok(parse_total_text(&cell_text(el)))
}

fn parse_total_text(text: &str) -> Option<usize> {
    let candidate = if let Some((_, rest)) = text.split_once("Total:") {
        rest.split_whitespace().next()?
    } else {
        let before = text.split("Total").next()?;
        before.rsplit('/').next()?.trim()
    };
    candidate.replace(',', "").trim().parse().ok()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
