//! Merge and clean screener results into the table that gets exported.

use crate::screener::types::{RowSet, ScreenerRow, CHANGE, MARKET_CAP};
use std::collections::HashSet;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MergeError {
    /// Every filter query failed, so there is nothing trustworthy to export.
    #[error("no screener query succeeded; nothing to merge")]
    NoSuccessfulFetch,
}

/// Merged rows: unique tickers, sorted by market cap descending.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<ScreenerRow>,
}

/// Display strings ready to be written to a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DisplayTable {
    /// Header followed by data rows, as a single rectangle.
    pub fn to_values(&self) -> Vec<Vec<String>> {
        std::iter::once(self.header.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }

    /// Dimensions of `to_values()`: (rows, columns).
    pub fn extent(&self) -> (usize, usize) {
        (self.rows.len() + 1, self.header.len())
    }

    /// Space-aligned text rendering for terminal output.
    pub fn render_plain(&self) -> String {
        let values = self.to_values();
        let mut widths = vec![0usize; self.header.len()];
        for row in &values {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        values
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&widths)
                    .map(|(cell, &w)| format!("{:<w$}", cell, w = w))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Concatenate row sets, keep the first row seen for each ticker, then sort by
/// market cap descending. The sort is stable, so equal caps keep arrival order.
///
/// The header comes from the first row set that has one. Rows are realigned to it
/// by column name, so row sets with a different column order still merge cleanly.
pub fn merge(sets: Vec<RowSet>) -> Result<ResultTable, MergeError> {
    if sets.is_empty() {
        return Err(MergeError::NoSuccessfulFetch);
    }

    let columns = sets
        .iter()
        .find(|s| !s.columns.is_empty())
        .map(|s| s.columns.clone())
        .unwrap_or_else(RowSet::default_columns);

    let mut seen: HashSet<String> = HashSet::new();
    let mut rows: Vec<ScreenerRow> = Vec::new();
    for set in sets {
        let same_layout = set.columns == columns;
        for mut row in set.rows {
            if !seen.insert(row.ticker.clone()) {
                continue;
            }
            if !same_layout {
                row.cells = realign(&set.columns, &columns, row.cells);
            }
            rows.push(row);
        }
    }

    rows.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap));

    Ok(ResultTable { columns, rows })
}

fn realign(from: &[String], to: &[String], cells: Vec<String>) -> Vec<String> {
    to.iter()
        .map(|name| {
            from.iter()
                .position(|c| c == name)
                .and_then(|i| cells.get(i).cloned())
                .unwrap_or_default()
        })
        .collect()
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render Market Cap and Change as display strings; other cells pass through.
    pub fn to_display(&self) -> DisplayTable {
        let cap_idx = self.columns.iter().position(|c| c == MARKET_CAP);
        let change_idx = self.columns.iter().position(|c| c == CHANGE);

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = row.cells.clone();
                if let Some(i) = cap_idx.filter(|&i| i < cells.len()) {
                    cells[i] = format_market_cap(row.market_cap);
                }
                if let Some(i) = change_idx.filter(|&i| i < cells.len()) {
                    cells[i] = row.change.map(format_change).unwrap_or_default();
                }
                cells
            })
            .collect();

        DisplayTable {
            header: self.columns.clone(),
            rows,
        }
    }
}

/// 12_340_000_000 -> "12.34B"
pub fn format_market_cap(market_cap: f64) -> String {
    format!("{}B", format_rounded(market_cap / 1e9))
}

/// 0.0567 -> "5.67%"
///
/// Values that round to zero always print as "0.0%", never "-0.0%".
pub fn format_change(change: f64) -> String {
    format!("{}%", format_rounded(change * 100.0))
}

/// Round to two decimals and print with trailing zeros trimmed, always keeping
/// one decimal digit: 12.30 -> "12.3", 12.00 -> "12.0".
fn format_rounded(value: f64) -> String {
    let mut s = format!("{:.2}", value);
    if s == "-0.00" {
        s = "0.00".to_string();
    }
    while s.ends_with('0') && !s.ends_with(".0") {
        s.pop();
    }
    s
}
