use anyhow::Result;

pub const TICKER: &str = "Ticker";
pub const MARKET_CAP: &str = "Market Cap";
pub const CHANGE: &str = "Change";

/// Column layout of the Finviz overview view, minus the rank column.
/// Used as the header when a query succeeds but the page carries no table.
pub const OVERVIEW_COLUMNS: [&str; 10] = [
    "Ticker", "Company", "Sector", "Industry", "Country", "Market Cap", "P/E", "Price",
    "Change", "Volume",
];

/// One ticker as returned by the screener. `cells` holds the raw text of every column
/// in header order; `market_cap` and `change` are the parsed numeric forms.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerRow {
    pub ticker: String,
    pub market_cap: f64,
    pub change: Option<f64>,
    pub cells: Vec<String>,
}

/// Header plus rows returned by a single filter query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<ScreenerRow>,
}

impl RowSet {
    /// Build a row set from raw table cells. Fails if a required column is absent.
    /// Rows without a usable ticker or market cap are dropped.
    pub fn from_cells(columns: Vec<String>, cells: Vec<Vec<String>>) -> Result<Self> {
        let ticker_idx = column_index(&columns, TICKER)?;
        let cap_idx = column_index(&columns, MARKET_CAP)?;
        let change_idx = column_index(&columns, CHANGE)?;

        let mut rows = Vec::with_capacity(cells.len());
        for row in cells {
            if row.len() != columns.len() {
                tracing::debug!(cells = row.len(), expected = columns.len(), "skipping ragged row");
                continue;
            }
            let ticker = row[ticker_idx].trim().to_string();
            if ticker.is_empty() {
                continue;
            }
            let Some(market_cap) = parse_market_cap(&row[cap_idx]) else {
                tracing::debug!(ticker = %ticker, raw = %row[cap_idx], "no market cap, dropping row");
                continue;
            };
            let change = parse_percent(&row[change_idx]);
            rows.push(ScreenerRow {
                ticker,
                market_cap,
                change,
                cells: row,
            });
        }

        Ok(Self { columns, rows })
    }

    pub fn default_columns() -> Vec<String> {
        OVERVIEW_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only rows whose market cap is at least `min`.
    pub fn retain_min_market_cap(mut self, min: f64) -> Self {
        self.rows.retain(|r| r.market_cap >= min);
        self
    }
}

fn column_index(columns: &[String], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| anyhow::anyhow!("screener response has no '{}' column", name))
}

/// Parse a Finviz market cap such as "12.34B" or "850.10M" into dollars.
pub fn parse_market_cap(raw: &str) -> Option<f64> {
    let s = raw.trim().replace(',', "");
    if s.is_empty() || s == "-" {
        return None;
    }
    let (number, multiplier) = match s.chars().last()? {
        'K' | 'k' => (&s[..s.len() - 1], 1e3),
        'M' | 'm' => (&s[..s.len() - 1], 1e6),
        'B' | 'b' => (&s[..s.len() - 1], 1e9),
        'T' | 't' => (&s[..s.len() - 1], 1e12),
        _ => (s.as_str(), 1.0),
    };
    let value = number.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value * multiplier)
}

/// Parse "5.67%" into the fraction 0.0567.
pub fn parse_percent(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let s = s.strip_suffix('%').unwrap_or(s);
    if s.is_empty() || s == "-" {
        return None;
    }
    let value = s.replace(',', "").parse::<f64>().ok()?;
    value.is_finite().then_some(value / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<String> {
        RowSet::default_columns()
    }

    fn raw(ticker: &str, cap: &str, change: &str) -> Vec<String> {
        vec![
            ticker, "Co", "Technology", "Software", "USA", cap, "20.1", "10.00", change, "1,000",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    #[test]
    fn test_parse_market_cap_suffixes() {
        assert_eq!(parse_market_cap("12.34B"), Some(12.34e9));
        assert_eq!(parse_market_cap("850.10M"), Some(850.10e6));
        assert_eq!(parse_market_cap("1.5T"), Some(1.5e12));
        assert_eq!(parse_market_cap("-"), None);
        assert_eq!(parse_market_cap(""), None);
        assert_eq!(parse_market_cap("abc"), None);
    }

    #[test]
    fn test_parse_percent() {
        let v = parse_percent("5.67%").unwrap();
        assert!((v - 0.0567).abs() < 1e-12);
        let v = parse_percent("-1.20%").unwrap();
        assert!((v + 0.012).abs() < 1e-12);
        assert_eq!(parse_percent("-"), None);
    }

    #[test]
    fn test_from_cells_drops_unparseable_caps() {
        let set = RowSet::from_cells(
            cols(),
            vec![raw("AAA", "12.34B", "5.67%"), raw("BBB", "-", "1.00%")],
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.rows[0].ticker, "AAA");
        assert_eq!(set.rows[0].cells[1], "Co");
    }

    #[test]
    fn test_from_cells_requires_columns() {
        let columns = vec!["Ticker".to_string(), "Price".to_string()];
        let err = RowSet::from_cells(columns, vec![]).unwrap_err();
        assert!(err.to_string().contains("Market Cap"));
    }

    #[test]
    fn test_missing_change_kept_as_none() {
        let set = RowSet::from_cells(cols(), vec![raw("AAA", "2B", "-")]).unwrap();
        assert_eq!(set.rows[0].change, None);
    }

    #[test]
    fn test_min_market_cap_is_inclusive() {
        let set = RowSet::from_cells(
            cols(),
            vec![
                raw("EXACT", "1B", "0%"),
                raw("SMALL", "999.99M", "0%"),
                raw("BIG", "3B", "0%"),
            ],
        )
        .unwrap()
        .retain_min_market_cap(1e9);
        let tickers: Vec<_> = set.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["EXACT", "BIG"]);
    }
}
