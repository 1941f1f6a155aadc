#![allow(dead_code)]

use screener_sheets::config::{Config, CredentialsConfig, ScreenerConfig, SheetsConfig};

pub const TEST_PEM: &str = include_str!("../fixtures/test_service_account.pem");

pub const NEAR_HIGH: &str = "ta_highlow52w_b0to10h,fa_salesqoq_o20";
pub const NEW_HIGH: &str = "ta_highlow52w_nh,fa_salesqoq_o20";

/// (ticker, market cap, change) rendered as a Finviz overview page.
pub fn screener_page(total: usize, first_rank: usize, rows: &[(&str, &str, &str)]) -> String {
    let mut html = String::from("<html><body>");
    html.push_str(&format!(
        "<div id=\"screener-total\">#{} / {} Total</div>",
        first_rank, total
    ));
    html.push_str(
        "<table class=\"styled-table-new is-rounded screener_table\"><thead><tr>\
         <th>No.</th><th>Ticker</th><th>Company</th><th>Sector</th><th>Industry</th>\
         <th>Country</th><th>Market Cap</th><th>P/E</th><th>Price</th><th>Change</th><th>Volume</th>\
         </tr></thead><tbody>",
    );
    for (i, (ticker, cap, change)) in rows.iter().enumerate() {
        html.push_str(&format!(
            "<tr class=\"styled-row\"><td>{}</td><td><a>{}</a></td><td>{} Inc</td><td>Technology</td>\
             <td>Software</td><td>USA</td><td>{}</td><td>21.40</td><td>101.20</td><td>{}</td><td>1,204,331</td></tr>",
            first_rank + i,
            ticker,
            ticker,
            cap,
            change
        ));
    }
    html.push_str("</tbody></table></body></html>");
    html
}

pub fn key_json(token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": "screener-test",
        "private_key_id": "k1",
        "private_key": TEST_PEM,
        "client_email": "exporter@screener-test.iam.gserviceaccount.com",
        "token_uri": token_uri,
    })
    .to_string()
}

/// Config pointing every remote at `base`, with credentials read from `creds_path`.
pub fn config_for(base: &str, creds_path: &str) -> Config {
    Config {
        screener: ScreenerConfig {
            base_url: base.to_string(),
            request_delay_ms: 0,
            ..ScreenerConfig::default()
        },
        sheets: SheetsConfig {
            sheets_api_base: base.to_string(),
            drive_api_base: base.to_string(),
            ..SheetsConfig::default()
        },
        credentials: CredentialsConfig::from_file(creds_path),
    }
}
