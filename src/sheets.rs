use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::SheetRef;
use crate::error::ReconError;
use crate::table::ChecklistTable;

pub trait SheetExport {
    fn fetch_csv(&self, sheet: &SheetRef) -> Result<String, ReconError>;
}

#[derive(Clone)]
pub struct GoogleSheetsHttpClient {
    client: Client,
}

impl GoogleSheetsHttpClient {
    pub fn new() -> Result<Self, ReconError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("checklist-recon/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ReconError::SheetHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ReconError::SheetHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, ReconError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ReconError::SheetHttp(err.to_string()));
                }
            }
        }
    }
}

impl SheetExport for GoogleSheetsHttpClient {
    fn fetch_csv(&self, sheet: &SheetRef) -> Result<String, ReconError> {
        let url = sheet.export_url();
        debug!(%url, "fetching sheet export");
        let response = self.send_with_retries(|| self.client.get(&url))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            // A 403/404 usually means the sheet is not shared for export.
            let message = response
                .text()
                .unwrap_or_else(|_| "sheet export request failed".to_string());
            return Err(ReconError::SheetStatus { status, message });
        }
        response
            .text()
            .map_err(|err| ReconError::SheetHttp(err.to_string()))
    }
}

/// One configured checklist source: where to fetch it and how to
/// normalize it.
#[derive(Debug, Clone)]
pub struct SheetSource {
    pub name: String,
    pub sheet: SheetRef,
    /// When set, the raw export keeps its real header in data row 0:
    /// overwrite the column names with these and drop that row.
    pub canonical_columns: Option<Vec<String>>,
    /// Strict row filter: drop any row with an absent cell in any column.
    pub require_complete: bool,
}

/// Fetch and normalize one checklist. No partial table is ever returned;
/// any fetch or parse failure propagates.
pub fn load_checklist<C: SheetExport>(
    client: &C,
    source: &SheetSource,
) -> Result<ChecklistTable, ReconError> {
    let text = client.fetch_csv(&source.sheet)?;
    let mut table = ChecklistTable::parse_csv(&text)?;
    if let Some(columns) = &source.canonical_columns {
        table.rename_columns(columns)?;
        table.drop_leading_row();
    }
    if source.require_complete {
        table.retain_complete_rows();
    }
    debug!(
        source = %source.name,
        rows = table.len(),
        "loaded checklist"
    );
    Ok(table)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
