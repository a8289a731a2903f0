use std::collections::btree_map::Entry;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::domain::{FieldDictionary, FieldRecord, SchemaEntry};
use crate::error::ReconError;

pub trait SchemaStoreClient {
    fn fetch_fields_page(&self, page: u32, size: u32) -> Result<Vec<FieldRecord>, ReconError>;
    fn fetch_schema_list(&self) -> Result<Vec<SchemaEntry>, ReconError>;
}

#[derive(Clone)]
pub struct SchemaStoreHttpClient {
    client: Client,
    base_url: String,
}

impl SchemaStoreHttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ReconError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("checklist-recon/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ReconError::RegistryHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ReconError::RegistryHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
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
                    return Err(ReconError::RegistryHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ReconError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "schema-store request failed".to_string());
        Err(ReconError::RegistryStatus { status, message })
    }
}

impl SchemaStoreClient for SchemaStoreHttpClient {
    fn fetch_fields_page(&self, page: u32, size: u32) -> Result<Vec<FieldRecord>, ReconError> {
        let url = format!("{}/fields", self.base_url);
        debug!(%url, page, size, "fetching registry page");
        let response = self.send_with_retries(|| {
            self.client
                .get(&url)
                .query(&[("page", page.to_string()), ("size", size.to_string())])
        })?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| ReconError::RegistryHttp(err.to_string()))?;
        parse_fields_page(&body)
    }

    fn fetch_schema_list(&self) -> Result<Vec<SchemaEntry>, ReconError> {
        let url = format!("{}/schemas/list", self.base_url);
        debug!(%url, "fetching schema list");
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| ReconError::RegistryHttp(err.to_string()))?;
        Ok(parse_schema_list(&body))
    }
}

/// Pull the record list out of a `{"_embedded": {"fields": [...]}}` page
/// body. A body without the nested keys is an empty page, not an error.
pub fn parse_fields_page(body: &Value) -> Result<Vec<FieldRecord>, ReconError> {
    let Some(items) = body
        .get("_embedded")
        .and_then(|v| v.get("fields"))
        .and_then(|v| v.as_array())
    else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|item| {
            serde_json::from_value(item.clone())
                .map_err(|err| ReconError::RegistryHttp(format!("malformed field record: {err}")))
        })
        .collect()
}

/// Pull `(id, accession, name)` entries out of a
/// `{"_embedded": {"schemas": ...}}` body. The registry has served the
/// collection both as an object keyed by schema id and as a plain list,
/// so both shapes are accepted; entries without an id are skipped.
pub fn parse_schema_list(body: &Value) -> Vec<SchemaEntry> {
    let container = body.get("_embedded").and_then(|v| v.get("schemas"));
    let values: Vec<&Value> = match container {
        Some(Value::Object(map)) => map.values().collect(),
        Some(Value::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    };

    let mut entries = Vec::new();
    for value in values {
        let Some(obj) = value.as_object() else {
            continue;
        };
        let id = match obj.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => continue,
        };
        let text = |key: &str| {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(|v| v.to_string())
        };
        entries.push(SchemaEntry {
            id,
            accession: text("accession"),
            name: text("name"),
        });
    }
    entries
}

/// Paginated registry view with a memoized, merge-by-version dictionary.
///
/// The dictionary is built at most once per instance: the accumulator is
/// only committed after every page fetch succeeded, so a failed build
/// leaves the instance empty and a later call rebuilds from scratch.
pub struct FieldRegistry<A: SchemaStoreClient> {
    api: A,
    page_size: u32,
    dictionary: Option<FieldDictionary>,
}

impl<A: SchemaStoreClient> FieldRegistry<A> {
    pub fn new(api: A, page_size: u32) -> Self {
        Self {
            api,
            page_size,
            dictionary: None,
        }
    }

    pub fn field_dictionary(&mut self) -> Result<&FieldDictionary, ReconError> {
        let dict = match self.dictionary.take() {
            Some(dict) => dict,
            None => self.build_dictionary()?,
        };
        Ok(self.dictionary.insert(dict))
    }

    /// Field names in lexicographic ascending order.
    pub fn field_list(&mut self) -> Result<Vec<String>, ReconError> {
        Ok(self.field_dictionary()?.keys().cloned().collect())
    }

    /// The merged (highest-version) record for one field name.
    pub fn latest_field(&mut self, name: &str) -> Result<Option<&FieldRecord>, ReconError> {
        Ok(self.field_dictionary()?.get(name))
    }

    /// Registered schemas, fetched fresh each call (the listing is small
    /// and not part of the memoized dictionary).
    pub fn schema_list(&self) -> Result<Vec<SchemaEntry>, ReconError> {
        self.api.fetch_schema_list()
    }

    fn build_dictionary(&self) -> Result<FieldDictionary, ReconError> {
        let mut merged = FieldDictionary::new();
        let mut page = 0u32;
        loop {
            let records = self.api.fetch_fields_page(page, self.page_size)?;
            let fetched = records.len();
            for record in records {
                merge_record(&mut merged, record);
            }
            debug!(page, fetched, total = merged.len(), "merged registry page");
            if fetched == 0 || fetched < self.page_size as usize {
                break;
            }
            page += 1;
        }
        Ok(merged)
    }
}

/// Merge one record into the dictionary: insert when the name is new,
/// replace only when the incoming version is strictly greater. A
/// lower-or-equal duplicate is discarded silently.
pub fn merge_record(dict: &mut FieldDictionary, record: FieldRecord) {
    match dict.entry(record.name.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(record);
        }
        Entry::Occupied(mut slot) => {
            if record.version > slot.get().version {
                slot.insert(record);
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
