use std::cell::Cell;
use std::rc::Rc;

use assert_matches::assert_matches;
use serde_json::json;

use checklist_recon::domain::{FieldRecord, SchemaEntry};
use checklist_recon::error::ReconError;
use checklist_recon::registry::{FieldRegistry, SchemaStoreClient};

fn record(name: &str, version: i64) -> FieldRecord {
    FieldRecord {
        name: name.to_string(),
        version,
        attributes: serde_json::Map::new(),
    }
}

struct PagedApi {
    pages: Vec<Vec<FieldRecord>>,
    schemas: Vec<SchemaEntry>,
    fetches: Rc<Cell<usize>>,
    fail_fetches_remaining: Cell<usize>,
    fail_once_on_page: Cell<Option<u32>>,
}

impl PagedApi {
    fn new(pages: Vec<Vec<FieldRecord>>) -> (Self, Rc<Cell<usize>>) {
        let fetches = Rc::new(Cell::new(0));
        (
            Self {
                pages,
                schemas: Vec::new(),
                fetches: fetches.clone(),
                fail_fetches_remaining: Cell::new(0),
                fail_once_on_page: Cell::new(None),
            },
            fetches,
        )
    }

    fn failing_first(pages: Vec<Vec<FieldRecord>>, failures: usize) -> (Self, Rc<Cell<usize>>) {
        let (api, fetches) = Self::new(pages);
        api.fail_fetches_remaining.set(failures);
        (api, fetches)
    }
}

impl SchemaStoreClient for PagedApi {
    fn fetch_fields_page(&self, page: u32, _size: u32) -> Result<Vec<FieldRecord>, ReconError> {
        self.fetches.set(self.fetches.get() + 1);
        let remaining = self.fail_fetches_remaining.get();
        if remaining > 0 {
            self.fail_fetches_remaining.set(remaining - 1);
            return Err(ReconError::RegistryStatus {
                status: 503,
                message: "registry unavailable".to_string(),
            });
        }
        if self.fail_once_on_page.get() == Some(page) {
            self.fail_once_on_page.set(None);
            return Err(ReconError::RegistryHttp("connection reset".to_string()));
        }
        Ok(self.pages.get(page as usize).cloned().unwrap_or_default())
    }

    fn fetch_schema_list(&self) -> Result<Vec<SchemaEntry>, ReconError> {
        Ok(self.schemas.clone())
    }
}

#[test]
fn pagination_example_merges_highest_version() {
    // Page 0: sex v1. Page 1: sex v2, age v1.
    let (api, _) = PagedApi::new(vec![
        vec![record("sex", 1)],
        vec![record("sex", 2), record("age", 1)],
    ]);
    let mut registry = FieldRegistry::new(api, 1);

    let dict = registry.field_dictionary().unwrap();
    assert_eq!(dict.len(), 2);
    assert_eq!(dict["sex"].version, 2);
    assert_eq!(dict["age"].version, 1);

    let list = registry.field_list().unwrap();
    assert_eq!(list, vec!["age", "sex"]);
}

#[test]
fn pagination_stops_on_short_page() {
    let (api, fetches) = PagedApi::new(vec![
        vec![record("a", 1), record("b", 1)],
        vec![record("c", 1)],
    ]);
    let mut registry = FieldRegistry::new(api, 2);

    let dict = registry.field_dictionary().unwrap();
    assert_eq!(dict.len(), 3);
    // Page 1 came back short, so page 2 was never requested.
    assert_eq!(fetches.get(), 2);
}

#[test]
fn dictionary_is_memoized() {
    let (api, fetches) = PagedApi::new(vec![vec![record("sex", 1)]]);
    let mut registry = FieldRegistry::new(api, 1000);

    let first = registry.field_dictionary().unwrap().clone();
    let after_first = fetches.get();
    let second = registry.field_dictionary().unwrap().clone();
    let list = registry.field_list().unwrap();

    assert_eq!(fetches.get(), after_first);
    assert_eq!(first.keys().collect::<Vec<_>>(), second.keys().collect::<Vec<_>>());
    assert_eq!(list, vec!["sex"]);
}

#[test]
fn failed_build_caches_nothing_and_is_retryable() {
    let (api, fetches) = PagedApi::failing_first(
        vec![vec![record("sex", 1), record("age", 1)], vec![record("tax_id", 1)]],
        3,
    );
    let mut registry = FieldRegistry::new(api, 2);

    // First three calls hit the injected failures; nothing is committed.
    for _ in 0..3 {
        let err = registry.field_dictionary().unwrap_err();
        assert_matches!(err, ReconError::RegistryStatus { status: 503, .. });
    }
    assert_eq!(fetches.get(), 3);

    // The retry rebuilds from page 0 and sees the full extent.
    let dict = registry.field_dictionary().unwrap();
    assert_eq!(dict.len(), 3);
    assert_eq!(fetches.get(), 5);
}

#[test]
fn page_one_failure_discards_page_zero_progress() {
    let (api, fetches) = PagedApi::new(vec![
        vec![record("sex", 1), record("age", 1)],
        vec![record("sex", 2)],
    ]);
    api.fail_once_on_page.set(Some(1));
    let mut registry = FieldRegistry::new(api, 2);

    let err = registry.field_dictionary().unwrap_err();
    assert_matches!(err, ReconError::RegistryHttp(_));
    assert_eq!(fetches.get(), 2);

    // The retry starts over from page 0, not from the failed page.
    let dict = registry.field_dictionary().unwrap();
    assert_eq!(fetches.get(), 4);
    assert_eq!(dict["sex"].version, 2);
    assert_eq!(dict.len(), 2);
}

#[test]
fn latest_field_returns_merged_record() {
    let page = json!({
        "_embedded": {
            "fields": [
                {"name": "sex", "version": 1, "description": "old"},
                {"name": "sex", "version": 2, "description": "new"},
            ]
        }
    });
    let records = checklist_recon::registry::parse_fields_page(&page).unwrap();
    let (api, _) = PagedApi::new(vec![records]);
    let mut registry = FieldRegistry::new(api, 1000);

    let record = registry.latest_field("sex").unwrap().unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.attributes["description"], "new");
    assert!(registry.latest_field("unknown").unwrap().is_none());
}

#[test]
fn schema_list_passes_through_without_touching_the_dictionary() {
    let (mut api, fetches) = PagedApi::new(vec![vec![record("sex", 1)]]);
    api.schemas = vec![SchemaEntry {
        id: "ERC000011".to_string(),
        accession: Some("ERC000011".to_string()),
        name: Some("default checklist".to_string()),
    }];
    let registry = FieldRegistry::new(api, 1000);

    let schemas = registry.schema_list().unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].id, "ERC000011");
    // Listing schemas never triggers a field-page fetch.
    assert_eq!(fetches.get(), 0);
}
