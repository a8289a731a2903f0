use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReconError;

/// One versioned field definition from the schema-store registry.
///
/// Everything beyond `name` and `version` (type, description, allowed
/// values) is registry-defined and passed through unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    pub version: i64,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Field name -> highest-version record. BTreeMap keeps the key order
/// lexicographic, which is the order `field_list` reports.
pub type FieldDictionary = BTreeMap<String, FieldRecord>;

/// One registered schema from the schema-store listing. Accession and
/// display name are optional in the registry payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub id: String,
    pub accession: Option<String>,
    pub name: Option<String>,
}

/// A Google Sheets worksheet reference: spreadsheet ID plus optional
/// worksheet `gid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRef {
    pub sheet_id: String,
    pub gid: Option<String>,
}

impl SheetRef {
    pub fn new(sheet_id: impl Into<String>, gid: Option<&str>) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            gid: gid.map(|g| g.to_string()),
        }
    }

    /// Public CSV export endpoint for this worksheet. The sheet must be
    /// shared for export; a 403/404 from this URL means it is not.
    pub fn export_url(&self) -> String {
        let mut url = format!(
            "https://docs.google.com/spreadsheets/d/{}/export?format=csv",
            self.sheet_id
        );
        if let Some(gid) = &self.gid {
            url.push_str("&gid=");
            url.push_str(gid);
        }
        url
    }
}

impl fmt::Display for SheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.gid {
            Some(gid) => write!(f, "{}#gid={gid}", self.sheet_id),
            None => write!(f, "{}", self.sheet_id),
        }
    }
}

impl FromStr for SheetRef {
    type Err = ReconError;

    /// Accepts either a full Google Sheets URL (gid in query or fragment)
    /// or a bare spreadsheet ID.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ReconError::InvalidSheetRef(value.to_string()));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let id_re = Regex::new(r"/spreadsheets/d/([\w-]+)").unwrap();
            let sheet_id = id_re
                .captures(trimmed)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| ReconError::InvalidSheetRef(value.to_string()))?;
            let gid_re = Regex::new(r"[?&#]gid=(\d+)").unwrap();
            let gid = gid_re
                .captures(trimmed)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());
            return Ok(Self { sheet_id, gid });
        }

        let is_valid = trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(ReconError::InvalidSheetRef(value.to_string()));
        }
        Ok(Self {
            sheet_id: trimmed.to_string(),
            gid: None,
        })
    }
}
