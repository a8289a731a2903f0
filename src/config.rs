use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::SheetRef;
use crate::error::ReconError;
use crate::reconcile::ComparisonColumns;
use crate::sheets::SheetSource;

pub const DEFAULT_CONFIG_FILE: &str = "checklist-recon.json";
pub const DEFAULT_REGISTRY_BASE: &str = "https://www.ebi.ac.uk/biosamples/schema-store/api/v2";
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Raw config file shape. Every field is optional; the defaults mirror
/// the AEGIS/ENA deployment this tool was written for.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub checklists: Option<Vec<ChecklistConfig>>,
    #[serde(default)]
    pub comparison: Option<ComparisonConfig>,
    #[serde(default)]
    pub direct_mapping: Option<DirectMappingConfig>,
    #[serde(default)]
    pub analysis: Option<AnalysisConfig>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChecklistConfig {
    pub name: String,
    pub sheet: String,
    #[serde(default)]
    pub gid: Option<String>,
    pub term_column: String,
    #[serde(default)]
    pub require_complete: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ComparisonConfig {
    pub sheet: String,
    #[serde(default)]
    pub gid: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DirectMappingConfig {
    pub checklist: String,
    pub name_column: String,
    pub mapping_column: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AnalysisConfig {
    pub checklist: String,
    pub flag_column: String,
    #[serde(default)]
    pub mandatory_fields: Option<Vec<String>>,
}

/// One term checklist to fetch, plus the column its terms live in.
#[derive(Debug, Clone)]
pub struct ChecklistSpec {
    pub source: SheetSource,
    pub term_column: String,
}

#[derive(Debug, Clone)]
pub struct ComparisonSpec {
    pub source: SheetSource,
    pub columns: ComparisonColumns,
}

#[derive(Debug, Clone)]
pub struct DirectMappingSpec {
    pub checklist: String,
    pub name_column: String,
    pub mapping_column: String,
}

/// Which checklist to analyze for new-term flags and mandatory-field
/// coverage, and against which mandatory list.
#[derive(Debug, Clone)]
pub struct AnalysisSpec {
    pub checklist: String,
    pub flag_column: String,
    pub mandatory_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub registry_base_url: String,
    pub page_size: u32,
    pub checklists: Vec<ChecklistSpec>,
    pub comparison: ComparisonSpec,
    pub direct_mapping: DirectMappingSpec,
    pub analysis: AnalysisSpec,
    pub output: PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and resolve. An explicit path must exist; with no path, the
    /// default file is used when present and the compiled-in defaults
    /// otherwise (the original deployment ran entirely on defaults).
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ReconError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ReconError::ConfigRead(config_path.clone()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|err| ReconError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ReconError> {
        let registry = config.registry.unwrap_or(RegistryConfig {
            base_url: None,
            page_size: None,
        });
        let registry_base_url = registry
            .base_url
            .unwrap_or_else(|| DEFAULT_REGISTRY_BASE.to_string());
        let page_size = registry.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(ReconError::ConfigParse(
                "registry.page_size must be positive".to_string(),
            ));
        }

        let checklists = match config.checklists {
            Some(entries) => entries
                .into_iter()
                .map(|entry| {
                    Ok(ChecklistSpec {
                        source: SheetSource {
                            name: entry.name,
                            sheet: parse_sheet(&entry.sheet, entry.gid.as_deref())?,
                            canonical_columns: None,
                            require_complete: entry.require_complete,
                        },
                        term_column: entry.term_column,
                    })
                })
                .collect::<Result<Vec<_>, ReconError>>()?,
            None => default_checklists(),
        };

        let comparison = match config.comparison {
            Some(entry) => {
                let labels = entry
                    .columns
                    .unwrap_or_else(default_comparison_labels);
                ComparisonSpec {
                    source: SheetSource {
                        name: "comparison".to_string(),
                        sheet: parse_sheet(&entry.sheet, entry.gid.as_deref())?,
                        canonical_columns: Some(labels.clone()),
                        require_complete: false,
                    },
                    columns: comparison_columns(labels)?,
                }
            }
            None => default_comparison()?,
        };

        let direct_mapping = match config.direct_mapping {
            Some(entry) => DirectMappingSpec {
                checklist: entry.checklist,
                name_column: entry.name_column,
                mapping_column: entry.mapping_column,
            },
            None => default_direct_mapping(),
        };

        let analysis = match config.analysis {
            Some(entry) => AnalysisSpec {
                checklist: entry.checklist,
                flag_column: entry.flag_column,
                mandatory_fields: entry
                    .mandatory_fields
                    .unwrap_or_else(default_mandatory_fields),
            },
            None => default_analysis(),
        };

        let output = PathBuf::from(config.output.unwrap_or_else(|| "reconciliation.tsv".to_string()));

        Ok(ResolvedConfig {
            registry_base_url,
            page_size,
            checklists,
            comparison,
            direct_mapping,
            analysis,
            output,
        })
    }
}

fn parse_sheet(sheet: &str, gid: Option<&str>) -> Result<SheetRef, ReconError> {
    let mut parsed: SheetRef = sheet.parse()?;
    if let Some(gid) = gid {
        parsed.gid = Some(gid.to_string());
    }
    Ok(parsed)
}

fn comparison_columns(labels: Vec<String>) -> Result<ComparisonColumns, ReconError> {
    let [term_a, term_b, decision, uniqueness, comment]: [String; 5] =
        labels.try_into().map_err(|labels: Vec<String>| {
            ReconError::ConfigParse(format!(
                "comparison.columns must list exactly 5 labels, got {}",
                labels.len()
            ))
        })?;
    Ok(ComparisonColumns {
        term_a,
        term_b,
        decision,
        uniqueness,
        comment,
    })
}

fn default_comparison_labels() -> Vec<String> {
    vec![
        "AEGIS label".to_string(),
        "ENA label".to_string(),
        "Decision".to_string(),
        "uniqueness".to_string(),
        "comment".to_string(),
    ]
}

fn default_checklists() -> Vec<ChecklistSpec> {
    vec![
        ChecklistSpec {
            source: SheetSource {
                name: "aegis_draft".to_string(),
                sheet: SheetRef::new(
                    "1EWNjbSQYVs-mnsysTYpWs-l1QoiE4nbPTQyXmCWli5Y",
                    Some("143021854"),
                ),
                canonical_columns: None,
                require_complete: false,
            },
            term_column: "ENA wish".to_string(),
        },
        ChecklistSpec {
            source: SheetSource {
                name: "ena_upload".to_string(),
                sheet: SheetRef::new("1C9Zzsa_27GjdIirOL3IwBBV9FvWudJXpfNP8PfYuWKM", Some("0")),
                canonical_columns: None,
                require_complete: false,
            },
            term_column: "ENA recommended".to_string(),
        },
    ]
}

fn default_comparison() -> Result<ComparisonSpec, ReconError> {
    let labels = default_comparison_labels();
    Ok(ComparisonSpec {
        source: SheetSource {
            name: "comparison".to_string(),
            sheet: SheetRef::new("1EWNjbSQYVs-mnsysTYpWs-l1QoiE4nbPTQyXmCWli5Y", Some("0")),
            canonical_columns: Some(labels.clone()),
            require_complete: false,
        },
        columns: comparison_columns(labels)?,
    })
}

fn default_analysis() -> AnalysisSpec {
    AnalysisSpec {
        checklist: "ena_upload".to_string(),
        flag_column: "Needs New Term in ENA".to_string(),
        mandatory_fields: default_mandatory_fields(),
    }
}

/// Sample fields ENA submission rejects without.
fn default_mandatory_fields() -> Vec<String> {
    [
        "collection date",
        "geographic location (country and/or sea)",
        "sample_alias",
        "sample_description",
        "sample_title",
        "scientific_name",
        "tax_id",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_direct_mapping() -> DirectMappingSpec {
    DirectMappingSpec {
        checklist: "ena_upload".to_string(),
        name_column: "ENA recommended".to_string(),
        mapping_column: "direct mapping".to_string(),
    }
}
