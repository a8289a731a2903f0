use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::domain::{FieldRecord, SchemaEntry};
use crate::error::ReconError;
use crate::mapping::build_direct_mappings;
use crate::reconcile::{reconcile, write_tsv};
use crate::registry::{FieldRegistry, SchemaStoreClient};
use crate::sheets::{SheetExport, load_checklist};
use crate::table::ChecklistTable;
use crate::terms::{
    TermComparison, clean_terms, compare_term_sets, extract_flagged_terms, extract_terms,
};

#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    pub total: usize,
    pub names: Vec<String>,
    pub example: Option<FieldRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistSummary {
    pub name: String,
    pub rows: usize,
    pub raw_terms: usize,
    pub cleaned_terms: usize,
}

/// What the flagged checklist still needs from the registry: the terms
/// marked as missing, which of those the other checklists also want, and
/// how the checklist covers the mandatory submission fields.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub checklist: String,
    pub new_terms: Vec<String>,
    pub new_terms_shared: Vec<String>,
    pub mandatory_covered: Vec<String>,
    pub mandatory_missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub generated_at: String,
    pub field_count: usize,
    pub checklists: Vec<ChecklistSummary>,
    pub term_comparison: Option<TermComparison>,
    pub analysis: AnalysisSummary,
    pub direct_mappings: BTreeMap<String, String>,
    pub kept_rows: usize,
    pub output: String,
}

/// One run of the tool: a registry view plus a sheet-export client,
/// driven by the resolved config. Constructed once per invocation; the
/// only state it accumulates is the registry's memoized dictionary.
pub struct App<A: SchemaStoreClient, S: SheetExport> {
    registry: FieldRegistry<A>,
    sheets: S,
    config: ResolvedConfig,
}

impl<A: SchemaStoreClient, S: SheetExport> App<A, S> {
    pub fn new(fields_api: A, sheets: S, config: ResolvedConfig) -> Self {
        let registry = FieldRegistry::new(fields_api, config.page_size);
        Self {
            registry,
            sheets,
            config,
        }
    }

    /// Registry overview: total count, the first `limit` names, and one
    /// full example record (the named field, or the first one).
    pub fn field_summary(
        &mut self,
        limit: usize,
        example: Option<&str>,
    ) -> Result<FieldSummary, ReconError> {
        let (total, names) = {
            let dictionary = self.registry.field_dictionary()?;
            let names = dictionary.keys().take(limit).cloned().collect::<Vec<_>>();
            (dictionary.len(), names)
        };
        let example = match example {
            Some(name) => self.registry.latest_field(name)?.cloned(),
            None => match names.first() {
                Some(first) => self.registry.latest_field(first)?.cloned(),
                None => None,
            },
        };
        Ok(FieldSummary {
            total,
            names,
            example,
        })
    }

    /// The checklist schemas the registry currently serves.
    pub fn schema_list(&self) -> Result<Vec<SchemaEntry>, ReconError> {
        self.registry.schema_list()
    }

    fn analyze_flagged_terms(
        &self,
        tables: &[(String, ChecklistTable)],
        cleaned_lists: &[Vec<String>],
    ) -> Result<AnalysisSummary, ReconError> {
        let spec = &self.config.analysis;
        let position = tables
            .iter()
            .position(|(name, _)| *name == spec.checklist)
            .ok_or_else(|| ReconError::UnknownChecklist(spec.checklist.clone()))?;
        let (_, table) = &tables[position];
        let term_column = &self.config.checklists[position].term_column;

        let new_terms = clean_terms(&extract_flagged_terms(table, term_column, &spec.flag_column)?);
        let new_terms_shared = new_terms
            .iter()
            .filter(|term| {
                cleaned_lists
                    .iter()
                    .enumerate()
                    .any(|(i, list)| i != position && list.contains(*term))
            })
            .cloned()
            .collect();

        let own_terms = &cleaned_lists[position];
        let (mandatory_covered, mandatory_missing): (Vec<String>, Vec<String>) = spec
            .mandatory_fields
            .iter()
            .cloned()
            .partition(|field| own_terms.contains(field));

        Ok(AnalysisSummary {
            checklist: spec.checklist.clone(),
            new_terms,
            new_terms_shared,
            mandatory_covered,
            mandatory_missing,
        })
    }

    /// The full pipeline: registry summary, checklist fetches, term
    /// extraction and comparison, direct mappings, and the reviewer
    /// comparison artifact. The TSV is only written once everything
    /// upstream succeeded.
    pub fn run_reconciliation(&mut self) -> Result<ReconciliationReport, ReconError> {
        let field_count = self.registry.field_dictionary()?.len();
        info!(field_count, "registry dictionary built");

        let mut checklists = Vec::new();
        let mut tables: Vec<(String, ChecklistTable)> = Vec::new();
        let mut cleaned_lists: Vec<Vec<String>> = Vec::new();
        for spec in &self.config.checklists {
            let table = load_checklist(&self.sheets, &spec.source)?;
            let raw = extract_terms(&table, &spec.term_column)?;
            let cleaned = clean_terms(&raw);
            info!(
                checklist = %spec.source.name,
                rows = table.len(),
                terms = cleaned.len(),
                "extracted terms"
            );
            checklists.push(ChecklistSummary {
                name: spec.source.name.clone(),
                rows: table.len(),
                raw_terms: raw.len(),
                cleaned_terms: cleaned.len(),
            });
            tables.push((spec.source.name.clone(), table));
            cleaned_lists.push(cleaned);
        }

        let term_comparison = match cleaned_lists.as_slice() {
            [a, b, ..] => Some(compare_term_sets(a, b)),
            _ => None,
        };

        let analysis = self.analyze_flagged_terms(&tables, &cleaned_lists)?;
        info!(
            checklist = %analysis.checklist,
            new_terms = analysis.new_terms.len(),
            mandatory_missing = analysis.mandatory_missing.len(),
            "analyzed flagged terms"
        );

        let mapping_spec = &self.config.direct_mapping;
        let mapping_table = tables
            .iter()
            .find(|(name, _)| *name == mapping_spec.checklist)
            .map(|(_, table)| table)
            .ok_or_else(|| ReconError::UnknownChecklist(mapping_spec.checklist.clone()))?;
        let direct_mappings = build_direct_mappings(
            mapping_table,
            &mapping_spec.name_column,
            &mapping_spec.mapping_column,
        )?;

        let comparison_table = load_checklist(&self.sheets, &self.config.comparison.source)?;
        let rows = reconcile(&comparison_table, &self.config.comparison.columns)?;
        write_tsv(&rows, &self.config.comparison.columns, &self.config.output)?;
        info!(
            kept = rows.len(),
            total = comparison_table.len(),
            output = %self.config.output.display(),
            "wrote reconciliation artifact"
        );

        Ok(ReconciliationReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            field_count,
            checklists,
            term_comparison,
            analysis,
            direct_mappings,
            kept_rows: rows.len(),
            output: self.config.output.display().to_string(),
        })
    }
}
