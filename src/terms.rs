use std::collections::BTreeSet;

use regex::Regex;
use serde::Serialize;

use crate::error::ReconError;
use crate::table::ChecklistTable;

/// Values of the named column in source row order. Absent cells are
/// skipped; duplicates are kept (deduplication is the caller's call).
pub fn extract_terms(table: &ChecklistTable, column: &str) -> Result<Vec<String>, ReconError> {
    let index = table.column_index(column)?;
    Ok(table
        .rows()
        .iter()
        .filter_map(|row| row.get(index).and_then(|cell| cell.clone()))
        .collect())
}

/// Values of `value_column` for rows whose `flag_column` cell is truthy.
/// The curators record flags inconsistently (`TRUE`, `yes`, `1`, ...),
/// so anything not recognized as truthy counts as unflagged.
pub fn extract_flagged_terms(
    table: &ChecklistTable,
    value_column: &str,
    flag_column: &str,
) -> Result<Vec<String>, ReconError> {
    let value_index = table.column_index(value_column)?;
    let flag_index = table.column_index(flag_column)?;
    Ok(table
        .rows()
        .iter()
        .filter(|row| {
            row.get(flag_index)
                .and_then(|cell| cell.as_deref())
                .is_some_and(is_truthy)
        })
        .filter_map(|row| row.get(value_index).and_then(|cell| cell.clone()))
        .collect())
}

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}

/// Clean a raw term list the way the checklist curators write it:
/// placeholder non-terms are dropped, and a `term + annotation` cell
/// keeps only the part before the first `+` (quotes stripped, trimmed).
/// Returns a deduplicated, sorted list.
pub fn clean_terms(terms: &[String]) -> Vec<String> {
    let non_terms = Regex::new(r"(?i)^\s*(\?|TBD|N\.A\.|N\.A\.\?|eh\?|not_needed)\s*$").unwrap();
    let mut cleaned = BTreeSet::new();
    for term in terms {
        if non_terms.is_match(term) {
            continue;
        }
        let value = match term.split_once('+') {
            Some((head, _)) => head.replace('"', ""),
            None => term.clone(),
        };
        let value = value.trim();
        if !value.is_empty() {
            cleaned.insert(value.to_string());
        }
    }
    cleaned.into_iter().collect()
}

/// Set comparison between two cleaned term lists.
#[derive(Debug, Clone, Serialize)]
pub struct TermComparison {
    pub common: Vec<String>,
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
}

pub fn compare_term_sets(a: &[String], b: &[String]) -> TermComparison {
    let set_a: BTreeSet<&String> = a.iter().collect();
    let set_b: BTreeSet<&String> = b.iter().collect();
    TermComparison {
        common: set_a.intersection(&set_b).map(|t| (*t).clone()).collect(),
        only_in_a: set_a.difference(&set_b).map(|t| (*t).clone()).collect(),
        only_in_b: set_b.difference(&set_a).map(|t| (*t).clone()).collect(),
    }
}
