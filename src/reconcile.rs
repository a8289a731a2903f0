use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::ReconError;
use crate::table::ChecklistTable;

/// Labels of the five comparison-table columns, in output order.
#[derive(Debug, Clone)]
pub struct ComparisonColumns {
    pub term_a: String,
    pub term_b: String,
    pub decision: String,
    pub uniqueness: String,
    pub comment: String,
}

impl ComparisonColumns {
    pub fn labels(&self) -> [&str; 5] {
        [
            &self.term_a,
            &self.term_b,
            &self.decision,
            &self.uniqueness,
            &self.comment,
        ]
    }
}

/// One reviewer-annotated comparison entry. `index` is the row's ordinal
/// position in the source table. An absent term cell means the checklist
/// on that side has no corresponding term; it is preserved, not dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRow {
    pub index: usize,
    pub term_a: Option<String>,
    pub term_b: Option<String>,
    pub decision: Option<String>,
    pub uniqueness: Option<String>,
    pub comment: String,
}

/// Keep exactly the rows carrying a reviewer comment. An empty cell is
/// absent (see `ChecklistTable`), so only non-empty comments survive.
/// Zero surviving rows is a valid, silent result.
pub fn reconcile(
    table: &ChecklistTable,
    columns: &ComparisonColumns,
) -> Result<Vec<ComparisonRow>, ReconError> {
    let term_a = table.column_index(&columns.term_a)?;
    let term_b = table.column_index(&columns.term_b)?;
    let decision = table.column_index(&columns.decision)?;
    let uniqueness = table.column_index(&columns.uniqueness)?;
    let comment = table.column_index(&columns.comment)?;

    let cell = |row: &[Option<String>], index: usize| row.get(index).and_then(|c| c.clone());

    let mut kept = Vec::new();
    for (index, row) in table.rows().iter().enumerate() {
        let Some(comment) = cell(row, comment) else {
            continue;
        };
        kept.push(ComparisonRow {
            index,
            term_a: cell(row, term_a),
            term_b: cell(row, term_b),
            decision: cell(row, decision),
            uniqueness: cell(row, uniqueness),
            comment,
        });
    }
    Ok(kept)
}

/// Serialize the surviving rows as a tab-separated artifact: a header of
/// `index` plus the five configured labels, absent cells as empty
/// fields. The whole artifact is built in memory first, so a failed run
/// never leaves a partial file behind.
pub fn write_tsv(
    rows: &[ComparisonRow],
    columns: &ComparisonColumns,
    path: &Path,
) -> Result<(), ReconError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let labels = columns.labels();
    writer
        .write_record(["index", labels[0], labels[1], labels[2], labels[3], labels[4]])
        .map_err(|err| ReconError::Filesystem(err.to_string()))?;
    for row in rows {
        writer
            .write_record([
                row.index.to_string().as_str(),
                row.term_a.as_deref().unwrap_or(""),
                row.term_b.as_deref().unwrap_or(""),
                row.decision.as_deref().unwrap_or(""),
                row.uniqueness.as_deref().unwrap_or(""),
                &row.comment,
            ])
            .map_err(|err| ReconError::Filesystem(err.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ReconError::Filesystem(err.to_string()))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| ReconError::Filesystem(err.to_string()))?;
        }
    }
    fs::write(path, bytes).map_err(|err| ReconError::Filesystem(err.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn columns() -> ComparisonColumns {
        ComparisonColumns {
            term_a: "AEGIS label".to_string(),
            term_b: "ENA label".to_string(),
            decision: "Decision".to_string(),
            uniqueness: "uniqueness".to_string(),
            comment: "comment".to_string(),
        }
    }

    fn comparison_table() -> ChecklistTable {
        // Comments per row: "ok", absent, empty (also absent), "note".
        ChecklistTable::parse_csv(concat!(
            "AEGIS label,ENA label,Decision,uniqueness,comment\n",
            "soil depth,depth,keep,shared,ok\n",
            "ph,,drop,aegis only,\n",
            "elevation,elevation,keep,shared,\n",
            ",tax_id,add,ena only,note\n",
        ))
        .unwrap()
    }

    #[test]
    fn keeps_only_commented_rows_in_order() {
        let rows = reconcile(&comparison_table(), &columns()).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].term_a.as_deref(), Some("soil depth"));
        assert_eq!(rows[0].term_b.as_deref(), Some("depth"));
        assert_eq!(rows[0].decision.as_deref(), Some("keep"));
        assert_eq!(rows[0].uniqueness.as_deref(), Some("shared"));
        assert_eq!(rows[0].comment, "ok");

        assert_eq!(rows[1].index, 3);
        assert_eq!(rows[1].term_a, None);
        assert_eq!(rows[1].term_b.as_deref(), Some("tax_id"));
        assert_eq!(rows[1].comment, "note");
    }

    #[test]
    fn missing_comment_column_is_a_schema_error() {
        let table = ChecklistTable::parse_csv("a,b,c,d,e\n1,2,3,4,5\n").unwrap();
        let err = reconcile(&table, &columns()).unwrap_err();
        assert_matches!(err, ReconError::MissingColumn(_));
    }

    #[test]
    fn tsv_output_uses_tabs_even_with_commas_in_cells() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out.tsv");
        let rows = vec![ComparisonRow {
            index: 4,
            term_a: Some("geographic location (country and/or sea)".to_string()),
            term_b: None,
            decision: Some("keep, maybe".to_string()),
            uniqueness: Some("aegis only".to_string()),
            comment: "check with curators".to_string(),
        }];
        write_tsv(&rows, &columns(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "index\tAEGIS label\tENA label\tDecision\tuniqueness\tcomment\n\
             4\tgeographic location (country and/or sea)\t\tkeep, maybe\taegis only\tcheck with curators\n"
        );
    }
}
