use crate::error::ReconError;

/// A fetched checklist as a rectangular table. Cells are `None` when the
/// source cell was empty: CSV cannot distinguish an empty cell from a
/// missing one, so empty means absent throughout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ChecklistTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Parse CSV text, taking the first record as column names. Records
    /// with a field count different from the header are a hard error, so
    /// a positional rename can never silently misassign columns.
    pub fn parse_csv(text: &str) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let columns = reader
            .headers()
            .map_err(|err| ReconError::CsvParse(err.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| ReconError::CsvParse(err.to_string()))?;
            rows.push(
                record
                    .iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ReconError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ReconError::MissingColumn(name.to_string()))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|cell| cell.as_deref())
    }

    /// Overwrite the raw column names with a canonical list. The count
    /// must match exactly; anything else means the source layout drifted.
    pub fn rename_columns(&mut self, names: &[String]) -> Result<(), ReconError> {
        if names.len() != self.columns.len() {
            return Err(ReconError::SchemaMismatch {
                expected: names.len(),
                found: self.columns.len(),
            });
        }
        self.columns = names.to_vec();
        Ok(())
    }

    /// Drop data row 0. Used when the export embeds a human header row
    /// inside the data region. No-op on an already-empty table.
    pub fn drop_leading_row(&mut self) {
        if !self.rows.is_empty() {
            self.rows.remove(0);
        }
    }

    /// Keep only rows with every cell present. A row is either fully
    /// populated or gone, never partially null.
    pub fn retain_complete_rows(&mut self) {
        self.rows.retain(|row| row.iter().all(|cell| cell.is_some()));
    }
}
