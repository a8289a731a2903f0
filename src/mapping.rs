use std::collections::BTreeMap;

use crate::error::ReconError;
use crate::table::ChecklistTable;

/// Build field name -> direct-mapping annotation from a normalized
/// checklist. Rows with either cell absent are dropped. The source is
/// not guaranteed name-unique: a repeated field name keeps the text from
/// the later row.
pub fn build_direct_mappings(
    table: &ChecklistTable,
    name_column: &str,
    mapping_column: &str,
) -> Result<BTreeMap<String, String>, ReconError> {
    let name_index = table.column_index(name_column)?;
    let mapping_index = table.column_index(mapping_column)?;

    let mut mappings = BTreeMap::new();
    for row in table.rows() {
        let name = row.get(name_index).and_then(|cell| cell.as_deref());
        let mapping = row.get(mapping_index).and_then(|cell| cell.as_deref());
        if let (Some(name), Some(mapping)) = (name, mapping) {
            mappings.insert(name.to_string(), mapping.to_string());
        }
    }
    Ok(mappings)
}
