//! Column mappings: associations between a target (sheet, column) pair in the
//! spreadsheet template and an XML path in one registered source document.

/// A single mapping from a template column to an XML path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Target sheet name in the template
    pub sheet: String,
    /// Target column header in the template
    pub column: String,
    /// XML path to extract values from
    pub path: String,
    /// Identifier of the registered source document the path belongs to
    pub source_id: String,
}

impl ColumnMapping {
    pub fn new(
        sheet: impl Into<String>,
        column: impl Into<String>,
        path: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        ColumnMapping {
            sheet: sheet.into(),
            column: column.into(),
            path: path.into(),
            source_id: source_id.into(),
        }
    }
}

/// The active set of mappings.
///
/// At most one mapping exists per (sheet, column) pair: adding a mapping for
/// an already-mapped pair replaces the path and source document while keeping
/// the mapping's position (upsert semantics). Insertion order is preserved and
/// determines column order in extracted tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSet {
    mappings: Vec<ColumnMapping>,
}

impl MappingSet {
    pub fn new() -> Self {
        MappingSet::default()
    }

    /// Adds a mapping, replacing any existing mapping for the same
    /// (sheet, column) pair. Returns true if an existing mapping was replaced.
    pub fn upsert(&mut self, mapping: ColumnMapping) -> bool {
        for existing in &mut self.mappings {
            if existing.sheet == mapping.sheet && existing.column == mapping.column {
                existing.path = mapping.path;
                existing.source_id = mapping.source_id;
                return true;
            }
        }
        self.mappings.push(mapping);
        false
    }

    /// Removes and returns the most recently added mapping
    pub fn remove_last(&mut self) -> Option<ColumnMapping> {
        self.mappings.pop()
    }

    /// Removes every mapping
    pub fn clear(&mut self) {
        self.mappings.clear();
    }

    /// Removes every mapping that references the given source document,
    /// returning how many were removed
    pub(crate) fn remove_source(&mut self, source_id: &str) -> usize {
        let before = self.mappings.len();
        self.mappings.retain(|mapping| mapping.source_id != source_id);
        before - self.mappings.len()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.mappings.iter()
    }

    /// Groups this set's mappings for one source document by target sheet.
    /// Sheets appear in first-mapping order; columns in mapping order.
    pub(crate) fn for_source<'a>(&'a self, source_id: &str) -> Vec<(&'a str, Vec<(&'a str, &'a str)>)> {
        let mut sheets: Vec<(&str, Vec<(&str, &str)>)> = Vec::new();
        for mapping in &self.mappings {
            if mapping.source_id != source_id {
                continue;
            }
            let index = match sheets.iter().position(|(sheet, _)| *sheet == mapping.sheet) {
                Some(index) => index,
                None => {
                    sheets.push((&mapping.sheet, Vec::new()));
                    sheets.len() - 1
                }
            };
            sheets[index].1.push((&mapping.column, &mapping.path));
        }
        sheets
    }
}
