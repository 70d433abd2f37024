//! Column-oriented tables produced by extraction, plus the row aligner and
//! the cross-source merger.
//!
//! Rows carry no record semantics: row *i* of two columns only means "the
//! i-th match of each column's independent document-order traversal". XML has
//! no inherent notion of records unless paths share a repeating ancestor,
//! which is not enforced here.

use std::collections::HashMap;

/// A single extracted column: target header name plus the cell values in
/// extraction order. `None` marks an absent attribute or alignment padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<String>>,
}

/// A rectangular-after-alignment table of named columns, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// Appends a column unless one with the same name already exists
    /// (first writer wins). Returns true if the column was added.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<String>>) -> bool {
        let name = name.into();
        if self.column(&name).is_some() {
            return false;
        }
        self.columns.push(Column { name, values });
        true
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns true if the table has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Natural row count: the longest column's length
    pub fn row_count(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.values.len())
            .max()
            .unwrap_or(0)
    }

    /// Pads every column at the tail with `None` up to `target_rows`.
    ///
    /// The pipeline always passes a target at least as long as every column;
    /// if that invariant is ever violated the longer column is truncated
    /// rather than failing the export.
    pub fn align(&mut self, target_rows: usize) {
        for column in &mut self.columns {
            column.values.resize(target_rows, None);
        }
    }
}

/// Merges per-document tables into one table per sheet by column union.
///
/// Documents are folded in registration order: a sheet seen for the first
/// time is adopted verbatim; for a sheet already present only columns with
/// new names are appended. A column written by an earlier document is never
/// overwritten by a later one.
pub fn merge(per_document: Vec<HashMap<String, Table>>) -> HashMap<String, Table> {
    let mut merged = HashMap::<String, Table>::new();
    for tables in per_document {
        for (sheet, table) in tables {
            match merged.get_mut(&sheet) {
                Some(existing) => {
                    for column in table.columns {
                        existing.push_column(column.name, column.values);
                    }
                }
                None => {
                    merged.insert(sheet, table);
                }
            }
        }
    }
    merged
}
