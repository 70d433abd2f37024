//! Export pipeline.
//!
//! Runs the whole chain in one pass: extract every mapped column from its
//! source document, pad each sheet's columns to a common row count, merge
//! the per-document tables, fill the template, and only then write the
//! output file. A failure before that last step leaves no partial file
//! behind.

use crate::document::query;
use crate::error::ResultMessage;
use crate::error::SheetFillError;
use crate::spreadsheet::template::Template;
use crate::spreadsheet::writer;
use crate::table::merge;
use crate::table::Table;
use crate::workspace::Workspace;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

/// Errors that stop an export before any file is written
#[derive(Error, Debug)]
pub enum ExportError {
    /// Export was requested with an empty mapping set
    #[error("No column mappings are defined")]
    NoActiveMappings,
}

/// How the extraction of one mapped column went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOutcome {
    /// The path was evaluated; `rows` values were pulled out
    Extracted { rows: usize },
    /// The path could not be evaluated; the column was left empty
    Failed { reason: String },
}

/// Per-mapping record in the export report
#[derive(Debug, Clone)]
pub struct ColumnReport {
    pub source: String,
    pub sheet: String,
    pub column: String,
    pub path: String,
    pub outcome: ColumnOutcome,
}

/// What an export produced. One failed column does not fail the export;
/// it shows up here instead, with its column written empty.
#[derive(Debug)]
pub struct ExportReport {
    /// Where the filled workbook was written
    pub output_path: PathBuf,
    /// One entry per mapping, in registration order per source
    pub columns: Vec<ColumnReport>,
    /// Number of columns matched to a template header and written
    pub written: usize,
    /// (sheet, column) pairs whose header the template does not have
    pub unmatched: Vec<(String, String)>,
    /// Mapped sheet names the template does not have
    pub ignored_sheets: Vec<String>,
}

/// Fills the template at `template_path` with the workspace's mapped data
/// and writes the result to `output_path`.
///
/// An unreadable or broken template is fatal, as is an empty mapping set.
/// Per-column extraction failures are not: the run continues and reports
/// them in the returned [`ExportReport`].
pub fn export(
    workspace: &Workspace,
    template_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<ExportReport, SheetFillError> {
    if workspace.mappings().is_empty() {
        Err(ExportError::NoActiveMappings)?;
    }
    let mut template = Template::open(template_path)?;
    let (tables, columns) = extract_tables(workspace);
    let (bytes, summary) = writer::write_tables(&mut template, &tables)?;

    let output_path = output_path.as_ref().to_path_buf();
    std::fs::write(&output_path, bytes)
        .map_err(SheetFillError::IoError)
        .with_prefix(&format!("Cannot write output '{}'", output_path.display()))?;
    debug!(path = %output_path.display(), written = summary.written, "Export complete");

    Ok(ExportReport {
        output_path,
        columns,
        written: summary.written,
        unmatched: summary.unmatched,
        ignored_sheets: summary.ignored_sheets,
    })
}

/// Builds the merged per-sheet tables from every source document.
///
/// Documents contribute in registration order, so when two sources map the
/// same (sheet, column) the earlier one keeps it. Within a sheet every
/// column is padded to the longest column of that sheet across all sources,
/// which keeps merged rows aligned.
fn extract_tables(workspace: &Workspace) -> (HashMap<String, Table>, Vec<ColumnReport>) {
    let mut reports = Vec::new();
    let mut per_document = Vec::new();
    for source in workspace.documents() {
        let mut tables: HashMap<String, Table> = HashMap::new();
        for (sheet, columns) in workspace.mappings().for_source(&source.id) {
            let table = tables.entry(sheet.to_owned()).or_default();
            for (column, path) in columns {
                let outcome = match query::extract_column(source.document(), path) {
                    Ok(values) => {
                        let rows = values.len();
                        table.push_column(column, values);
                        ColumnOutcome::Extracted { rows }
                    }
                    Err(error) => {
                        warn!(
                            source = source.id.as_str(),
                            column,
                            path,
                            "Cannot extract column: {error}"
                        );
                        table.push_column(column, Vec::new());
                        ColumnOutcome::Failed {
                            reason: error.to_string(),
                        }
                    }
                };
                reports.push(ColumnReport {
                    source: source.id.clone(),
                    sheet: sheet.to_owned(),
                    column: column.to_owned(),
                    path: path.to_owned(),
                    outcome,
                });
            }
        }
        per_document.push(tables);
    }

    // longest column per sheet, across every source document
    let mut max_rows: HashMap<String, usize> = HashMap::new();
    for tables in &per_document {
        for (sheet, table) in tables {
            let entry = max_rows.entry(sheet.clone()).or_insert(0);
            *entry = (*entry).max(table.row_count());
        }
    }
    for tables in &mut per_document {
        for (sheet, table) in tables.iter_mut() {
            table.align(max_rows[sheet]);
        }
    }

    (merge(per_document), reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ColumnMapping;
    use crate::spreadsheet::fixtures::{build_workbook, inline_row};

    fn people_xml() -> &'static [u8] {
        b"<people>\
            <person id=\"1\"><name>Alice</name><age>30</age></person>\
            <person id=\"2\"><name>Bob</name></person>\
          </people>"
    }

    fn template_bytes() -> Vec<u8> {
        build_workbook(
            &[("Data", inline_row(1, &["Name", "Age", "Id"]))],
            &[],
        )
    }

    fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<Option<String>>> {
        let bytes = std::fs::read(path).unwrap();
        let mut workbook = Template::from_bytes(bytes, "output.xlsx").unwrap();
        workbook.read_rows(sheet, None).unwrap()
    }

    #[test]
    fn export_requires_mappings() {
        let workspace = Workspace::new();
        let error = export(&workspace, "template.xlsx", "output.xlsx").unwrap_err();
        assert!(error.to_string().contains("No column mappings"));
    }

    #[test]
    fn export_fills_template_end_to_end() {
        let directory = tempfile::tempdir().unwrap();
        let template_path = directory.path().join("template.xlsx");
        let output_path = directory.path().join("output.xlsx");
        std::fs::write(&template_path, template_bytes()).unwrap();

        let mut workspace = Workspace::new();
        workspace.add_document("people", "people.xml", people_xml()).unwrap();
        workspace
            .map_column(ColumnMapping::new("Data", "Name", "person/name", "people"))
            .unwrap();
        workspace
            .map_column(ColumnMapping::new("Data", "Age", "person/age", "people"))
            .unwrap();
        workspace
            .map_column(ColumnMapping::new("Data", "Id", "person/@id", "people"))
            .unwrap();

        let report = export(&workspace, &template_path, &output_path).unwrap();
        assert_eq!(report.written, 3);
        assert!(report.unmatched.is_empty());
        assert!(report.ignored_sheets.is_empty());
        assert_eq!(report.columns.len(), 3);
        assert!(report
            .columns
            .iter()
            .all(|column| matches!(column.outcome, ColumnOutcome::Extracted { .. })));

        let rows = read_sheet(&output_path, "Data");
        assert_eq!(
            rows[0],
            vec![Some("Name".to_owned()), Some("Age".to_owned()), Some("Id".to_owned())]
        );
        assert_eq!(rows[1][0].as_deref(), Some("Alice"));
        assert_eq!(rows[1][1].as_deref(), Some("30"));
        assert_eq!(rows[1][2].as_deref(), Some("1"));
        // Bob has no <age>, so his Age cell stays empty
        assert_eq!(rows[2][0].as_deref(), Some("Bob"));
        assert_eq!(rows[2].get(1).and_then(|cell| cell.as_deref()), None);
        assert_eq!(rows[2][2].as_deref(), Some("2"));
    }

    #[test]
    fn export_merges_sources_first_writer_wins() {
        let directory = tempfile::tempdir().unwrap();
        let template_path = directory.path().join("template.xlsx");
        let output_path = directory.path().join("output.xlsx");
        std::fs::write(&template_path, template_bytes()).unwrap();

        let mut workspace = Workspace::new();
        workspace.add_document("first", "first.xml", people_xml()).unwrap();
        workspace
            .add_document(
                "second",
                "second.xml",
                b"<people><person><name>Carol</name><age>41</age></person></people>" as &[u8],
            )
            .unwrap();
        workspace
            .map_column(ColumnMapping::new("Data", "Name", "person/name", "first"))
            .unwrap();
        workspace
            .map_column(ColumnMapping::new("Data", "Age", "person/age", "second"))
            .unwrap();

        let report = export(&workspace, &template_path, &output_path).unwrap();
        assert_eq!(report.written, 2);

        let rows = read_sheet(&output_path, "Data");
        // Name comes from the first source (2 rows), Age from the second
        // (1 row), and both columns line up to the longer of the two
        assert_eq!(rows[1][0].as_deref(), Some("Alice"));
        assert_eq!(rows[1][1].as_deref(), Some("41"));
        assert_eq!(rows[2][0].as_deref(), Some("Bob"));
        assert_eq!(rows[2].get(1).and_then(|cell| cell.as_deref()), None);
    }

    #[test]
    fn export_reports_failed_columns_without_aborting() {
        let directory = tempfile::tempdir().unwrap();
        let template_path = directory.path().join("template.xlsx");
        let output_path = directory.path().join("output.xlsx");
        std::fs::write(&template_path, template_bytes()).unwrap();

        let mut workspace = Workspace::new();
        workspace.add_document("people", "people.xml", people_xml()).unwrap();
        workspace
            .map_column(ColumnMapping::new("Data", "Name", "person/name", "people"))
            .unwrap();
        workspace
            .map_column(ColumnMapping::new("Data", "Age", "person//age", "people"))
            .unwrap();

        let report = export(&workspace, &template_path, &output_path).unwrap();
        let failed = report
            .columns
            .iter()
            .find(|column| column.column == "Age")
            .unwrap();
        assert!(matches!(failed.outcome, ColumnOutcome::Failed { .. }));

        let rows = read_sheet(&output_path, "Data");
        assert_eq!(rows[1][0].as_deref(), Some("Alice"));
        assert_eq!(rows[1].get(1).and_then(|cell| cell.as_deref()), None);
    }

    #[test]
    fn export_failure_leaves_no_output_file() {
        let directory = tempfile::tempdir().unwrap();
        let template_path = directory.path().join("missing.xlsx");
        let output_path = directory.path().join("output.xlsx");

        let mut workspace = Workspace::new();
        workspace.add_document("people", "people.xml", people_xml()).unwrap();
        workspace
            .map_column(ColumnMapping::new("Data", "Name", "person/name", "people"))
            .unwrap();

        assert!(export(&workspace, &template_path, &output_path).is_err());
        assert!(!output_path.exists());
    }
}
