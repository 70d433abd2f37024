//! # SheetFill
//!
//! Extracts values from XML documents and fills them into workbook templates.
//! Upload XML sources, map element or attribute paths to template columns, and
//! export a workbook whose layout is untouched apart from the filled data.
//!
//! ## Features
//!
//! - **Path discovery**: Every leaf element and attribute path of an XML
//!   document is listed automatically, ready to map
//! - **Attribute selectors**: A trailing `/@name` on a path pulls the
//!   attribute instead of the element text
//! - **Multiple sources**: Several XML documents feed one workbook; columns
//!   mapped from different documents line up row for row
//! - **Template fidelity**: Header rows, untouched cells, styles and the
//!   other workbook parts survive the export; parts with no mapped data are
//!   copied through verbatim
//! - **No structural edits**: The export never invents sheets or columns;
//!   data with no matching header is reported, not written
//!
//! ## Usage
//!
//! ```no_run
//! use sheetfill::{ColumnMapping, Workspace};
//!
//! # fn main() -> Result<(), sheetfill::SheetFillError> {
//! let mut workspace = Workspace::new();
//! let source = workspace.add_document("people", "people.xml", b"<people/>")?;
//! println!("available paths: {:?}", source.paths());
//!
//! workspace.map_column(ColumnMapping::new("Data", "Name", "person/name", "people"))?;
//! let report = sheetfill::export(&workspace, "template.xlsx", "filled.xlsx")?;
//! println!("wrote {} columns to {}", report.written, report.output_path.display());
//! # Ok(())
//! # }
//! ```

mod document;
mod error;
mod export;
mod helpers;
mod mapping;
mod spreadsheet;
mod table;
mod workspace;

pub use crate::document::DocumentError;
pub use crate::document::Element;
pub use crate::document::XmlDocument;
pub use crate::error::ResultMessage;
pub use crate::error::SheetFillError;
pub use crate::export::export;
pub use crate::export::ColumnOutcome;
pub use crate::export::ColumnReport;
pub use crate::export::ExportError;
pub use crate::export::ExportReport;
pub use crate::helpers::xml::XmlError;
pub use crate::mapping::ColumnMapping;
pub use crate::mapping::MappingSet;
pub use crate::spreadsheet::template::Template;
pub use crate::spreadsheet::SpreadsheetError;
pub use crate::table::merge;
pub use crate::table::Column;
pub use crate::table::Table;
pub use crate::workspace::SourceDocument;
pub use crate::workspace::Workspace;
pub use crate::workspace::WorkspaceError;
