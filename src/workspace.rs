//! Explicit application state for one mapping session: the registered XML
//! source documents and the active mapping set. The export pipeline reads
//! this state through parameters only; nothing here is global or ambient.

use crate::document::XmlDocument;
use crate::error::SheetFillError;
use crate::mapping::ColumnMapping;
use crate::mapping::MappingSet;
use thiserror::Error;

/// Custom error types for workspace state changes.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// A document with this identifier is already registered
    #[error("Source document '{0}' is already registered")]
    DuplicateSource(String),

    /// A mapping references a source document that is not registered
    #[error("Unknown source document '{0}'")]
    UnknownSource(String),
}

/// A registered XML source document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Caller-assigned stable identifier
    pub id: String,
    /// Display name (typically the uploaded file name)
    pub name: String,
    document: XmlDocument,
}

impl SourceDocument {
    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Sorted addressable paths of this document, for mapping pick-lists
    pub fn paths(&self) -> Vec<String> {
        self.document.paths()
    }
}

/// Session state: source documents in registration order plus the mapping set.
///
/// Registration order is semantically load-bearing: the cross-source merger
/// gives earlier-registered documents precedence on column collisions.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    documents: Vec<SourceDocument>,
    mappings: MappingSet,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace::default()
    }

    /// Parses and registers an XML document under a caller-assigned id.
    /// Malformed XML is rejected here, so later pipeline stages never see an
    /// unparseable document.
    pub fn add_document(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        bytes: &[u8],
    ) -> Result<&SourceDocument, SheetFillError> {
        let id = id.into();
        if self.document(&id).is_some() {
            Err(WorkspaceError::DuplicateSource(id.clone()))?;
        }
        let document = XmlDocument::parse(bytes)?;
        let name = name.into();
        tracing::debug!(source = %id, name = %name, "registered XML source document");
        self.documents.push(SourceDocument { id, name, document });
        Ok(self.documents.last().expect("just pushed"))
    }

    /// Unregisters a document and drops its mappings.
    /// Returns true if the document existed.
    pub fn remove_document(&mut self, id: &str) -> bool {
        let before = self.documents.len();
        self.documents.retain(|document| document.id != id);
        if self.documents.len() == before {
            return false;
        }
        let dropped = self.mappings.remove_source(id);
        tracing::debug!(source = %id, dropped_mappings = dropped, "removed XML source document");
        true
    }

    pub fn document(&self, id: &str) -> Option<&SourceDocument> {
        self.documents.iter().find(|document| document.id == id)
    }

    /// Registered documents in registration order
    pub fn documents(&self) -> &[SourceDocument] {
        &self.documents
    }

    pub fn mappings(&self) -> &MappingSet {
        &self.mappings
    }

    /// Adds or replaces the mapping for the mapping's (sheet, column) pair.
    /// Fails if the mapping references an unregistered source document.
    pub fn map_column(&mut self, mapping: ColumnMapping) -> Result<bool, SheetFillError> {
        if self.document(&mapping.source_id).is_none() {
            Err(WorkspaceError::UnknownSource(mapping.source_id.clone()))?;
        }
        Ok(self.mappings.upsert(mapping))
    }

    /// Removes and returns the most recently added mapping
    pub fn unmap_last(&mut self) -> Option<ColumnMapping> {
        self.mappings.remove_last()
    }

    /// Drops every mapping, e.g. when the template file changes
    pub fn clear_mappings(&mut self) {
        self.mappings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_document_parses_and_registers() {
        let mut workspace = Workspace::new();
        let document = workspace
            .add_document("xml_1", "people.xml", b"<people><person><name>A</name></person></people>")
            .unwrap();
        assert_eq!(document.paths(), vec!["people/person/name"]);
        assert_eq!(workspace.documents().len(), 1);
    }

    #[test]
    fn add_document_rejects_malformed_xml() {
        let mut workspace = Workspace::new();
        assert!(workspace.add_document("xml_1", "bad.xml", b"<people><person>").is_err());
        assert!(workspace.documents().is_empty());
    }

    #[test]
    fn add_document_rejects_duplicate_id() {
        let mut workspace = Workspace::new();
        workspace.add_document("xml_1", "a.xml", b"<a>1</a>").unwrap();
        assert!(workspace.add_document("xml_1", "b.xml", b"<b>2</b>").is_err());
    }

    #[test]
    fn map_column_requires_registered_source() {
        let mut workspace = Workspace::new();
        let mapping = ColumnMapping::new("Data", "Name", "a", "xml_1");
        assert!(workspace.map_column(mapping.clone()).is_err());

        workspace.add_document("xml_1", "a.xml", b"<a>1</a>").unwrap();
        assert_eq!(workspace.map_column(mapping).unwrap(), false);
        assert_eq!(workspace.mappings().len(), 1);
    }

    #[test]
    fn remove_document_drops_its_mappings() {
        let mut workspace = Workspace::new();
        workspace.add_document("xml_1", "a.xml", b"<a>1</a>").unwrap();
        workspace.add_document("xml_2", "b.xml", b"<b>2</b>").unwrap();
        workspace.map_column(ColumnMapping::new("Data", "Name", "a", "xml_1")).unwrap();
        workspace.map_column(ColumnMapping::new("Data", "Code", "b", "xml_2")).unwrap();

        assert!(workspace.remove_document("xml_1"));
        assert_eq!(workspace.mappings().len(), 1);
        assert_eq!(workspace.mappings().iter().next().unwrap().source_id, "xml_2");
        assert!(!workspace.remove_document("xml_1"));
    }
}
