use thiserror::Error;

/// Main error type for the sheetfill crate.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum SheetFillError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Domain module errors
    #[error("{0}")]
    DocumentError(#[from] crate::document::DocumentError),

    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    WorkspaceError(#[from] crate::workspace::WorkspaceError),

    #[error("{0}")]
    ExportError(#[from] crate::export::ExportError),
}

pub trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetFillError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetFillError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_prefix_wraps_the_inner_message() {
        let result: Result<(), SheetFillError> =
            Err(crate::spreadsheet::SpreadsheetError::NoSheets("book.xlsx".to_owned()).into());
        let error = result.with_prefix("Cannot read template 'book.xlsx'").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Cannot read template 'book.xlsx': Workbook 'book.xlsx' contains no sheets"
        );
    }

    #[test]
    fn with_prefix_keeps_ok_values() {
        let result: Result<u32, SheetFillError> = Ok(7);
        assert_eq!(result.with_prefix("unused").unwrap(), 7);
    }
}
