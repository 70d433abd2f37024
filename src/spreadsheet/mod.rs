//! # Spreadsheet Module
//!
//! Reads the workbook template (sheet inventory, header rows, cell data) and
//! writes the export output. Only zip/XML workbooks (.xlsx) are handled; the
//! template is read fully into memory and the filled output is always a fresh
//! artifact derived from it, never a mutation of the template file.

use thiserror::Error;

pub(crate) mod template;
pub(crate) mod writer;

/// Custom error types for workbook template operations.
///
/// Any of these surfacing from `Template::open` is fatal to an export: the
/// template could not be understood, and no output file is produced.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// A required part of the workbook container is absent
    #[error("Missing workbook part '{0}'")]
    MissingPart(String),

    /// The workbook declares no sheets
    #[error("Workbook '{0}' contains no sheets")]
    NoSheets(String),

    /// A sheet name was requested that the workbook does not contain
    #[error("No sheet named '{0}' in workbook")]
    SheetNotFound(String),

    /// Worksheet markup ended before an open element was closed
    #[error("Worksheet markup is malformed: {0}")]
    MalformedSheet(String),
}

/// Converts 0-based (row, col) indexes to an A1-style cell reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = String::new();
    let mut value = col + 1;
    while value > 0 {
        let digit = ((value - 1) % 26) as u8;
        letters.insert(0, (b'A' + digit) as char);
        value = (value - 1) / 26;
    }
    format!("{}{}", letters, row + 1)
}

/// Parses an A1-style cell reference into 0-based (row, col) indexes.
/// Returns None for references that are not a letter run followed by digits.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for letter in letters.chars() {
        if !letter.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (letter.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row = digits.parse::<usize>().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// In-memory workbook fixtures for tests, assembled the same way real
/// spreadsheet software does: a zip container of boilerplate parts plus one
/// worksheet XML per sheet.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::index_to_reference;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;
    use zip::ZipWriter;

    /// Builds a complete workbook; each sheet is (name, sheetData inner XML).
    /// Pass shared strings to emit an xl/sharedStrings.xml part.
    pub(crate) fn build_workbook(sheets: &[(&str, String)], shared_strings: &[&str]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut overrides = String::new();
        for index in 1..=sheets.len() {
            overrides.push_str(&format!(
                "<Override PartName=\"/xl/worksheets/sheet{index}.xml\" \
                 ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
            ));
        }
        if !shared_strings.is_empty() {
            overrides.push_str(
                "<Override PartName=\"/xl/sharedStrings.xml\" \
                 ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>",
            );
        }
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
             <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
             <Override PartName=\"/xl/workbook.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
             {overrides}</Types>"
        ).as_bytes()).unwrap();

        zip.start_file("_rels/.rels", options).unwrap();
        zip.write_all(
            b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
              <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
              <Relationship Id=\"rId1\" \
              Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" \
              Target=\"xl/workbook.xml\"/></Relationships>",
        ).unwrap();

        let mut sheet_entries = String::new();
        let mut relationships = String::new();
        for (index, (name, _)) in sheets.iter().enumerate() {
            let id = index + 1;
            sheet_entries.push_str(&format!(
                "<sheet name=\"{name}\" sheetId=\"{id}\" r:id=\"rId{id}\"/>"
            ));
            relationships.push_str(&format!(
                "<Relationship Id=\"rId{id}\" \
                 Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" \
                 Target=\"worksheets/sheet{id}.xml\"/>"
            ));
        }
        if !shared_strings.is_empty() {
            relationships.push_str(&format!(
                "<Relationship Id=\"rId{}\" \
                 Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings\" \
                 Target=\"sharedStrings.xml\"/>",
                sheets.len() + 1
            ));
        }

        zip.start_file("xl/workbook.xml", options).unwrap();
        zip.write_all(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
             <sheets>{sheet_entries}</sheets></workbook>"
        ).as_bytes()).unwrap();

        zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        zip.write_all(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             {relationships}</Relationships>"
        ).as_bytes()).unwrap();

        if !shared_strings.is_empty() {
            let items: String = shared_strings
                .iter()
                .map(|string| format!("<si><t>{string}</t></si>"))
                .collect();
            zip.start_file("xl/sharedStrings.xml", options).unwrap();
            zip.write_all(format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
                 count=\"{0}\" uniqueCount=\"{0}\">{items}</sst>",
                shared_strings.len()
            ).as_bytes()).unwrap();
        }

        for (index, (_, sheet_data)) in sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options).unwrap();
            zip.write_all(format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
                 <sheetData>{sheet_data}</sheetData></worksheet>"
            ).as_bytes()).unwrap();
        }

        zip.finish().unwrap();
        buffer.into_inner()
    }

    /// Renders one row of inline-string cells starting at column A;
    /// `index` is the 1-based sheet row number.
    pub(crate) fn inline_row(index: usize, values: &[&str]) -> String {
        let mut row = format!("<row r=\"{index}\">");
        for (col, value) in values.iter().enumerate() {
            row.push_str(&format!(
                "<c r=\"{}\" t=\"inlineStr\"><is><t>{value}</t></is></c>",
                index_to_reference(index - 1, col)
            ));
        }
        row.push_str("</row>");
        row
    }
}
