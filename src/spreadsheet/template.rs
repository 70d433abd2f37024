//! Workbook template reader.
//!
//! Parses the template container once at open time (sheet inventory from
//! `xl/workbook.xml` + its relationships, the shared string table) and reads
//! worksheet cell rows on demand. Header discovery for the mapping UI and the
//! writer's header matching both go through [`Template::read_rows`], so the
//! two always agree on what a header cell contains.

use crate::error::ResultMessage;
use crate::error::SheetFillError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::reference_to_index;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Cursor;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

// XML tag names used by the workbook parts
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet definition
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content
const TAG_RELATIONSHIP: &[u8] = b"Relationship";      // Relationship definition

type WorkbookArchive = ZipArchive<Cursor<Vec<u8>>>;

/// A workbook template held fully in memory.
#[derive(Debug)]
pub struct Template {
    /// Display name (the path the template was opened from)
    name: String,
    /// ZIP archive of the template's parts
    zip: WorkbookArchive,
    /// Worksheets as (name, zip_path) pairs, in workbook order
    sheets: Vec<(String, String)>,
    /// Shared string table, indexed by string id
    shared_strings: Vec<String>,
}

impl Template {
    /// Opens a workbook template file.
    ///
    /// Any failure here (unreadable file, broken container, missing workbook
    /// parts, no sheets) is fatal to an export and carries the template path
    /// in its message.
    pub fn open(path: impl AsRef<Path>) -> Result<Template, SheetFillError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let bytes = std::fs::read(path)
            .map_err(SheetFillError::IoError)
            .with_prefix(&format!("Cannot read template '{name}'"))?;
        Template::from_bytes(bytes, name)
    }

    /// Opens a workbook template already loaded into memory.
    pub fn from_bytes(bytes: Vec<u8>, name: impl Into<String>) -> Result<Template, SheetFillError> {
        let name = name.into();
        let prefix = format!("Cannot read template '{name}'");
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(SheetFillError::ZipError)
            .with_prefix(&prefix)?;
        let sheets = load_workbook(&mut zip).with_prefix(&prefix)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::NoSheets(name.clone()))?;
        }
        let shared_strings = load_shared_strings(&mut zip).with_prefix(&prefix)?;
        Ok(Template {
            name,
            zip,
            sheets,
            shared_strings,
        })
    }

    /// Returns the template's display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub(crate) fn sheets(&self) -> &[(String, String)] {
        &self.sheets
    }

    /// First-row headers of every sheet, for the mapping UI's target
    /// column pick-lists. Empty header cells are skipped.
    pub fn columns(&mut self) -> Result<Vec<(String, Vec<String>)>, SheetFillError> {
        let names: Vec<String> = self.sheets.iter().map(|(name, _)| name.clone()).collect();
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let headers = self.headers(&name)?;
            columns.push((name, headers));
        }
        Ok(columns)
    }

    /// First-row headers of one sheet, in column order
    pub fn headers(&mut self, sheet: &str) -> Result<Vec<String>, SheetFillError> {
        let rows = self.read_rows(sheet, Some(1))?;
        Ok(rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter(|header| !header.is_empty())
            .collect())
    }

    /// Maps each non-empty header cell value of a sheet's first row to its
    /// 0-based column index. Duplicate headers keep the rightmost position.
    pub(crate) fn header_positions(&mut self, sheet: &str) -> Result<HashMap<String, usize>, SheetFillError> {
        let mut positions = HashMap::new();
        if let Some(first_row) = self.read_rows(sheet, Some(1))?.into_iter().next() {
            for (col, cell) in first_row.into_iter().enumerate() {
                if let Some(header) = cell {
                    if !header.is_empty() {
                        positions.insert(header, col);
                    }
                }
            }
        }
        Ok(positions)
    }

    /// Reads a sheet's cells into a row-major table of optional strings,
    /// resolving shared and inline strings. `limit` stops after that many
    /// rows (counted from sheet row 1), which keeps header reads from
    /// scanning whole worksheets.
    pub(crate) fn read_rows(
        &mut self,
        sheet: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Vec<Option<String>>>, SheetFillError> {
        let zip_path = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .map(|(_, path)| path.clone())
            .ok_or_else(|| SpreadsheetError::SheetNotFound(sheet.to_owned()))?;
        let shared_strings = &self.shared_strings;
        let mut reader = self
            .zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::MissingPart(zip_path.clone()))?;

        let mut rows = Vec::<Vec<Option<String>>>::new();
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut is_shared = false;
        let mut has_value = false;
        let mut value = String::new();
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
                col_count = 0;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count += 1;
                if limit.map(|limit| row >= limit).unwrap_or(false) {
                    break;
                }
                is_shared = event.get_attribute_value("t")?
                    .map(|kind| kind.as_ref() == "s")
                    .unwrap_or(false);
                value.clear();
                has_value = false;
            }
            Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
                has_value = true;
            }
            Event::Start(event) if event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
                has_value = true;
            }
            Event::End(event) if has_value && event.name() == TAG_CELL => {
                let text = if is_shared {
                    shared_strings.get(value.parse::<usize>()?).cloned().unwrap_or_default()
                } else {
                    value.clone()
                };
                set_cell(&mut rows, row, col, text);
                has_value = false;
            }
        });
        Ok(rows)
    }

    /// Number of entries in the template container
    pub(crate) fn entry_count(&self) -> usize {
        self.zip.len()
    }

    /// Reads one container entry by index, preserving archive order.
    /// Directory entries come back with empty contents.
    pub(crate) fn entry(&mut self, index: usize) -> Result<(String, Vec<u8>), SheetFillError> {
        let mut file = self.zip.by_index(index)?;
        let name = file.name().to_owned();
        let mut contents = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut contents)?;
        Ok((name, contents))
    }
}

/// Loads worksheet names and their zip paths from xl/workbook.xml,
/// resolved through the workbook relationships part.
fn load_workbook(zip: &mut WorkbookArchive) -> Result<Vec<(String, String)>, SheetFillError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::MissingPart("xl/workbook.xml".to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id.to_string()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
    });
    Ok(sheets)
}

/// Loads worksheet relationships, mapping relationship ids to zip paths.
fn load_relationships(zip: &mut WorkbookArchive, path: &str) -> Result<HashMap<String, String>, SheetFillError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::MissingPart(path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only process worksheet relationships
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Loads the shared string table; absent part means an empty table.
fn load_shared_strings(zip: &mut WorkbookArchive) -> Result<Vec<String>, SheetFillError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Normalizes a relationship target to a path within the workbook container.
fn to_zip_path(path: Cow<'_, str>) -> String {
    if path.starts_with("/xl/") {
        path[1..].to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Reads string content up to `end_tag`, skipping phonetic annotations and
/// handling text, CDATA and entity references.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SheetFillError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Places a cell value, growing the row-major table as needed
fn set_cell(rows: &mut Vec<Vec<Option<String>>>, row: usize, col: usize, text: String) {
    if rows.len() <= row {
        rows.resize(row + 1, Vec::new());
    }
    let cells = &mut rows[row];
    if cells.len() <= col {
        cells.resize(col + 1, None);
    }
    cells[col] = Some(text);
}
