//! Fills merged tables into a copy of the template workbook.
//!
//! The output container is rebuilt entry by entry from the template; parts
//! that carry no mapped data are copied through untouched, and each mapped
//! worksheet is rewritten as an XML event stream. Row 1 of every sheet is
//! replayed event for event, so header content, order and attributes all
//! survive; the only markup change the round trip makes is that self-closing
//! tags come back as explicit start/end pairs. Data rows start at row 2.
//! Mapped columns get inline-string cells (or an empty cell when the value
//! is absent, which clears whatever the template had there); everything else
//! in the sheet is replayed as it was read.

use crate::error::SheetFillError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::spreadsheet::index_to_reference;
use crate::spreadsheet::reference_to_index;
use crate::spreadsheet::template::Template;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::io::Cursor;
use std::io::Write;
use tracing::debug;
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

// XML tag names used by worksheet parts
const TAG_SHEET_DATA: QName = QName(b"sheetData"); // Cell rows container
const TAG_ROW: QName = QName(b"row");              // Row in worksheet
const TAG_CELL: QName = QName(b"c");               // Cell in worksheet

/// Per-sheet column patch: 0-based column index to the aligned value list
type ColumnPatch = BTreeMap<usize, Vec<Option<String>>>;

/// What the writer did and what it had to skip
pub(crate) struct WriteSummary {
    /// Number of table columns matched to a template header and written
    pub(crate) written: usize,
    /// (sheet, column) pairs whose header was not found in the template
    pub(crate) unmatched: Vec<(String, String)>,
    /// Table sheet names with no counterpart sheet in the template
    pub(crate) ignored_sheets: Vec<String>,
}

/// Writes the merged tables into the template and returns the bytes of the
/// filled workbook. New sheets and new columns are never created: tables for
/// sheets the template lacks are ignored, columns whose name matches no
/// header cell are skipped, and both are reported in the summary.
pub(crate) fn write_tables(
    template: &mut Template,
    tables: &HashMap<String, Table>,
) -> Result<(Vec<u8>, WriteSummary), SheetFillError> {
    let mut summary = WriteSummary {
        written: 0,
        unmatched: Vec::new(),
        ignored_sheets: Vec::new(),
    };

    // Worksheet zip path to (column patches, data row count)
    let mut patches: HashMap<String, (ColumnPatch, usize)> = HashMap::new();
    let sheets: Vec<(String, String)> = template.sheets().to_vec();
    for (sheet_name, zip_path) in &sheets {
        let table = match tables.get(sheet_name) {
            Some(table) if !table.is_empty() => table,
            _ => continue,
        };
        let positions = template.header_positions(sheet_name)?;
        let mut mapped = ColumnPatch::new();
        for column in table.columns() {
            match positions.get(&column.name) {
                Some(col) => {
                    mapped.insert(*col, column.values.clone());
                    summary.written += 1;
                }
                None => {
                    warn!(
                        sheet = sheet_name.as_str(),
                        column = column.name.as_str(),
                        "No matching header in template sheet"
                    );
                    summary.unmatched.push((sheet_name.clone(), column.name.clone()));
                }
            }
        }
        if !mapped.is_empty() {
            patches.insert(zip_path.clone(), (mapped, table.row_count()));
        }
    }
    for name in tables.keys() {
        if !sheets.iter().any(|(sheet, _)| sheet == name) {
            warn!(sheet = name.as_str(), "Template has no sheet with this name, data ignored");
            summary.ignored_sheets.push(name.clone());
        }
    }
    summary.ignored_sheets.sort();

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for index in 0..template.entry_count() {
        let (name, contents) = template.entry(index)?;
        if name.ends_with('/') {
            writer.add_directory(name.trim_end_matches('/'), options)?;
            continue;
        }
        let patch = patches
            .iter()
            .find(|(path, _)| path.eq_ignore_ascii_case(&name))
            .map(|(_, patch)| patch);
        let contents = match patch {
            Some((columns, row_count)) => {
                debug!(part = name.as_str(), rows = *row_count, "Filling worksheet");
                // data occupies sheet rows 2 through row_count + 1
                patch_worksheet(&contents, columns, row_count + 1)?
            }
            None => contents,
        };
        writer.start_file(name, options)?;
        writer.write_all(&contents)?;
    }
    let buffer = writer.finish()?;
    Ok((buffer.into_inner(), summary))
}

/// Rewrites one worksheet part, patching mapped columns into sheet rows
/// 2..=last_data_row and synthesizing rows the template does not have.
fn patch_worksheet(
    bytes: &[u8],
    columns: &ColumnPatch,
    last_data_row: usize,
) -> Result<Vec<u8>, SheetFillError> {
    let mut reader = XmlReader::new(bytes);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut in_sheet_data = false;
    let mut next_row = 1usize;
    while let Some(event) = reader.next()? {
        match event {
            Event::Start(start) if start.name() == TAG_SHEET_DATA => {
                in_sheet_data = true;
                writer.write_event(Event::Start(start))?;
            }
            Event::End(end) if in_sheet_data && end.name() == TAG_SHEET_DATA => {
                // never synthesize into the header row, even when the sheet
                // held no <row> elements at all
                next_row = next_row.max(2);
                while next_row <= last_data_row {
                    write_synthesized_row(&mut writer, next_row, columns)?;
                    next_row += 1;
                }
                in_sheet_data = false;
                writer.write_event(Event::End(end))?;
            }
            Event::Start(start) if in_sheet_data && start.name() == TAG_ROW => {
                let start = start.into_owned();
                let number = start.parse_attribute_value::<usize>("r")?.unwrap_or(next_row);
                let events = capture_row(&mut reader, Event::Start(start))?;
                next_row = next_row.max(2);
                while next_row < number && next_row <= last_data_row {
                    write_synthesized_row(&mut writer, next_row, columns)?;
                    next_row += 1;
                }
                if (2..=last_data_row).contains(&number) {
                    write_patched_row(&mut writer, events, number, columns)?;
                } else {
                    // header row and rows past the data survive untouched
                    for event in events {
                        writer.write_event(event)?;
                    }
                }
                next_row = number + 1;
            }
            event => writer.write_event(event)?,
        }
    }
    Ok(writer.into_inner().into_inner())
}

/// Reads the rest of a row subtree into owned events, the opening tag included
fn capture_row(
    reader: &mut XmlReader<&[u8]>,
    first: Event<'static>,
) -> Result<Vec<Event<'static>>, SheetFillError> {
    let mut events = vec![first];
    while let Some(event) = reader.next()? {
        let event = event.into_owned();
        let is_end = matches!(&event, Event::End(end) if end.name() == TAG_ROW);
        events.push(event);
        if is_end {
            return Ok(events);
        }
    }
    Err(SpreadsheetError::MalformedSheet("row element is never closed".to_owned()).into())
}

/// Replays one captured data row with mapped columns replaced. Cells of
/// unmapped columns pass through as captured; mapped cells keep their
/// original attributes (style in particular) but get a new value.
fn write_patched_row<W: Write>(
    writer: &mut Writer<W>,
    events: Vec<Event<'static>>,
    number: usize,
    columns: &ColumnPatch,
) -> Result<(), SheetFillError> {
    let mut iterator = events.into_iter();
    let row_start = match iterator.next() {
        Some(Event::Start(start)) => start,
        _ => return Err(SpreadsheetError::MalformedSheet("row capture lost its opening tag".to_owned()).into()),
    };

    let mut cells: BTreeMap<usize, Vec<Event<'static>>> = BTreeMap::new();
    let mut col_count = 0usize;
    let mut row_end = None;
    while let Some(event) = iterator.next() {
        match event {
            Event::Start(start) if start.name() == TAG_CELL => {
                let col = start
                    .get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .map(|(_, col)| col)
                    .unwrap_or(col_count);
                col_count = col + 1;
                let mut subtree = vec![Event::Start(start)];
                for inner in iterator.by_ref() {
                    let is_end = matches!(&inner, Event::End(end) if end.name() == TAG_CELL);
                    subtree.push(inner);
                    if is_end {
                        break;
                    }
                }
                cells.insert(col, subtree);
            }
            Event::End(end) if end.name() == TAG_ROW => row_end = Some(end),
            // whitespace between cells carries no data
            _ => (),
        }
    }

    writer.write_event(Event::Start(row_start))?;
    let mut occupied: BTreeSet<usize> = cells.keys().copied().collect();
    occupied.extend(columns.keys().copied());
    for col in occupied {
        match columns.get(&col) {
            Some(values) => {
                let value = values.get(number - 2).cloned().flatten();
                write_cell(writer, number, col, value, cells.remove(&col))?;
            }
            None => {
                if let Some(subtree) = cells.remove(&col) {
                    for event in subtree {
                        writer.write_event(event)?;
                    }
                }
            }
        }
    }
    match row_end {
        Some(end) => writer.write_event(Event::End(end))?,
        None => writer.write_event(Event::End(BytesEnd::new("row")))?,
    }
    Ok(())
}

/// Emits a row the template did not contain, holding only the mapped cells
/// that have a value for it.
fn write_synthesized_row<W: Write>(
    writer: &mut Writer<W>,
    number: usize,
    columns: &ColumnPatch,
) -> Result<(), SheetFillError> {
    let reference = number.to_string();
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", reference.as_str()));
    writer.write_event(Event::Start(row))?;
    for (col, values) in columns {
        if let Some(value) = values.get(number - 2).cloned().flatten() {
            write_cell(writer, number, *col, Some(value), None)?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

/// Writes one mapped cell. A present value becomes an inline string; an
/// absent value keeps the cell but drops its contents, clearing whatever the
/// template row held there. Original attributes other than the reference and
/// the value type are carried over.
fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    number: usize,
    col: usize,
    value: Option<String>,
    original: Option<Vec<Event<'static>>>,
) -> Result<(), SheetFillError> {
    let reference = index_to_reference(number - 1, col);
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference.as_str()));
    if let Some(events) = &original {
        if let Some(Event::Start(start)) = events.first() {
            for attribute in start.attributes() {
                let attribute = attribute?;
                if attribute.key.as_ref() != b"r" && attribute.key.as_ref() != b"t" {
                    cell.push_attribute(attribute);
                }
            }
        }
    }
    match value {
        Some(text) => {
            cell.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(cell))?;
            writer.write_event(Event::Start(BytesStart::new("is")))?;
            writer.write_event(Event::Start(BytesStart::new("t")))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new("t")))?;
            writer.write_event(Event::End(BytesEnd::new("is")))?;
            writer.write_event(Event::End(BytesEnd::new("c")))?;
        }
        None => {
            if original.is_some() {
                writer.write_event(Event::Start(cell))?;
                writer.write_event(Event::End(BytesEnd::new("c")))?;
            }
        }
    }
    Ok(())
}
