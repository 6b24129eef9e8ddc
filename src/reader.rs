use chrono::NaiveDate;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::filetype::FileKind;
use crate::models::{Cell, RawRow};

/// Materialize the raw rows of a statement without interpreting them.
pub fn read_rows(kind: FileKind, bytes: &[u8]) -> Result<Vec<RawRow>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(IngestError::EmptyFile);
    }
    let rows = match kind {
        FileKind::Csv => read_delimited(&decode_text(bytes))?,
        FileKind::Xlsx | FileKind::Xls => read_spreadsheet(bytes)?,
    };
    if rows.iter().all(RawRow::is_blank) {
        return Err(IngestError::EmptyFile);
    }
    Ok(rows)
}

/// UTF-8 when valid (BOM stripped), otherwise Windows-1252.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            debug!("input is not UTF-8, decoding as Windows-1252");
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// Comma or semicolon, whichever the first line uses more. Ties favor comma.
pub fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let commas = first_line.matches(',').count();
    let semicolons = first_line.matches(';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

pub fn read_delimited(text: &str) -> Result<Vec<RawRow>> {
    let delimiter = detect_delimiter(text);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let cells = record
            .iter()
            .map(|field| Cell::text(field.trim().trim_matches('"')))
            .collect();
        rows.push(RawRow::new(cells).at_line(line));
    }
    debug!(delimiter = %(delimiter as char), rows = rows.len(), "read delimited text");
    Ok(rows)
}

#[cfg(feature = "xlsx")]
fn read_spreadsheet(bytes: &[u8]) -> Result<Vec<RawRow>> {
    use calamine::Reader;

    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Unreadable("the workbook has no sheets".to_string()))??;
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let rows: Vec<RawRow> = range
        .rows()
        .enumerate()
        .map(|(i, row)| {
            RawRow::new(row.iter().map(spreadsheet_cell).collect()).at_line(first_row + i + 1)
        })
        .collect();
    debug!(rows = rows.len(), height = range.height(), "read first worksheet");
    Ok(rows)
}

#[cfg(not(feature = "xlsx"))]
fn read_spreadsheet(_bytes: &[u8]) -> Result<Vec<RawRow>> {
    Err(IngestError::SpreadsheetUnsupported)
}

#[cfg(feature = "xlsx")]
fn spreadsheet_cell(data: &calamine::Data) -> Cell {
    use calamine::Data;

    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::text(s),
        Data::Float(f) => Cell::Number(format_number(*f)),
        Data::Int(i) => Cell::Number(i.to_string()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(date) => Cell::Text(date.format("%Y-%m-%d").to_string()),
            None => Cell::Number(format_number(dt.as_f64())),
        },
        Data::DateTimeIso(s) => Cell::text(s.get(..10).unwrap_or(s)),
        Data::DurationIso(s) => Cell::text(s),
    }
}

#[cfg(any(feature = "xlsx", test))]
fn format_number(value: f64) -> String {
    // Spreadsheet floats carry binary noise (100.50000000000001)
    let rounded = (value * 1e6).round() / 1e6;
    format!("{rounded}")
}

/// Serial 2958465 is 9999-12-31, the last date Excel can hold.
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::TimeDelta::try_days(serial.trunc() as i64)?)
}
