use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use thiserror::Error;
use tracing::{debug, info};

/// Worksheet carrying the tabular data in the published FZ10 workbooks
pub const DEFAULT_SHEET: &str = "FZ 10.1";

// A row counts as the column header once it carries this many text cells;
// title and footnote rows never reach it
const HEADER_MIN_TEXT_CELLS: usize = 3;

// Leading-cell labels of aggregate rows that are not data
const AGGREGATE_MARKERS: [&str; 3] = ["insgesamt", "zusammen", "summe"];

#[derive(Error, Debug)]
pub enum ExcelImportError {
    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("No header row found in sheet {0}")]
    HeaderNotFound(String),

    #[error("No data rows found in sheet {0}")]
    NoDataRows(String),
}

/// One parsed cell, keeping the source type of the spreadsheet value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// Tabular region of one FZ10 sheet: verbatim German column names plus
/// typed data rows in source order. Every row has one cell per column.
#[derive(Debug, Clone)]
pub struct RegistrationTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Parser for the monthly FZ10 registration workbooks
#[derive(Clone)]
pub struct ExcelImporter {
    sheet_name: String,
}

impl ExcelImporter {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    /// Parse downloaded workbook bytes into the tabular region of the
    /// configured sheet (this is synchronous, caller should use spawn_blocking)
    pub fn parse(&self, bytes: Vec<u8>) -> Result<RegistrationTable, ExcelImportError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
            .map_err(|e| ExcelImportError::WorkbookOpen(e.to_string()))?;

        let range = workbook
            .worksheet_range(&self.sheet_name)
            .map_err(|_| ExcelImportError::SheetNotFound(self.sheet_name.clone()))?;

        let table = extract_table(&range, &self.sheet_name)?;
        info!(
            "Parsed {} data rows ({} columns) from sheet {}",
            table.rows.len(),
            table.columns.len(),
            self.sheet_name
        );
        Ok(table)
    }
}

/// Locate the header row and collect the data rows beneath it.
///
/// # Expected Sheet Structure:
/// ```text
/// Title and note rows (one or two text cells each)
/// Header row: verbatim German column names
/// Data rows, possibly interleaved with aggregate rows (Insgesamt/Zusammen/Summe)
/// Blank row, then footnotes
/// ```
///
/// Operates on a plain cell range so tests can build fixtures directly.
pub fn extract_table(
    range: &Range<Data>,
    sheet_name: &str,
) -> Result<RegistrationTable, ExcelImportError> {
    let rows: Vec<_> = range.rows().collect();

    let header_idx = rows
        .iter()
        .position(|row| is_header_row(row))
        .ok_or_else(|| ExcelImportError::HeaderNotFound(sheet_name.to_string()))?;

    // Column names come verbatim from the header row; gaps from merged
    // header cells are skipped but the source order is preserved.
    let column_indexes: Vec<(usize, String)> = rows[header_idx]
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| match cell {
            Data::String(s) if !s.trim().is_empty() => Some((idx, s.trim().to_string())),
            _ => None,
        })
        .collect();
    debug!(
        "Header row at index {} with {} columns",
        header_idx,
        column_indexes.len()
    );

    let mut data_rows = Vec::new();
    let mut started = false;
    for row in rows.iter().skip(header_idx + 1) {
        let cells: Vec<CellValue> = column_indexes
            .iter()
            .map(|(idx, _)| convert_cell(row.get(*idx)))
            .collect();

        if cells.iter().all(CellValue::is_empty) {
            if started {
                // The table ends at the first blank row; footnotes follow
                break;
            }
            continue;
        }
        if is_aggregate_row(&cells) {
            debug!("Skipping aggregate row");
            started = true;
            continue;
        }

        started = true;
        data_rows.push(cells);
    }

    if data_rows.is_empty() {
        return Err(ExcelImportError::NoDataRows(sheet_name.to_string()));
    }

    Ok(RegistrationTable {
        columns: column_indexes.into_iter().map(|(_, name)| name).collect(),
        rows: data_rows,
    })
}

fn is_header_row(row: &[Data]) -> bool {
    row.iter()
        .filter(|cell| matches!(cell, Data::String(s) if !s.trim().is_empty()))
        .count()
        >= HEADER_MIN_TEXT_CELLS
}

fn is_aggregate_row(cells: &[CellValue]) -> bool {
    match cells.iter().find(|cell| !cell.is_empty()) {
        Some(CellValue::Text(s)) => {
            let label = s.trim().to_lowercase();
            AGGREGATE_MARKERS
                .iter()
                .any(|marker| label.starts_with(marker))
        }
        _ => false,
    }
}

fn convert_cell(cell: Option<&Data>) -> CellValue {
    match cell {
        Some(Data::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(trimmed.to_string())
            }
        }
        Some(Data::Int(i)) => CellValue::Integer(*i),
        Some(Data::Float(f)) => {
            // xlsx stores every number as a float; counts come back integral
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                CellValue::Integer(*f as i64)
            } else {
                CellValue::Real(*f)
            }
        }
        Some(Data::Bool(b)) => CellValue::Text(b.to_string()),
        Some(Data::DateTime(dt)) => CellValue::Real(dt.as_f64()),
        Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => CellValue::Text(s.clone()),
        Some(Data::Error(e)) => CellValue::Text(e.to_string()),
        Some(Data::Empty) | None => CellValue::Empty,
    }
}
