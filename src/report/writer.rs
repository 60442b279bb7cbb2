//! XLSX report artifact.

use crate::report::types::{AggregateResult, ReportRow, RowOutcome};
use crate::severity::Severity;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, XlsxError};
use std::path::{Path, PathBuf};

pub const SHEET_NAME: &str = "Usage";

pub const COLUMNS: [&str; 11] = [
    "Name",
    "Number",
    "Type",
    "Balance",
    "Quota (GB)",
    "Consumed (GB)",
    "Remaining (GB)",
    "Renewal Cost",
    "Reset Date",
    "Severity",
    "Error",
];

const REMAINING_COLUMN: usize = 6;
const FAILED_LABEL: &str = "FAILED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The destination directory could not be created.
    Io { path: PathBuf, message: String },
    /// The workbook could not be built or saved.
    Xlsx { path: PathBuf, message: String },
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Io { path, message } => {
                write!(f, "cannot prepare {}: {}", path.display(), message)
            }
            WriteError::Xlsx { path, message } => {
                write!(f, "cannot write report {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// Value of a single report cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

/// Cells for one data row, in [`COLUMNS`] order.
pub fn report_cells(row: &ReportRow) -> Vec<Cell> {
    let account = row.account();
    let mut cells = vec![
        Cell::Text(account.name.clone()),
        Cell::Text(account.number.clone()),
        Cell::Text(account.account_type.clone()),
    ];

    match &row.outcome {
        RowOutcome::Usage(record) => {
            cells.push(Cell::Text(record.balance_label()));
            cells.push(Cell::Number(record.quota_gb));
            cells.push(Cell::Number(record.consumed_gb));
            cells.push(Cell::Number(record.remaining_gb));
            cells.push(record.renewal_cost_label().map_or(Cell::Empty, Cell::Text));
            cells.push(
                record
                    .reset_date
                    .as_ref()
                    .map_or(Cell::Empty, |date| Cell::Text(date.to_string())),
            );
            cells.push(Cell::Text(row.severity.to_string()));
            cells.push(Cell::Empty);
        }
        RowOutcome::Failure(failure) => {
            cells.resize(cells.len() + 6, Cell::Empty);
            cells.push(Cell::Text(FAILED_LABEL.to_string()));
            cells.push(Cell::Text(failure.to_string()));
        }
    }
    cells
}

struct Formats {
    header: Format,
    cell: Format,
    yellow: Format,
    red: Format,
}

impl Formats {
    fn new() -> Self {
        let cell = Format::new().set_align(FormatAlign::Center);
        Self {
            header: Format::new().set_bold().set_align(FormatAlign::Center),
            yellow: cell.clone().set_background_color(Color::Yellow),
            red: cell.clone().set_background_color(Color::Red),
            cell,
        }
    }

    fn for_cell(&self, column: usize, severity: Severity) -> &Format {
        if column != REMAINING_COLUMN {
            return &self.cell;
        }
        match severity {
            Severity::Red => &self.red,
            Severity::Yellow => &self.yellow,
            Severity::Normal => &self.cell,
        }
    }
}

/// Writes the report to `destination`, replacing any existing file.
///
/// Blocking; run it off the async runtime.
pub fn write_report(result: &AggregateResult, destination: &Path) -> Result<PathBuf, WriteError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| WriteError::Io {
            path: parent.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    build_workbook(result, destination).map_err(|e| WriteError::Xlsx {
        path: destination.to_path_buf(),
        message: e.to_string(),
    })?;

    tracing::info!(path = %destination.display(), rows = result.len(), "report written");
    Ok(destination.to_path_buf())
}

fn build_workbook(result: &AggregateResult, destination: &Path) -> Result<(), XlsxError> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (column, title) in COLUMNS.iter().enumerate() {
        let column = column as u16;
        sheet.write_string_with_format(0, column, *title, &formats.header)?;
        sheet.set_column_width(column, if column == 0 { 24.0 } else { 16.0 })?;
    }

    for (index, row) in result.rows().iter().enumerate() {
        let sheet_row = index as u32 + 1;
        for (column, cell) in report_cells(row).iter().enumerate() {
            let format = formats.for_cell(column, row.severity);
            let column = column as u16;
            match cell {
                Cell::Text(text) => {
                    sheet.write_string_with_format(sheet_row, column, text, format)?;
                }
                Cell::Number(value) => {
                    sheet.write_number_with_format(sheet_row, column, *value, format)?;
                }
                Cell::Empty => {
                    sheet.write_blank(sheet_row, column, format)?;
                }
            }
        }
    }

    workbook.save(destination)
}

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod tests;
