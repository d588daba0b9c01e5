use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet, XlsxError};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::report::{CellValue, TicketingReport};

pub const SHEET_NAME: &str = "TicketingReport";

const DATE_FORMAT: &str = "yyyy-mm-dd";
const TIME_FORMAT: &str = "hh:mm:ss";
const TIMESTAMP_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("failed to create parent directory {path:?}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write workbook {path:?}")]
    WriteWorkbook {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },

    #[error("failed to move workbook into place at {path:?}")]
    ReplaceTarget {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to resolve written workbook path {path:?}")]
    ResolvePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Write the report to `target` as a single-sheet xlsx workbook and return
/// the resolved absolute path.
///
/// Missing parent directories are created. The workbook is saved to a scratch
/// path next to the target and renamed into place, so a failed save never
/// leaves a truncated file at the target path.
///
/// # Errors
///
/// Will return `ExportError` when a directory cannot be created or the
/// workbook cannot be written or moved into place
#[tracing::instrument(name = "export ticketing report to excel", skip(report))]
pub fn export_to_excel(report: &TicketingReport, target: &Path) -> Result<PathBuf, ExportError> {
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut workbook = build_workbook(report).map_err(|source| ExportError::WriteWorkbook {
        path: target.to_path_buf(),
        source,
    })?;

    let scratch = scratch_path(target);
    workbook
        .save(&scratch)
        .map_err(|source| ExportError::WriteWorkbook {
            path: scratch.clone(),
            source,
        })?;

    fs::rename(&scratch, target).map_err(|source| ExportError::ReplaceTarget {
        path: target.to_path_buf(),
        source,
    })?;

    let resolved = fs::canonicalize(target).map_err(|source| ExportError::ResolvePath {
        path: target.to_path_buf(),
        source,
    })?;

    tracing::info!(row_count = report.row_count(), path = ?resolved, "wrote ticketing report workbook");

    Ok(resolved)
}

struct CellFormats {
    date: Format,
    time: Format,
    timestamp: Format,
}

#[allow(clippy::cast_possible_truncation)]
fn build_workbook(report: &TicketingReport) -> Result<Workbook, XlsxError> {
    let formats = CellFormats {
        date: Format::new().set_num_format(DATE_FORMAT),
        time: Format::new().set_num_format(TIME_FORMAT),
        timestamp: Format::new().set_num_format(TIMESTAMP_FORMAT),
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (column, name) in TicketingReport::columns().iter().enumerate() {
        worksheet.write_string(0, column as u16, *name)?;
    }

    for (index, row) in report.rows.iter().enumerate() {
        let row_number = index as u32 + 1;
        for (column, value) in row.cells().into_iter().enumerate() {
            write_cell(worksheet, row_number, column as u16, value, &formats)?;
        }
    }

    Ok(workbook)
}

#[allow(clippy::cast_precision_loss)]
fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    column: u16,
    value: CellValue,
    formats: &CellFormats,
) -> Result<(), XlsxError> {
    match value {
        CellValue::Null => {}
        CellValue::Text(text) => {
            worksheet.write_string(row, column, text)?;
        }
        CellValue::Amount(amount) => {
            worksheet.write_number(row, column, amount.to_f64().unwrap_or_default())?;
        }
        CellValue::Integer(number) => {
            worksheet.write_number(row, column, number as f64)?;
        }
        CellValue::Date(date) => {
            worksheet.write_datetime_with_format(row, column, excel_date(date)?, &formats.date)?;
        }
        CellValue::Time(time) => {
            worksheet.write_datetime_with_format(row, column, excel_time(time)?, &formats.time)?;
        }
        CellValue::Timestamp(timestamp) => {
            worksheet.write_datetime_with_format(
                row,
                column,
                excel_datetime(strip_timezone(timestamp))?,
                &formats.timestamp,
            )?;
        }
    }

    Ok(())
}

/// Excel has no timezone-aware datetime type; keep the wall-clock reading and
/// discard the offset rather than converting to UTC.
fn strip_timezone(timestamp: OffsetDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(timestamp.date(), timestamp.time())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn excel_date(date: Date) -> Result<ExcelDateTime, XlsxError> {
    ExcelDateTime::from_ymd(date.year() as u16, date.month().into(), date.day())
}

fn excel_time(time: Time) -> Result<ExcelDateTime, XlsxError> {
    ExcelDateTime::from_hms(u16::from(time.hour()), time.minute(), seconds_of(time))
}

fn excel_datetime(timestamp: PrimitiveDateTime) -> Result<ExcelDateTime, XlsxError> {
    excel_date(timestamp.date())?.and_hms(
        u16::from(timestamp.hour()),
        timestamp.minute(),
        seconds_of(timestamp.time()),
    )
}

fn seconds_of(time: Time) -> f64 {
    f64::from(time.second()) + f64::from(time.microsecond()) / 1_000_000.0
}

fn scratch_path(target: &Path) -> PathBuf {
    let mut file_name = target
        .file_name()
        .map_or_else(|| OsString::from("ticketing-report.xlsx"), ToOwned::to_owned);
    file_name.push(".tmp");
    target.with_file_name(file_name)
}
