//! The local tier keeps accepted records in a single `.xlsx` file so that
//! submissions survive while the remote spreadsheet is unavailable.
//!
//! Every append reads the workbook, adds one row to the `Emails` sheet and
//! rewrites the file. The rewrite goes to a sibling temporary file that is
//! renamed over the target, so a failed write leaves the previous file intact.
//! Other sheets in the file are carried over by value; their formatting is not.
use crate::metrics_defs::LOCAL_APPEND_DURATION;
use crate::types::Record;
use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{AcquireError, Semaphore};

pub const SHEET_NAME: &str = "Emails";
pub const EMAIL_HEADER: &str = "Email";
pub const TIMESTAMP_HEADER: &str = "Timestamp";

#[derive(thiserror::Error, Debug)]
pub enum LocalWriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not read workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("could not write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("workbook has no {0:?} sheet")]
    MissingSheet(String),

    #[error("local write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("local store is closed")]
    Closed(#[from] AcquireError),
}

pub struct WorkbookStore {
    path: PathBuf,
    // Appends are read-modify-write, so only one may run at a time.
    write_lock: Arc<Semaphore>,
}

impl WorkbookStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        WorkbookStore {
            path: path.into(),
            write_lock: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row after all existing rows, creating the file on first use.
    pub async fn append(&self, record: &Record) -> Result<(), LocalWriteError> {
        let permit = self.write_lock.clone().acquire_owned().await?;
        let start = Instant::now();

        let path = self.path.clone();
        let record = record.clone();
        // The permit lives in the blocking task, so a cancelled caller cannot
        // release it while the file is still being rewritten.
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            append_record(&path, record)
        })
        .await?;

        metrics::histogram!(LOCAL_APPEND_DURATION.name).record(start.elapsed().as_secs_f64());
        result
    }

    /// All stored records in arrival order. Empty when the file does not exist yet.
    pub async fn read_all(&self) -> Result<Vec<Record>, LocalWriteError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_workbook(&path).map(|contents| contents.records))
            .await?
    }
}

/// Everything read back from the local file, in sheet order.
#[derive(Debug, Default)]
struct LocalWorkbook {
    records: Vec<Record>,
    sheets: Vec<Sheet>,
}

#[derive(Debug)]
enum Sheet {
    Emails,
    Other { name: String, range: Range<Data> },
}

fn append_record(path: &Path, record: Record) -> Result<(), LocalWriteError> {
    let mut contents = read_workbook(path)?;
    contents.records.push(record);
    write_workbook(path, &contents)
}

fn read_workbook(path: &Path) -> Result<LocalWorkbook, LocalWriteError> {
    let mut contents = LocalWorkbook::default();
    if !path.exists() {
        return Ok(contents);
    }

    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let names = workbook.sheet_names();
    if !names.iter().any(|name| name == SHEET_NAME) {
        return Err(LocalWriteError::MissingSheet(SHEET_NAME.into()));
    }

    for name in names {
        let range = workbook.worksheet_range(&name)?;
        if name == SHEET_NAME {
            contents.records = parse_records(&range);
            contents.sheets.push(Sheet::Emails);
        } else {
            tracing::debug!(sheet = %name, "Carrying over extra sheet in local store");
            contents.sheets.push(Sheet::Other { name, range });
        }
    }

    Ok(contents)
}

fn parse_records(range: &Range<Data>) -> Vec<Record> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };

    let column = |name: &str| header.iter().position(|cell| cell.to_string() == name);
    let email_col = column(EMAIL_HEADER);
    let timestamp_col = column(TIMESTAMP_HEADER);

    rows.filter(|row| row.iter().any(|cell| !cell.to_string().is_empty()))
        .map(|row| Record {
            email: cell_text(row, email_col),
            timestamp: cell_text(row, timestamp_col),
        })
        .collect()
}

fn cell_text(row: &[Data], col: Option<usize>) -> String {
    col.and_then(|i| row.get(i))
        .map(|cell| cell.to_string())
        .unwrap_or_default()
}

fn write_workbook(path: &Path, contents: &LocalWorkbook) -> Result<(), LocalWriteError> {
    let mut workbook = Workbook::new();

    if !contents.sheets.iter().any(|sheet| matches!(sheet, Sheet::Emails)) {
        write_emails(workbook.add_worksheet(), &contents.records)?;
    }
    for sheet in &contents.sheets {
        match sheet {
            Sheet::Emails => write_emails(workbook.add_worksheet(), &contents.records)?,
            Sheet::Other { name, range } => copy_sheet(workbook.add_worksheet(), name, range)?,
        }
    }

    let buffer = workbook.save_to_buffer()?;

    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "local store path has no file name")
    })?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, buffer)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }

    Ok(())
}

fn write_emails(worksheet: &mut Worksheet, records: &[Record]) -> Result<(), LocalWriteError> {
    worksheet.set_name(SHEET_NAME)?;
    worksheet.write_string(0, 0, EMAIL_HEADER)?;
    worksheet.write_string(0, 1, TIMESTAMP_HEADER)?;

    for (row, record) in (1u32..).zip(records) {
        worksheet.write_string(row, 0, &record.email)?;
        worksheet.write_string(row, 1, &record.timestamp)?;
    }
    Ok(())
}

fn copy_sheet(
    worksheet: &mut Worksheet,
    name: &str,
    range: &Range<Data>,
) -> Result<(), LocalWriteError> {
    worksheet.set_name(name)?;

    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    for (row, col, cell) in range.used_cells() {
        let out_of_range = || io::Error::new(io::ErrorKind::InvalidData, "cell outside sheet bounds");
        let row = u32::try_from(row)
            .ok()
            .and_then(|row| row.checked_add(first_row))
            .ok_or_else(out_of_range)?;
        let col = u32::try_from(col)
            .ok()
            .and_then(|col| col.checked_add(first_col))
            .and_then(|col| u16::try_from(col).ok())
            .ok_or_else(out_of_range)?;

        match cell {
            Data::Empty => {}
            Data::Int(value) => {
                worksheet.write_number(row, col, *value as f64)?;
            }
            Data::Float(value) => {
                worksheet.write_number(row, col, *value)?;
            }
            Data::Bool(value) => {
                worksheet.write_boolean(row, col, *value)?;
            }
            Data::String(value) => {
                worksheet.write_string(row, col, value)?;
            }
            other => {
                worksheet.write_string(row, col, other.to_string())?;
            }
        }
    }
    Ok(())
}
